// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! End-to-end runs through the dispatch pipeline, driving sessions the way
//! a transport would and reading what comes back out of the sink.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use morel_common::SessionSink;
use morel_db::Database;
use morel_kernel::{Session, World, WorldOptions};

#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl SessionSink for RecordingSink {
    fn send_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn shutdown_read(&self) {}

    fn shutdown_write(&self) {}
}

struct Client {
    session: Arc<Session>,
    sink: Arc<RecordingSink>,
}

impl Client {
    fn connect(world: &World, peer: &str) -> Client {
        let sink = Arc::new(RecordingSink::default());
        let session = world.sessions.attach(sink.clone(), peer);
        Client { session, sink }
    }

    fn line(&self, world: &World, input: &str) {
        self.session.handle_line(world, input);
    }

    fn drain(&self) -> Vec<String> {
        let mut lines = self.sink.lines.lock().unwrap();
        std::mem::take(&mut *lines)
    }

    fn drain_text(&self) -> String {
        self.drain().join("\n")
    }
}

fn boot() -> World {
    World::boot(Arc::new(Database::new()), WorldOptions::default())
}

/// Create a character named `name` through the yes/no flow.
fn login(world: &World, client: &Client, name: &str) {
    client.line(world, &format!("play {name}"));
    client.line(world, "yes");
    client.drain();
}

#[test]
fn scenario_create_and_look_around() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");

    operator.line(&world, "dig base");
    operator.line(&world, "dig garden");
    operator.drain();

    operator.line(&world, "go garden");
    operator.drain();

    operator.line(&world, "look");
    assert_eq!(
        operator.drain(),
        vec!["garden: A blank room.", "", "It is empty"]
    );
}

#[test]
fn scenario_take_and_drop() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.line(&world, "make apple");
    operator.drain();

    operator.line(&world, "take apple");
    let out = operator.drain_text();
    assert!(
        out.contains("God puts apple in their pocket."),
        "got: {out}"
    );

    operator.line(&world, "look me");
    let out = operator.drain_text();
    assert!(out.contains(" - apple"), "pocket listing missing: {out}");

    operator.line(&world, "drop apple");
    let out = operator.drain_text();
    assert!(out.contains("God takes apple out of their pocket and leaves it."));
}

#[test]
fn scenario_ambiguity() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig orchard");
    operator.line(&world, "make apple");
    operator.line(&world, "make apricot");
    operator.drain();

    operator.line(&world, "take ap");
    let out = operator.drain_text();
    assert!(
        out.contains("Which one?\nChoices are: apple, apricot"),
        "got: {out}"
    );

    // exact equality resolves the ambiguity
    operator.line(&world, "take apple");
    let out = operator.drain_text();
    assert!(out.contains("God puts apple in their pocket."));
}

#[test]
fn scenario_scripted_command() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    // ids: God=0, config=1, garden=2, statue=3
    operator.line(&world, "dig garden");
    operator.line(&world, "make statue");
    operator.line(&world, "setattr #1 default_room #2");
    operator.drain();

    operator.line(&world, r#"cmd #3 wave send("You wave at %s" % caller.name)"#);
    let out = operator.drain_text();
    assert!(out.contains("Added command wave to statue"), "got: {out}");

    let visitor = Client::connect(&world, "10.0.0.2");
    login(&world, &visitor, "Bob");
    visitor.drain();
    visitor.line(&world, "wave");
    let out = visitor.drain_text();
    assert!(out.contains("You wave at Bob"), "got: {out}");
}

#[test]
fn scenario_yes_no_character_creation() {
    let world = boot();
    let client = Client::connect(&world, "127.0.0.1");

    client.line(&world, "play Alice");
    let out = client.drain_text();
    assert!(
        out.contains("Couldn't find a character named Alice.\nCreate it?"),
        "got: {out}"
    );

    client.line(&world, "yes");
    let out = client.drain_text();
    assert!(out.contains("You are now playing as Alice"), "got: {out}");

    // bound now; look works even from nowhere
    client.line(&world, "look");
    let out = client.drain_text();
    assert!(out.contains("You only see nothing. A lot of nothing."));
}

#[test]
fn declining_character_creation_restores_play() {
    let world = boot();
    let client = Client::connect(&world, "127.0.0.1");
    client.line(&world, "play Alice");
    client.line(&world, "no");
    client.drain();

    client.line(&world, "play Alice");
    let out = client.drain_text();
    assert!(out.contains("Create it?"), "play should be available again: {out}");
}

#[test]
fn a_character_cannot_be_played_twice() {
    let world = boot();
    let one = Client::connect(&world, "127.0.0.1");
    login(&world, &one, "God");

    let two = Client::connect(&world, "10.0.0.2");
    two.line(&world, "play God");
    let out = two.drain_text();
    assert!(out.contains("God is already online."), "got: {out}");
}

#[test]
fn scenario_persistence_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.sav");

    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.line(&world, "make statue");
    operator.line(&world, r#"cmd #3 wave send("You wave at %s" % caller.name)"#);
    operator.line(&world, "describe garden A quiet green garden.");
    operator.drain();
    world.db.dump(&path).unwrap();

    // a fresh process: new database, new world, same file
    let db = Arc::new(Database::new());
    db.load(&path).unwrap();
    let world2 = World::boot(db, WorldOptions::default());
    let operator2 = Client::connect(&world2, "127.0.0.1");
    operator2.line(&world2, "play God");
    operator2.drain();

    operator2.line(&world2, "look garden");
    let out = operator2.drain_text();
    assert!(out.contains("garden: A quiet green garden."), "got: {out}");

    operator2.line(&world2, "wave");
    let out = operator2.drain_text();
    assert!(out.contains("You wave at God"), "got: {out}");
}

#[test]
fn scenario_scheduler_emits_later() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.drain();

    operator.line(&world, r#"exec game.schedule(1, lambda: here.emit("tick"))"#);
    operator.drain();

    let deadline = Instant::now() + Duration::from_secs(4);
    loop {
        std::thread::sleep(Duration::from_millis(100));
        let out = operator.drain_text();
        if out.contains("tick") {
            assert!(Instant::now() >= deadline - Duration::from_secs(3), "fired too early");
            break;
        }
        assert!(Instant::now() < deadline, "tick never arrived");
    }
}

#[test]
fn unknown_input_gets_huh() {
    let world = boot();
    let client = Client::connect(&world, "127.0.0.1");
    client.line(&world, "frobnicate wildly");
    assert_eq!(client.drain(), vec!["Huh?"]);
}

#[test]
fn big_things_cannot_be_pocketed() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig hall");
    operator.line(&world, "make piano");
    operator.line(&world, "setflag piano big");
    operator.drain();

    operator.line(&world, "take piano");
    let out = operator.drain_text();
    assert!(out.contains("piano is too big."), "got: {out}");
}

#[test]
fn taking_yourself_is_physically_impossible() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig hall");
    operator.drain();

    operator.line(&world, "take god");
    let out = operator.drain_text();
    assert!(
        out.contains("God tries to fold themselves into their own pocket, but fails."),
        "got: {out}"
    );
}

#[test]
fn delcmd_unhooks_a_scripted_command() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.line(&world, "make statue");
    operator.line(&world, r#"cmd statue wave send("waving")"#);
    operator.drain();

    operator.line(&world, "wave");
    assert!(operator.drain_text().contains("waving"));

    operator.line(&world, "delcmd statue wave");
    operator.drain();
    operator.line(&world, "wave");
    assert_eq!(operator.drain(), vec!["Huh?"]);
}

#[test]
fn destroyed_rooms_relocate_their_contents() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig base");
    operator.line(&world, "dig shed");
    operator.line(&world, "go shed");
    operator.line(&world, "make crate");
    operator.line(&world, "go base");
    operator.drain();

    operator.line(&world, "demolish shed");
    operator.drain();

    // the crate followed the caller; the exit is gone
    operator.line(&world, "look crate");
    let out = operator.drain_text();
    assert!(out.contains("crate:"), "crate not relocated: {out}");
    operator.line(&world, "go shed");
    let out = operator.drain_text();
    assert!(out.contains("Don't know this place. Is it in Canada?"), "got: {out}");
}

#[test]
fn destroying_a_character_unbinds_its_session() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.line(&world, "setattr #1 default_room #2");
    operator.drain();

    let victim = Client::connect(&world, "10.0.0.2");
    login(&world, &victim, "Mallory");
    victim.drain();

    operator.line(&world, "destroy mallory");
    operator.drain();
    let out = victim.drain_text();
    assert!(
        out.contains("Your character has been slain. You were kicked out of it"),
        "got: {out}"
    );

    // the session can play again
    victim.line(&world, "play Mallory");
    let out = victim.drain_text();
    assert!(out.contains("Create it?"), "got: {out}");
}

#[test]
fn event_handlers_wrap_the_builtin_look() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.line(
        &world,
        r#"setevent garden look send("A breeze passes through.")"#,
    );
    operator.drain();

    operator.line(&world, "look");
    let out = operator.drain();
    // custom handler first, then the built-in rendering
    assert_eq!(out[0], "A breeze passes through.");
    assert!(out[1].starts_with("garden:"), "got: {out:?}");
}

#[test]
fn failing_event_handler_interrupts_the_builtin() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig crypt");
    operator.line(
        &world,
        r#"setevent crypt look fail("It is too dark to see.")"#,
    );
    operator.drain();

    operator.line(&world, "look");
    let out = operator.drain();
    assert_eq!(out, vec!["It is too dark to see."]);
}

#[test]
fn matchers_bind_their_capture_groups() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.line(&world, "make genie");
    operator.line(
        &world,
        r#"match genie wish:wish\s+for\s+(\w+) send("A %s appears" % groups[0])"#,
    );
    operator.drain();

    operator.line(&world, "wish for pony");
    let out = operator.drain_text();
    assert!(out.contains("A pony appears"), "got: {out}");
}

#[test]
fn script_errors_reach_the_caller_as_kind_and_message() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.drain();

    operator.line(&world, "eval nonsense_name");
    let out = operator.drain_text();
    assert!(
        out.contains("name error: name 'nonsense_name' is not defined"),
        "got: {out}"
    );

    operator.line(&world, "eval 1 +");
    let out = operator.drain_text();
    assert!(out.contains("parse error:"), "got: {out}");
}

#[test]
fn eval_prints_reprs() {
    let world = boot();
    let operator = Client::connect(&world, "127.0.0.1");
    login(&world, &operator, "God");
    operator.line(&world, "dig garden");
    operator.drain();

    operator.line(&world, r#"eval "a" + "b""#);
    assert_eq!(operator.drain(), vec!["\"ab\""]);

    operator.line(&world, "eval here");
    let out = operator.drain_text();
    assert!(out.contains("<#2 room garden>"), "got: {out}");
}

#[test]
fn help_lists_the_available_surface() {
    let world = boot();
    let client = Client::connect(&world, "127.0.0.1");
    client.line(&world, "help");
    let out = client.drain_text();
    assert!(out.contains("Available commands:"));
    assert!(out.contains("play"));

    login(&world, &client, "God");
    client.line(&world, "dig garden");
    client.drain();
    client.line(&world, "help");
    let out = client.drain_text();
    for cmd in ["look", "go", "say", "take", "dig", "eval", "teleport"] {
        assert!(out.contains(cmd), "missing {cmd}: {out}");
    }

    client.line(&world, "help dig");
    let out = client.drain_text();
    assert!(out.contains("dig <room name>"), "got: {out}");
}
