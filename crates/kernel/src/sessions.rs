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

//! Per-connection state and the registry of live sessions. A session is
//! the dispatch boundary: every error a command or script produces is
//! turned into a line for the client here, and the session carries on.
//!
//! A session starts anonymous (named by its peer address) and binds to at
//! most one player via `play`; a player is bound to at most one session.
//! The binding lives here, not in the database, so nothing transient is
//! ever serialized.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{error, warn};

use morel_common::{ActionFailed, Kind, ObjId, Object, Power, SessionSink};

use crate::actions::{CmdError, split_command};
use crate::dispatch::{dispatch_world, world_actions};
use crate::events::dispatch_event;
use crate::world::World;

const HELP_HELP: &str = "syntax: help <command>\nDisplays help topics for the given command.";
const PLAY_HELP: &str = "syntax: play <name>\nStart playing as the given character. If the character is not\nfound, the player will be invited to create a new one.";

/// What a matched answer does. Answers are data, not closures, so the
/// session can store and drop them freely.
#[derive(Debug, Clone)]
enum AnswerCallback {
    CreateCharacter(String),
    RestorePlay,
    Nothing,
}

/// A one-shot conversational action: literal replies mapped to callbacks,
/// removed before the callback fires so it can never run twice.
#[derive(Debug)]
struct Answer {
    entries: Vec<(&'static str, AnswerCallback)>,
}

impl Answer {
    fn yes_no(yes: AnswerCallback, no: AnswerCallback) -> Answer {
        let mut entries = Vec::new();
        for word in ["yes", "sure", "yup", "ok", "aye"] {
            entries.push((word, yes.clone()));
        }
        for word in ["no", "nope", "nah", "nay"] {
            entries.push((word, no.clone()));
        }
        Answer { entries }
    }

    fn matches(&self, line: &str) -> Option<AnswerCallback> {
        let line = line.to_lowercase();
        self.entries
            .iter()
            .find(|(word, _)| *word == line)
            .map(|(_, cb)| cb.clone())
    }
}

struct SessionState {
    name: String,
    player: Option<ObjId>,
    play_enabled: bool,
    answers: Vec<Answer>,
    silent: bool,
}

pub struct Session {
    pub client_id: u64,
    pub peer: String,
    sink: Arc<dyn SessionSink>,
    // self-handle, so commands executed on behalf of this session can
    // carry it into the world
    me: Weak<Session>,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(client_id: u64, sink: Arc<dyn SessionSink>, peer: &str, me: Weak<Session>) -> Session {
        Session {
            client_id,
            peer: peer.to_string(),
            sink,
            me,
            state: Mutex::new(SessionState {
                name: peer.to_string(),
                player: None,
                play_enabled: true,
                answers: Vec::new(),
                silent: false,
            }),
        }
    }

    fn arc(&self) -> Arc<Session> {
        self.me.upgrade().expect("session outlived its Arc")
    }

    /// Push a line at the client. Transport failures are the transport's
    /// problem; the world never finds out.
    pub fn send(&self, text: &str) {
        if let Err(e) = self.sink.send_line(text) {
            warn!(client = self.client_id, name = %self.name(), "send failed: {e}");
        }
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    pub fn player(&self) -> Option<ObjId> {
        self.state().player
    }

    /// Drop the character binding; `play` becomes available again.
    pub fn unbind_player(&self) {
        let mut state = self.state();
        state.player = None;
        state.play_enabled = true;
    }

    pub fn set_silent(&self) {
        self.state().silent = true;
    }

    pub fn is_silent(&self) -> bool {
        self.state().silent
    }

    pub fn shutdown_read(&self) {
        self.sink.shutdown_read();
    }

    pub fn shutdown_write(&self) {
        self.sink.shutdown_write();
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state poisoned")
    }

    /// One input line, start to finish: world actions in pipeline order,
    /// then the session's own commands, then `Huh?`. This is the recovery
    /// point — nothing an action raises escapes it.
    pub fn handle_line(&self, world: &World, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let player = self.player();
        if let Some(player) = player {
            match dispatch_world(world, &self.arc(), player, line) {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    self.report(world, e);
                    return;
                }
            }
        }

        if let Some(callback) = self.take_answer(line) {
            if let Err(e) = self.run_answer(world, callback) {
                self.report(world, e);
            }
            return;
        }

        let (word, rest) = split_command(line);
        match word.as_str() {
            "help" => self.cmd_help(world, rest),
            "play" if self.state().play_enabled => {
                if let Err(e) = self.cmd_play(world, rest) {
                    self.report(world, e);
                }
            }
            _ => self.send("Huh?"),
        }
    }

    /// Find a pending answer matching the whole line; remove it before
    /// running anything, so the action cannot re-enter itself.
    fn take_answer(&self, line: &str) -> Option<AnswerCallback> {
        let mut state = self.state();
        let idx = state
            .answers
            .iter()
            .position(|a| a.matches(line).is_some())?;
        let answer = state.answers.remove(idx);
        answer.matches(line)
    }

    fn run_answer(&self, world: &World, callback: AnswerCallback) -> Result<(), CmdError> {
        match callback {
            AnswerCallback::CreateCharacter(name) => self.create_character(world, &name),
            AnswerCallback::RestorePlay => {
                self.state().play_enabled = true;
                Ok(())
            }
            AnswerCallback::Nothing => Ok(()),
        }
    }

    fn cmd_help(&self, world: &World, rest: Option<&str>) {
        let mut entries: Vec<(String, String)> = Vec::new();
        if let Some(player) = self.player() {
            let ws = world.db.read();
            for action in world_actions(&ws, player) {
                entries.push((action.name().to_string(), action.help().to_string()));
            }
        }
        entries.push(("help".to_string(), HELP_HELP.to_string()));
        if self.state().play_enabled {
            entries.push(("play".to_string(), PLAY_HELP.to_string()));
        }

        match rest {
            None => {
                let mut names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                self.send("Available commands:");
                self.send(&format!("  {}", names.join(", ")));
            }
            Some(query) => {
                let query = query
                    .split_whitespace()
                    .next()
                    .unwrap_or(query)
                    .to_lowercase();
                match entries.iter().find(|(n, _)| n.to_lowercase().starts_with(&query)) {
                    Some((_, help)) => self.send(help),
                    None => self.send(&format!("Command {query} was not found")),
                }
            }
        }
    }

    fn cmd_play(&self, world: &World, rest: Option<&str>) -> Result<(), CmdError> {
        let Some(query) = rest else {
            self.send("Play who?");
            return Ok(());
        };

        let matches = {
            let ws = world.db.read();
            let players = ws.list_all(Some(Kind::Player));
            ws.match_among(query, &players)
        };
        match matches.first() {
            None => {
                self.send(&format!(
                    "Couldn't find a character named {query}.\nCreate it?"
                ));
                let mut state = self.state();
                state.play_enabled = false;
                state.answers.push(Answer::yes_no(
                    AnswerCallback::CreateCharacter(query.to_string()),
                    AnswerCallback::RestorePlay,
                ));
                Ok(())
            }
            Some(&character) => self.bind(world, character),
        }
    }

    fn create_character(&self, world: &World, name: &str) -> Result<(), CmdError> {
        let character = {
            let mut ws = world.db.write();
            let first_ever = ws.config_id().is_none();
            let character = ws.add(Object::player(name));
            if first_ever {
                // first player gets all powers. Dibs!
                ws.ensure_config();
                if let Some(powers) = ws.get_mut(character).and_then(|p| p.powers_mut()) {
                    powers.push(Power::God);
                }
            } else if let Some(spawn) = ws.default_room() {
                ws.move_to(character, Some(spawn))?;
            }
            character
        };
        self.bind(world, character)
    }

    /// Bind this session to a character: refuse when another live session
    /// has it, announce, and dispatch `connect` on the player.
    fn bind(&self, world: &World, character: ObjId) -> Result<(), CmdError> {
        let name = {
            let ws = world.db.read();
            ws.name_of(character)
        };
        if let Some(other) = world.sessions.session_for_player(character)
            && other.client_id != self.client_id
        {
            return Err(ActionFailed::AlreadyOnline(name).into());
        }

        {
            let mut state = self.state();
            state.player = Some(character);
            // one character per session
            state.play_enabled = false;
            state.name = name.clone();
        }
        self.send(&format!("You are now playing as {name}"));
        world
            .sessions
            .broadcast_except(self.client_id, &format!("{name} logged in."));

        let mut ws = world.db.write();
        dispatch_event(
            world,
            &mut ws,
            Some(self.arc()),
            Some(character),
            character,
            "connect",
            &[],
        )?;
        Ok(())
    }

    /// The recovery point of §-error-handling: user-visible failures and
    /// script errors go to the client; anything else is logged and an
    /// apology (or, under `debug`, the gory detail) goes out.
    fn report(&self, world: &World, e: CmdError) {
        match e {
            CmdError::Failed(f) => self.send(&f.to_string()),
            CmdError::Script(s) => self.send(&s.to_string()),
            CmdError::World(w) => {
                error!(client = self.client_id, "command failed: {w}");
                if world.options.debug {
                    self.send(&format!("{w}"));
                } else {
                    self.send("Sorry, something went wrong.");
                }
            }
        }
    }

    /// Transport saw EOF. Clear the binding so the character is free; the
    /// host broadcasts the quit notice unless the session was silenced.
    pub fn on_disconnect(&self) {
        self.state().player = None;
    }
}

pub struct Registry {
    sessions: Mutex<Vec<Arc<Session>>>,
    next_client_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            sessions: Mutex::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn attach(&self, sink: Arc<dyn SessionSink>, peer: &str) -> Arc<Session> {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let session =
            Arc::new_cyclic(|me| Session::new(id, sink, peer, me.clone()));
        self.lock().push(session.clone());
        session
    }

    pub fn detach(&self, session: &Arc<Session>) {
        self.lock().retain(|s| s.client_id != session.client_id);
    }

    pub fn list(&self) -> Vec<Arc<Session>> {
        self.lock().clone()
    }

    pub fn any_live(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn by_client_id(&self, id: u64) -> Option<Arc<Session>> {
        self.lock().iter().find(|s| s.client_id == id).cloned()
    }

    /// The session currently playing `player`, if any — the transient
    /// back-reference of the data model, kept outside it.
    pub fn session_for_player(&self, player: ObjId) -> Option<Arc<Session>> {
        self.lock()
            .iter()
            .find(|s| s.player() == Some(player))
            .cloned()
    }

    pub fn send_to_player(&self, player: ObjId, msg: &str) -> bool {
        match self.session_for_player(player) {
            Some(session) => {
                session.send(msg);
                true
            }
            None => false,
        }
    }

    pub fn broadcast(&self, msg: &str) {
        for session in self.list() {
            session.send(msg);
        }
    }

    pub fn broadcast_except(&self, client_id: u64, msg: &str) {
        for session in self.list() {
            if session.client_id != client_id {
                session.send(msg);
            }
        }
    }

    /// Half-close every connection's write side, for server shutdown.
    pub fn shutdown_all(&self) {
        for session in self.list() {
            session.shutdown_write();
        }
    }

    /// After a database swap (`@load`), sessions re-resolve their player by
    /// id; a character that no longer exists unbinds.
    pub fn rebind_after_load(&self, world: &World) {
        let sessions = self.list();
        let ws = world.db.read();
        for session in sessions {
            if let Some(player) = session.player()
                && !ws.contains(player)
            {
                session.unbind_player();
                session.send("Your character is gone from this world.");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Session>>> {
        self.sessions.lock().expect("session registry poisoned")
    }
}
