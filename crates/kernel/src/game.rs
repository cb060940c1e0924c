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

//! The cooperative event loop scripts know as `game`. One dedicated worker
//! owns a time-ordered heap of timers and drains an event queue; wake-ups
//! are bounded at one second so a quiet heap still gets serviced. A failing
//! or panicking callback is logged and swallowed — one bad handler must not
//! stop the loop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

use morel_common::Lambda;

use crate::world::World;

pub enum Event {
    /// A deferred script expression, evaluated fresh when it fires.
    Lambda(Lambda),
    /// A host-side callback.
    Task(Box<dyn FnOnce(&World) + Send>),
}

struct TimerEntry {
    at: Instant,
    seq: u64,
    event: Event,
}

// Ordered by (time, insertion) only; BinaryHeap is a max-heap so the
// comparison is reversed to pop the earliest entry first.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

pub(crate) enum GameMessage {
    Schedule { at: Instant, event: Event },
}

/// Clonable handle to the scheduler worker.
#[derive(Clone)]
pub struct Game {
    sender: Sender<GameMessage>,
}

impl Game {
    pub fn new() -> (Game, Receiver<GameMessage>) {
        let (sender, receiver) = flume::unbounded();
        (Game { sender }, receiver)
    }

    /// Schedule `event` to run in `delay` from now. The worker wakes
    /// immediately to take note of the new deadline.
    pub fn schedule(&self, delay: Duration, event: Event) {
        let at = Instant::now() + delay;
        if self
            .sender
            .send(GameMessage::Schedule { at, event })
            .is_err()
        {
            error!("scheduler worker gone, dropping event");
        }
    }
}

pub fn spawn_game_loop(receiver: Receiver<GameMessage>, world: World) {
    std::thread::Builder::new()
        .name("morel-game".to_string())
        .spawn(move || game_loop(receiver, world))
        .expect("Failed to spawn scheduler thread");
}

fn game_loop(receiver: Receiver<GameMessage>, world: World) {
    let mut timers: BinaryHeap<TimerEntry> = BinaryHeap::new();
    let mut seq = 0u64;

    debug!("scheduler thread started");
    loop {
        let timeout = timers
            .peek()
            .map(|t| t.at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(1))
            .min(Duration::from_secs(1));

        match receiver.recv_timeout(timeout) {
            Ok(GameMessage::Schedule { at, event }) => {
                timers.push(TimerEntry { at, seq, event });
                seq += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("scheduler thread shutting down, channel disconnected");
                break;
            }
        }

        // Fire everything whose time has come, earliest (then oldest) first,
        // each exactly once.
        let now = Instant::now();
        while timers.peek().is_some_and(|t| t.at <= now) {
            let entry = timers.pop().expect("peeked entry");
            run_event(&world, entry.event);
        }
    }
}

fn run_event(world: &World, event: Event) {
    let outcome = catch_unwind(AssertUnwindSafe(|| match event {
        Event::Lambda(lambda) => {
            if let Err(e) = crate::script::run_scheduled(world, &lambda) {
                warn!(code = %lambda.code, "scheduled script failed: {e}");
            }
        }
        Event::Task(task) => task(world),
    }));
    if outcome.is_err() {
        error!("panic in scheduled event callback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use morel_db::Database;

    use crate::world::WorldOptions;

    fn test_world() -> World {
        World::boot(Arc::new(Database::new()), WorldOptions::default())
    }

    #[test]
    fn events_fire_after_their_delay() {
        let world = test_world();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let start = Instant::now();
        world.game.schedule(
            Duration::from_millis(50),
            Event::Task(Box::new(move |_| {
                f.fetch_add(1, AtomicOrdering::SeqCst);
            })),
        );

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0, "fired early");
        std::thread::sleep(Duration::from_millis(500));
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn timers_fire_in_time_then_insertion_order() {
        let world = test_world();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for (label, delay) in [("late", 80u64), ("tie-a", 40), ("tie-b", 40), ("soon", 10)] {
            let order = order.clone();
            world.game.schedule(
                Duration::from_millis(delay),
                Event::Task(Box::new(move |_| {
                    order.lock().unwrap().push(label);
                })),
            );
        }
        std::thread::sleep(Duration::from_millis(600));
        assert_eq!(*order.lock().unwrap(), vec!["soon", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn a_panicking_event_does_not_kill_the_loop() {
        let world = test_world();
        let fired = Arc::new(AtomicUsize::new(0));
        world.game.schedule(
            Duration::from_millis(10),
            Event::Task(Box::new(|_| panic!("bad handler"))),
        );
        let f = fired.clone();
        world.game.schedule(
            Duration::from_millis(30),
            Event::Task(Box::new(move |_| {
                f.fetch_add(1, AtomicOrdering::SeqCst);
            })),
        );
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 1);
    }
}
