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

//! The out-of-band operator channel: lines starting with the configured
//! prefix are consumed here before the world ever sees them. Privileged
//! commands are simply not recognized until `login` elevates the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use morel_kernel::{Session, World};

use crate::config::Config;

const OP_CMDS: &[&str] = &["help", "login", "users", "kick", "save", "load", "shutdown"];
const PRIVILEGED: &[&str] = &["users", "kick", "save", "load", "shutdown"];

pub struct OpChannel {
    authed: bool,
}

impl OpChannel {
    pub fn new() -> OpChannel {
        OpChannel { authed: false }
    }

    /// Returns true when the line was consumed as an operator command.
    pub fn handle(
        &mut self,
        world: &World,
        config: &Config,
        session: &Arc<Session>,
        kill: &Arc<AtomicBool>,
        line: &str,
    ) -> bool {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(config.op_command_prefix) else {
            return false;
        };
        let (cmd, rest) = match rest.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (rest, ""),
        };
        if !OP_CMDS.contains(&cmd) {
            return false;
        }
        if PRIVILEGED.contains(&cmd) && !self.authed {
            return false;
        }

        match cmd {
            "help" => {
                session.send("List of available server commands:");
                let visible: Vec<&str> = OP_CMDS
                    .iter()
                    .filter(|c| self.authed || !PRIVILEGED.contains(*c))
                    .copied()
                    .collect();
                session.send(&format!("  {}", visible.join(", ")));
                true
            }
            "login" => {
                if !config.op_password.is_empty() && rest == config.op_password {
                    self.authed = true;
                    session.send("Successfully logged as operator");
                    true
                } else {
                    false
                }
            }
            "users" => {
                session.send("Users listing:");
                for s in world.sessions.list() {
                    session.send(&format!("{}\t{}\t{}", s.client_id, s.name(), s.peer));
                }
                true
            }
            "kick" => {
                let target = rest.parse::<u64>().ok().and_then(|id| world.sessions.by_client_id(id));
                match target {
                    Some(target) => {
                        info!(by = session.client_id, kicked = target.client_id, "kick");
                        target.send("You have been kicked! (ouch...)");
                        target.set_silent();
                        target.shutdown_read();
                        world
                            .sessions
                            .broadcast_except(target.client_id, &format!("{} has been kicked!", target.name()));
                    }
                    None => session.send("Error: not a valid id"),
                }
                true
            }
            "save" => {
                match world.db.dump(&world.options.db_path) {
                    Ok(()) => session.send("Database saved"),
                    Err(e) => {
                        error!("save failed: {e}");
                        session.send("Save failed. Check server log.");
                    }
                }
                true
            }
            "load" => {
                match world.db.load(&world.options.db_path) {
                    Ok(()) => {
                        world.sessions.rebind_after_load(world);
                        session.send("Database loaded");
                    }
                    Err(morel_common::WorldError::SnapshotIo(e))
                        if e.kind() == std::io::ErrorKind::NotFound =>
                    {
                        session.send("Could not load: database not found.");
                    }
                    Err(e) => {
                        error!("load failed: {e}");
                        session.send("Load failed. Check server log.");
                    }
                }
                true
            }
            "shutdown" => {
                info!(by = %session.name(), "shutdown request");
                session.send("Shutting down");
                kill.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }
}
