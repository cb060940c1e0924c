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

//! The dispatch pipeline: gather every action currently available to a
//! player, in priority order, and try them against the input line until one
//! matches. The available set is snapshotted under the read lock; the
//! winning action then executes under the write lock.
//!
//! Order: the player's own commands, pocket items (`o`-flagged), power
//! built-ins, the room — its `p`-flagged things, its built-ins, its own
//! commands — the enclosing thing's `i`-flagged commands when the player is
//! inside one, and finally the master room's things, unfiltered.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use morel_common::{CustomAction, ObjId, Val};
use morel_db::WorldState;

use crate::actions::{Action, CmdError, Ctx, split_command};
use crate::builtins::{PLAYER_CMDS, ROOM_CMDS, power_cmds};
use crate::script::{self, ScriptCtx};
use crate::sessions::Session;
use crate::world::World;

/// Build the available-action list for `player`, §-order preserved.
pub fn world_actions(ws: &WorldState, player: ObjId) -> Vec<Action> {
    let mut actions = Vec::new();
    let push_customs =
        |actions: &mut Vec<Action>,
         cmds: Vec<(String, CustomAction, ObjId)>,
         keep: fn(&CustomAction) -> bool| {
            for (name, action, owner) in cmds {
                if !keep(&action) {
                    continue;
                }
                actions.push(match action {
                    CustomAction::Script { code, .. } => Action::Custom { owner, name, code },
                    CustomAction::Matcher { pattern, code, .. } => Action::Matcher {
                        owner,
                        pattern,
                        code,
                    },
                });
            }
        };

    // the player's own commands, then their built-ins
    push_customs(&mut actions, ws.custom_cmds_of(player), |_| true);
    actions.extend(PLAYER_CMDS.iter().map(Action::Builtin));

    // pocket items that expose commands to their carrier
    let pockets: Vec<ObjId> = ws
        .get(player)
        .map(|p| p.contents().to_vec())
        .unwrap_or_default();
    for tid in &pockets {
        if ws.get(*tid).is_some_and(|o| o.is_thing()) {
            push_customs(&mut actions, ws.custom_cmds_of(*tid), |a| a.flags().owner);
        }
    }

    // built-ins contributed by powers, composites flattened
    let mut seen_power_cmds: Vec<&'static str> = Vec::new();
    for power in ws.powers_of(player) {
        for atom in power.constituents() {
            for def in power_cmds(*atom) {
                if !seen_power_cmds.contains(&def.name) {
                    seen_power_cmds.push(def.name);
                    actions.push(Action::Builtin(def));
                }
            }
        }
    }

    // where the player stands
    let location = ws.get(player).and_then(|p| p.location());
    if let Some(loc) = location {
        if ws.get(loc).is_some_and(|o| o.is_room()) {
            let roommates: Vec<ObjId> = ws
                .get(loc)
                .map(|r| r.contents().to_vec())
                .unwrap_or_default();
            for tid in roommates {
                if tid != player && ws.get(tid).is_some_and(|o| o.is_thing()) {
                    push_customs(&mut actions, ws.custom_cmds_of(tid), |a| a.flags().peer);
                }
            }
            actions.extend(ROOM_CMDS.iter().map(Action::Builtin));
            push_customs(&mut actions, ws.custom_cmds_of(loc), |_| true);
        } else if ws.get(loc).is_some_and(|o| o.is_thing()) {
            // nested containment: the enclosing thing speaks to its occupants
            push_customs(&mut actions, ws.custom_cmds_of(loc), |a| a.flags().interior);
        }
    }

    // the master room contributes everywhere
    if let Some(master) = ws.master_room() {
        let things: Vec<ObjId> = ws
            .get(master)
            .map(|r| r.contents().to_vec())
            .unwrap_or_default();
        for tid in things {
            if ws.get(tid).is_some_and(|o| o.is_thing()) {
                push_customs(&mut actions, ws.custom_cmds_of(tid), |_| true);
            }
        }
    }

    actions
}

/// Try `line` against the world actions for `player`. `Ok(true)` when one
/// matched (and therefore ran).
pub fn dispatch_world(
    world: &World,
    session: &Arc<Session>,
    player: ObjId,
    line: &str,
) -> Result<bool, CmdError> {
    let actions = {
        let ws = world.db.read();
        world_actions(&ws, player)
    };

    let (word, rest) = split_command(line);
    for action in actions {
        match action {
            Action::Builtin(def) => {
                if word != def.name {
                    continue;
                }
                let mut ctx = Ctx {
                    world,
                    session: session.clone(),
                    player,
                };
                (def.run)(&mut ctx, rest)?;
                return Ok(true);
            }
            Action::Custom { owner, name, code } => {
                if word != name.to_lowercase() {
                    continue;
                }
                let query: Val = rest.map(Val::from).unwrap_or(Val::Nil);
                run_owned_script(world, session, player, owner, &code, &[("query", query)])?;
                return Ok(true);
            }
            Action::Matcher {
                owner,
                pattern,
                code,
            } => {
                // patterns anchor at the start of the line, like the
                // authoring-time check promised
                let re = match Regex::new(&format!("^(?:{pattern})")) {
                    Ok(re) => re,
                    Err(e) => {
                        warn!(pattern, "stored matcher no longer compiles: {e}");
                        continue;
                    }
                };
                let Some(caps) = re.captures(line) else {
                    continue;
                };
                let groups = Val::List(
                    caps.iter()
                        .skip(1)
                        .map(|m| match m {
                            Some(m) => Val::Str(m.as_str().to_string()),
                            None => Val::Nil,
                        })
                        .collect(),
                );
                run_owned_script(world, session, player, owner, &code, &[("groups", groups)])?;
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Run a user-authored action body: write lock, standard environment,
/// `self` bound to the owning object.
pub fn run_owned_script(
    world: &World,
    session: &Arc<Session>,
    player: ObjId,
    owner: ObjId,
    code: &str,
    extra: &[(&str, Val)],
) -> Result<(), CmdError> {
    let mut ws = world.db.write();
    let mut ctx = ScriptCtx {
        world,
        ws: &mut *ws,
        self_id: Some(owner),
        caller: Some(player),
        session: Some(session.clone()),
    };
    script::run_program(&mut ctx, code, extra)?;
    Ok(())
}

lazy_static! {
    /// `<target> <name> <rest>` — the common operand shape of the authoring
    /// commands, where target may be a `#id`.
    pub static ref TARGET_NAME_REST: Regex =
        Regex::new(r"^(#\d+|\w+) (\S+) (.*)$").expect("static regex");
    /// `<target> <name>`
    pub static ref TARGET_NAME: Regex =
        Regex::new(r"^(#\d+|\w+) (\S+)$").expect("static regex");
    /// `<target> <rest>`
    pub static ref TARGET_REST: Regex =
        Regex::new(r"^(#\d+|\w+) (.*)$").expect("static regex");
    /// optional "to " prefix on movement commands
    pub static ref TO_PLACE: Regex = Regex::new(r"^(?:to )?(.*)$").expect("static regex");
}
