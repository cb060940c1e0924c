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

//! Event dispatch and room emission. Every object can be dispatched an
//! event by name: a scripted handler runs first (walking the parent chain),
//! then the built-in handler its kind declares, if any. A scripted handler
//! interrupts the built-in only by raising the failure signal; script
//! errors are reported to the caller and the chain continues.

use std::sync::Arc;

use tracing::warn;

use morel_common::{ActionFailed, ObjId, Val};
use morel_db::WorldState;

use crate::script::{self, ScriptCtx, ScriptError};
use crate::sessions::Session;
use crate::template;
use crate::world::World;

/// Send a line to every connected player standing in `room`.
pub fn emit_to_room(world: &World, ws: &WorldState, room: ObjId, msg: &str) {
    let Some(room) = ws.get(room) else { return };
    for &id in room.contents() {
        if ws.get(id).is_some_and(|o| o.is_player()) {
            world.sessions.send_to_player(id, msg);
        }
    }
}

/// Same, but leaving one player out — the usual shape for third-person
/// notices.
pub fn emit_to_room_except(world: &World, ws: &WorldState, room: ObjId, except: ObjId, msg: &str) {
    let Some(room) = ws.get(room) else { return };
    for &id in room.contents() {
        if id != except && ws.get(id).is_some_and(|o| o.is_player()) {
            world.sessions.send_to_player(id, msg);
        }
    }
}

/// Dispatch `event` on `target`. Custom handler first, built-in second;
/// only `ActionFailed` from the custom handler stops the built-in from
/// running, and it propagates to the caller.
pub fn dispatch_event(
    world: &World,
    ws: &mut WorldState,
    session: Option<Arc<Session>>,
    caller: Option<ObjId>,
    target: ObjId,
    event: &str,
    extra: &[(&str, Val)],
) -> Result<(), ActionFailed> {
    if let Some((_, code)) = ws.event_handler(target, event) {
        let mut ctx = ScriptCtx {
            world,
            ws: &mut *ws,
            self_id: Some(target),
            caller,
            session: session.clone(),
        };
        match script::run_program(&mut ctx, &code, extra) {
            Ok(_) => {}
            Err(ScriptError::Failed(f)) => return Err(f),
            Err(e) => {
                let report = format!("exec error: {e}");
                match &session {
                    Some(session) => session.send(&report),
                    None => warn!(target = %ws.repr_of(target), event, "{report}"),
                }
            }
        }
    }

    builtin_handler(world, ws, session, caller, target, event);
    Ok(())
}

fn builtin_handler(
    world: &World,
    ws: &mut WorldState,
    session: Option<Arc<Session>>,
    caller: Option<ObjId>,
    target: ObjId,
    event: &str,
) {
    match event {
        "look" => render_look(world, ws, session, caller, target),
        "connect" => {
            // arriving players get their bearings
            if let Some(room) = ws.get(target).and_then(|o| o.location()) {
                render_look(world, ws, session, Some(target), room);
            }
        }
        _ => {}
    }
}

/// The built-in look handler: name and description, then the contents
/// block. The looker themselves and `invisible`-flagged objects are left
/// out of the listing; an `opaque` object shows no contents at all.
pub fn render_look(
    world: &World,
    ws: &mut WorldState,
    session: Option<Arc<Session>>,
    looker: Option<ObjId>,
    target: ObjId,
) {
    let Some(session) = session else { return };
    let Some(obj) = ws.get(target) else {
        session.send("You only see nothing. A lot of nothing.");
        return;
    };

    let name = obj.name.clone();
    let description = obj.description.clone();
    let is_room = obj.is_room();
    let has_contents = obj.is_room() || obj.is_thing() || obj.is_player();
    let opaque = ws.has_flag(target, "opaque");

    let rendered = {
        let mut ctx = ScriptCtx {
            world,
            ws: &mut *ws,
            self_id: Some(target),
            caller: looker,
            session: Some(session.clone()),
        };
        template::render(&mut ctx, target, looker, &description)
    };
    session.send(&format!("{name}: {rendered}"));

    if !has_contents || opaque {
        return;
    }
    let visible: Vec<String> = ws
        .get(target)
        .map(|o| {
            o.contents()
                .iter()
                .filter(|&&id| Some(id) != looker)
                .filter(|&&id| !ws.has_flag(id, "invisible"))
                .filter_map(|&id| ws.get(id).map(|o| o.name.clone()))
                .collect()
        })
        .unwrap_or_default();

    if visible.is_empty() {
        if is_room {
            session.send("");
            session.send("It is empty");
        }
        return;
    }
    session.send("");
    session.send("Contents:");
    for name in visible {
        session.send(&format!(" - {name}"));
    }
}
