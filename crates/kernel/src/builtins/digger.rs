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

//! Digging and topology. `Digger` grants `dig`; `SuperDigger` adds linking,
//! teleportation and demolition on top.

use morel_common::{ActionFailed, Kind, ObjId, Object};
use morel_db::WorldState;

use crate::actions::{BuiltinCmd, CmdError, Ctx};
use crate::dispatch::TO_PLACE;
use crate::events::{dispatch_event, emit_to_room};
use crate::world::World;

use super::{resolve_plain, room_of};

pub static DIGGER_CMDS: &[BuiltinCmd] = &[BuiltinCmd {
    name: "dig",
    help: "dig <room name>: make a new room.",
    run: cmd_dig,
}];

pub static SUPERDIGGER_CMDS: &[BuiltinCmd] = &[
    BuiltinCmd {
        name: "link",
        help: "link [to] <place>: open an exit towards the place.",
        run: cmd_link,
    },
    BuiltinCmd {
        name: "unlink",
        help: "unlink <place>: remove the exit to that place.",
        run: cmd_unlink,
    },
    BuiltinCmd {
        name: "teleport",
        help: "teleport [to] <place>: place can be a # database ID",
        run: cmd_teleport,
    },
    BuiltinCmd {
        name: "demolish",
        help: "demolish <room>: blow a room up, scattering its contents.",
        run: cmd_demolish,
    },
];

fn strip_to(query: &str) -> &str {
    TO_PLACE
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(query)
}

fn cmd_dig(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(name) = rest else {
        return Err(ActionFailed::BadSyntax("Dig what? Try help dig".into()).into());
    };
    let mut ws = ctx.world.db.write();
    let new_room = ws.add(Object::room(name));

    match room_of(&ws, ctx.player) {
        None => {
            ctx.send("In a flash of darkness, a new place appears around you.");
            ws.move_to(ctx.player, Some(new_room))?;
            dispatch_event(
                ctx.world,
                &mut ws,
                Some(ctx.session.clone()),
                Some(ctx.player),
                new_room,
                "look",
                &[],
            )?;
        }
        Some(cur) => {
            // new rooms link both ways with where the digger stands
            if let Some(exits) = ws.get_mut(new_room).and_then(|r| r.exits_mut()) {
                exits.push(cur);
            }
            if let Some(exits) = ws.get_mut(cur).and_then(|r| r.exits_mut()) {
                exits.push(new_room);
            }
            let caller = ws.name_of(ctx.player);
            emit_to_room(
                ctx.world,
                &ws,
                cur,
                &format!("{caller} digs a hole that leads to {name}"),
            );
        }
    }
    Ok(())
}

fn cmd_link(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("Bawoops, you're nowhere.".into()).into());
    };
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Link what?".into()).into());
    };
    let rooms = ws.list_all(Some(Kind::Room));
    let dest = resolve_plain(
        &ws,
        strip_to(query),
        &rooms,
        "Don't know this place. Is it in Canada?",
    )?;
    if let Some(exits) = ws.get_mut(room).and_then(|r| r.exits_mut()) {
        exits.push(dest);
    }
    let caller = ws.name_of(ctx.player);
    let dest_name = ws.name_of(dest);
    emit_to_room(
        ctx.world,
        &ws,
        room,
        &format!("{caller} opens a new path towards {dest_name}"),
    );
    Ok(())
}

fn cmd_unlink(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("There's nothing here.".into()).into());
    };
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Unlink what?".into()).into());
    };
    let exits = ws
        .get(room)
        .map(|r| r.exits().to_vec())
        .unwrap_or_default();
    let dest = resolve_plain(&ws, query, &exits, "This room ain't connected to Canada.")?;
    if let Some(exits) = ws.get_mut(room).and_then(|r| r.exits_mut()) {
        exits.retain(|&e| e != dest);
    }
    let caller = ws.name_of(ctx.player);
    let dest_name = ws.name_of(dest);
    emit_to_room(
        ctx.world,
        &ws,
        room,
        &format!("{caller} removed the exit to {dest_name}"),
    );
    Ok(())
}

fn cmd_teleport(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("To where?".into()).into());
    };
    let mut ws = ctx.world.db.write();
    let place = strip_to(query);

    let dest = if place.starts_with('#') {
        let id = ws
            .dbref(place)
            .ok_or_else(|| ActionFailed::ObjectNotFound(format!("No such object {place}.")))?;
        if !ws.get(id).is_some_and(|o| o.is_room()) {
            return Err(
                ActionFailed::Custom(format!("{} is not a room!", ws.repr_of(id))).into(),
            );
        }
        id
    } else {
        let rooms = ws.list_all(Some(Kind::Room));
        resolve_plain(&ws, place, &rooms, "Don't know this place. Is it in Canada?")?
    };

    let name = ws.name_of(ctx.player);
    if let Some(old) = room_of(&ws, ctx.player) {
        emit_to_room(ctx.world, &ws, old, &format!("{name} vanishes. Gone."));
    }
    ws.move_to(ctx.player, Some(dest))?;
    dispatch_event(
        ctx.world,
        &mut ws,
        Some(ctx.session.clone()),
        Some(ctx.player),
        dest,
        "look",
        &[],
    )?;
    emit_to_room(
        ctx.world,
        &ws,
        dest,
        &format!("{name} pops into the room. Poof."),
    );
    Ok(())
}

fn cmd_demolish(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Demolish what?".into()).into());
    };
    let mut ws = ctx.world.db.write();
    let target = if query.starts_with('#') {
        ws.dbref(query)
            .ok_or_else(|| ActionFailed::ObjectNotFound(format!("No such object {query}.")))?
    } else {
        let rooms = ws.list_all(Some(Kind::Room));
        resolve_plain(&ws, query, &rooms, "Don't know this place. Is it in Canada?")?
    };
    if !ws.get(target).is_some_and(|o| o.is_room()) {
        return Err(ActionFailed::Custom(format!("{} is not a room!", ws.repr_of(target))).into());
    }
    demolish_room(ctx.world, &mut ws, ctx.player, target)
}

/// Demolition proper, shared with `destroy`: broadcast in the doomed room,
/// relocate its contents to the caller's location (the void when the caller
/// stands inside), repair the caller's room's exits, drop the room.
/// Other rooms' stale exit references are tolerated; traversal skips them.
pub fn demolish_room(
    world: &World,
    ws: &mut WorldState,
    caller: ObjId,
    room: ObjId,
) -> Result<(), CmdError> {
    let caller_room = room_of(ws, caller);
    let caller_name = ws.name_of(caller);
    emit_to_room(world, ws, room, &format!("{caller_name} blew up the place!"));

    let dest = if caller_room == Some(room) {
        None
    } else {
        caller_room
    };
    let contents = ws
        .get(room)
        .map(|r| r.contents().to_vec())
        .unwrap_or_default();
    for id in contents {
        if dest.is_none() && ws.get(id).is_some_and(|o| o.is_player()) {
            world.sessions.send_to_player(id, "You fall into the void of nothingness.");
        }
        let _ = ws.move_to(id, dest);
    }
    if let Some(cr) = caller_room
        && let Some(exits) = ws.get_mut(cr).and_then(|r| r.exits_mut())
    {
        exits.retain(|&e| e != room);
    }
    ws.remove(room);
    Ok(())
}
