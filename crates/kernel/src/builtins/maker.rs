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

//! Making and unmaking things.

use morel_common::{ActionFailed, Object};

use crate::actions::{BuiltinCmd, CmdError, Ctx};
use crate::events::emit_to_room;

use super::{demolish_room, resolve_target, room_of};

pub static MAKER_CMDS: &[BuiltinCmd] = &[
    BuiltinCmd {
        name: "make",
        help: "make <thing name>: make things. Just regular things.",
        run: cmd_make,
    },
    BuiltinCmd {
        name: "destroy",
        help: "destroy <thing>: destroy things. Anything, really.",
        run: cmd_destroy,
    },
];

fn cmd_make(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("There is nowhere to make things into.".into()).into());
    };
    let Some(name) = rest else {
        return Err(ActionFailed::BadSyntax("Make what?".into()).into());
    };
    let thing = ws.add(Object::thing(name));
    ws.move_to(thing, Some(room))?;
    let caller = ws.name_of(ctx.player);
    emit_to_room(
        ctx.world,
        &ws,
        room,
        &format!("{caller} makes {name} appear out of thin air."),
    );
    Ok(())
}

fn cmd_destroy(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Destroy what?".into()).into());
    };
    let mut ws = ctx.world.db.write();
    // `#id` reaches anything in the database; names only the caller's reach
    let target = resolve_target(&ws, ctx.player, query)?;

    if ws.get(target).is_some_and(|o| o.is_room()) {
        return demolish_room(ctx.world, &mut ws, ctx.player, target);
    }
    if ws.get(target).is_some_and(|o| o.is_config()) {
        return Err(ActionFailed::NotPermitted("That would end the world.".into()).into());
    }

    let name = ws.name_of(target);
    let caller_name = ws.name_of(ctx.player);
    if let Some(room) = room_of(&ws, ctx.player) {
        emit_to_room(
            ctx.world,
            &ws,
            room,
            &format!("{caller_name} violently destroyed {name}!"),
        );
    }
    let was_player = ws.get(target).is_some_and(|o| o.is_player());
    let _ = ws.move_to(target, None);
    ws.remove(target);

    if was_player
        && let Some(session) = ctx.world.sessions.session_for_player(target)
    {
        session.unbind_player();
        session.send("Your character has been slain. You were kicked out of it");
    }
    Ok(())
}
