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

//! Commands a room offers everyone standing in it.

use morel_common::ActionFailed;
use morel_common::util::unescape;

use crate::actions::{BuiltinCmd, CmdError, Ctx};
use crate::events::emit_to_room;

use super::{resolve_plain, room_of};

pub static ROOM_CMDS: &[BuiltinCmd] = &[
    BuiltinCmd {
        name: "say",
        help: "say <stuff>: say something out loud where you are.",
        run: cmd_say,
    },
    BuiltinCmd {
        name: "emit",
        help: "emit <stuff>: broadcast text in the current room.",
        run: cmd_emit,
    },
    BuiltinCmd {
        name: "take",
        help: "take <thing>: pick something up and pocket it.",
        run: cmd_take,
    },
    BuiltinCmd {
        name: "drop",
        help: "drop <thing>: take something out of your pocket and leave it.",
        run: cmd_drop,
    },
];

fn cmd_say(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("You're nowhere.".into()).into());
    };
    let text = rest.unwrap_or("");
    let name = ws.name_of(ctx.player);
    emit_to_room(ctx.world, &ws, room, &format!("{name} says: {text}"));
    Ok(())
}

fn cmd_emit(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("You're nowhere.".into()).into());
    };
    emit_to_room(ctx.world, &ws, room, &unescape(rest.unwrap_or("")));
    Ok(())
}

fn cmd_take(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("You're nowhere.".into()).into());
    };
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Take what?".into()).into());
    };
    let contents = ws
        .get(room)
        .map(|r| r.contents().to_vec())
        .unwrap_or_default();
    let obj = resolve_plain(&ws, query, &contents, "Can't see a thing named that here")?;
    let caller_name = ws.name_of(ctx.player);

    if obj == ctx.player {
        emit_to_room(
            ctx.world,
            &ws,
            room,
            &format!("{caller_name} tries to fold themselves into their own pocket, but fails."),
        );
        return Ok(());
    }
    let name = ws.name_of(obj);
    if ws.has_flag(obj, "big") {
        return Err(ActionFailed::TooBig(name).into());
    }
    ws.move_to(obj, Some(ctx.player))?;
    emit_to_room(
        ctx.world,
        &ws,
        room,
        &format!("{caller_name} puts {name} in their pocket."),
    );
    Ok(())
}

fn cmd_drop(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(ActionFailed::NotHere("You're nowhere.".into()).into());
    };
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Drop what?".into()).into());
    };
    let pockets = ws
        .get(ctx.player)
        .map(|p| p.contents().to_vec())
        .unwrap_or_default();
    let obj = resolve_plain(&ws, query, &pockets, "You don't have that in your pockets.")?;
    ws.move_to(obj, Some(room))?;
    let caller_name = ws.name_of(ctx.player);
    let name = ws.name_of(obj);
    emit_to_room(
        ctx.world,
        &ws,
        room,
        &format!("{caller_name} takes {name} out of their pocket and leaves it."),
    );
    Ok(())
}
