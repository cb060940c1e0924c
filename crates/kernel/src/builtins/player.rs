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

//! Every player's basic senses: perception, movement, description.

use morel_common::ActionFailed;
use morel_common::util::unescape;

use crate::actions::{BuiltinCmd, CmdError, Ctx};
use crate::dispatch::{TARGET_REST, TO_PLACE};
use crate::events::{dispatch_event, emit_to_room};

use super::{resolve_plain, resolve_target, room_of};

pub static PLAYER_CMDS: &[BuiltinCmd] = &[
    BuiltinCmd {
        name: "look",
        help: "look [object]: see descriptions of things, people or places.",
        run: cmd_look,
    },
    BuiltinCmd {
        name: "go",
        help: "go [to] <place>: move to a different place.",
        run: cmd_go,
    },
    BuiltinCmd {
        name: "describe",
        help: "describe <object> <description>: give a description to a room, player or thing.",
        run: cmd_describe,
    },
];

fn cmd_look(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let query = rest.unwrap_or("here");
    let room = room_of(&ws, ctx.player);

    let target = if query.eq_ignore_ascii_case("me") {
        Some(ctx.player)
    } else if query.eq_ignore_ascii_case("here") {
        room
    } else {
        let reach = ws.reachable_of(ctx.player);
        let notfound = if room.is_none() {
            "You see nothing but you.".to_string()
        } else {
            format!("You see nothing like '{query}' here.")
        };
        Some(resolve_plain(&ws, query, &reach, &notfound)?)
    };

    match target {
        None => {
            ctx.send("You only see nothing. A lot of nothing.");
            Ok(())
        }
        Some(target) => {
            dispatch_event(
                ctx.world,
                &mut ws,
                Some(ctx.session.clone()),
                Some(ctx.player),
                target,
                "look",
                &[],
            )?;
            Ok(())
        }
    }
}

fn cmd_go(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let mut ws = ctx.world.db.write();
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Go where?".into()).into());
    };
    let Some(room) = room_of(&ws, ctx.player) else {
        return Err(
            ActionFailed::NotHere("You're nowhere. And can't go anywhere :'(".into()).into(),
        );
    };
    let place = TO_PLACE
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(query);

    // stale exit references are tolerated in the graph; traversal skips them
    let exits: Vec<_> = ws
        .get(room)
        .map(|r| r.exits().iter().copied().filter(|&e| ws.contains(e)).collect())
        .unwrap_or_default();
    let dest = resolve_plain(&ws, place, &exits, "Don't know this place. Is it in Canada?")?;

    let name = ws.name_of(ctx.player);
    emit_to_room(
        ctx.world,
        &ws,
        room,
        &format!("{} has gone to {}", name, ws.name_of(dest)),
    );
    emit_to_room(
        ctx.world,
        &ws,
        dest,
        &format!("{} arrives from {}", name, ws.name_of(room)),
    );
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
    Ok(())
}

fn cmd_describe(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Describe what?".into()).into());
    };
    let Some(caps) = TARGET_REST.captures(query) else {
        return Err(ActionFailed::BadSyntax("Describe what?".into()).into());
    };
    let (token, text) = (&caps[1], &caps[2]);

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    if let Some(obj) = ws.get_mut(target) {
        obj.description = unescape(text);
        let name = obj.name.clone();
        ctx.send(&format!("Added description of {name}"));
    }
    Ok(())
}
