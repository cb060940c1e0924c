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

//! The built-in command tables and the name-resolution helpers they share.
//! Rooms contribute the social/handling commands, players the basic
//! movement and perception set, and each power its own slice of the
//! building and engineering surface.

use morel_common::{ActionFailed, ObjId, Power, Val};
use morel_db::WorldState;

use crate::actions::BuiltinCmd;

mod digger;
mod engineer;
mod maker;
mod player;
mod room;

pub use digger::demolish_room;
pub use player::PLAYER_CMDS;
pub use room::ROOM_CMDS;

/// Built-ins contributed by one atomic power. Composite powers are
/// flattened by the dispatch pipeline before this is consulted.
pub fn power_cmds(power: Power) -> &'static [BuiltinCmd] {
    match power {
        Power::Digger => digger::DIGGER_CMDS,
        Power::SuperDigger => digger::SUPERDIGGER_CMDS,
        Power::Maker => maker::MAKER_CMDS,
        Power::Engineer => engineer::ENGINEER_CMDS,
        // God carries no commands of its own; its constituents do.
        Power::God => &[],
    }
}

/// Where a player currently stands, if anywhere.
pub fn room_of(ws: &WorldState, player: ObjId) -> Option<ObjId> {
    ws.get(player).and_then(|p| p.location())
}

/// Resolve a name against a candidate list with the standard
/// zero/one/many outcomes: not-found failure with the caller's message,
/// exactly one hit, or an ambiguity failure listing the choices.
pub fn resolve_plain(
    ws: &WorldState,
    query: &str,
    candidates: &[ObjId],
    notfound: &str,
) -> Result<ObjId, ActionFailed> {
    let hits = ws.match_among(query, candidates);
    match hits.as_slice() {
        [] => Err(ActionFailed::ObjectNotFound(notfound.to_string())),
        [one] => Ok(*one),
        many => Err(ActionFailed::Ambiguous(
            many.iter().map(|&id| ws.name_of(id)).collect(),
        )),
    }
}

/// Resolve a `#id`-or-name operand: database references reach anything,
/// the `me` and `here` aliases resolve first, and other names only reach
/// what the player can see.
pub fn resolve_target(ws: &WorldState, player: ObjId, token: &str) -> Result<ObjId, ActionFailed> {
    if token.starts_with('#') {
        return ws
            .dbref(token)
            .ok_or_else(|| ActionFailed::ObjectNotFound(format!("No such object {token}.")));
    }
    if token.eq_ignore_ascii_case("me") {
        return Ok(player);
    }
    if token.eq_ignore_ascii_case("here") {
        return room_of(ws, player)
            .ok_or_else(|| ActionFailed::NotHere("You're nowhere.".to_string()));
    }
    let reach = ws.reachable_of(player);
    resolve_plain(ws, token, &reach, &format!("You see nothing like '{token}' here."))
}

/// The object-aware rendering `eval` and `examine` print.
pub fn repr_val(ws: &WorldState, val: &Val) -> String {
    match val {
        Val::Obj(id) => ws.repr_of(*id),
        Val::List(items) => {
            let inner: Vec<String> = items.iter().map(|v| repr_val(ws, v)).collect();
            format!("[{}]", inner.join(", "))
        }
        other => other.repr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morel_common::Object;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolution_outcomes() {
        let mut ws = WorldState::new();
        let room = ws.add(Object::room("orchard"));
        let player = ws.add(Object::player("ada"));
        let apple = ws.add(Object::thing("apple"));
        let apricot = ws.add(Object::thing("apricot"));
        for id in [player, apple, apricot] {
            ws.move_to(id, Some(room)).unwrap();
        }
        let contents = ws.get(room).unwrap().contents().to_vec();

        assert_eq!(resolve_plain(&ws, "apple", &contents, "nope"), Ok(apple));
        assert_eq!(
            resolve_plain(&ws, "pear", &contents, "nope"),
            Err(ActionFailed::ObjectNotFound("nope".into()))
        );
        assert_eq!(
            resolve_plain(&ws, "ap", &contents, "nope"),
            Err(ActionFailed::Ambiguous(vec![
                "apple".into(),
                "apricot".into()
            ]))
        );
    }

    #[test]
    fn dbrefs_reach_past_the_room() {
        let mut ws = WorldState::new();
        let player = ws.add(Object::player("ada"));
        let far = ws.add(Object::thing("distant drum"));
        assert_eq!(resolve_target(&ws, player, "#1"), Ok(far));
        assert!(resolve_target(&ws, player, "#99").is_err());
        assert!(resolve_target(&ws, player, "drum").is_err());
    }
}
