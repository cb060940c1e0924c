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

//! The world object model: a common header (id, name, description, flags,
//! parent, user-authored commands/events/attributes) plus a kind-specific
//! tail. Objects are pure data; behavior lives in the kernel. Every field
//! deserializes with a default so snapshots from older servers back-fill
//! cleanly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::powers::Power;
use crate::util::escape;
use crate::val::Val;

/// Stable database identifier. Assigned once at insertion, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjId(pub u64);

impl Display for ObjId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ObjId {
    /// Parse a `#<digits>` database reference token.
    pub fn parse_ref(token: &str) -> Option<ObjId> {
        let digits = token.strip_prefix('#')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(ObjId)
    }
}

/// The user-facing type tag, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Kind {
    Object,
    Thing,
    Room,
    Player,
    Config,
}

/// Availability flags on a user-authored command: `o` runs for the player
/// carrying the owning object, `p` for peers in the same room, `i` for
/// callers inside the owning object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdFlags {
    pub owner: bool,
    pub peer: bool,
    pub interior: bool,
}

impl Default for CmdFlags {
    fn default() -> Self {
        // unrestricted, like a command authored with no flag suffix
        CmdFlags {
            owner: true,
            peer: true,
            interior: true,
        }
    }
}

impl FromStr for CmdFlags {
    type Err = char;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = CmdFlags {
            owner: false,
            peer: false,
            interior: false,
        };
        for c in s.chars() {
            match c {
                'o' => flags.owner = true,
                'p' => flags.peer = true,
                'i' => flags.interior = true,
                other => return Err(other),
            }
        }
        Ok(flags)
    }
}

impl Display for CmdFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.owner {
            write!(f, "o")?;
        }
        if self.peer {
            write!(f, "p")?;
        }
        if self.interior {
            write!(f, "i")?;
        }
        Ok(())
    }
}

/// A user-authored action owned by an object. Stored as source text and
/// compiled fresh on every execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CustomAction {
    Script {
        code: String,
        #[serde(default)]
        flags: CmdFlags,
    },
    Matcher {
        pattern: String,
        code: String,
        #[serde(default)]
        flags: CmdFlags,
    },
}

impl CustomAction {
    pub fn flags(&self) -> CmdFlags {
        match self {
            CustomAction::Script { flags, .. } | CustomAction::Matcher { flags, .. } => *flags,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            CustomAction::Script { code, .. } | CustomAction::Matcher { code, .. } => code,
        }
    }

    /// One-line rendering for `examine` and `help`.
    pub fn summary(&self) -> String {
        match self {
            CustomAction::Script { code, .. } => format!("<code: {}>", escape(code)),
            CustomAction::Matcher { pattern, code, .. } => {
                format!("<match {}: {}>", pattern, escape(code))
            }
        }
    }
}

/// Kind-specific tail. The serde tag doubles as the user-facing type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjKind {
    Object,
    Room {
        #[serde(default)]
        contents: Vec<ObjId>,
        #[serde(default)]
        exits: Vec<ObjId>,
    },
    Thing {
        #[serde(default)]
        location: Option<ObjId>,
        #[serde(default)]
        contents: Vec<ObjId>,
        #[serde(default)]
        powers: Vec<Power>,
    },
    Player {
        #[serde(default)]
        location: Option<ObjId>,
        #[serde(default)]
        contents: Vec<ObjId>,
        #[serde(default)]
        powers: Vec<Power>,
    },
    Config {
        #[serde(default)]
        default_room: Option<ObjId>,
        #[serde(default)]
        master_room: Option<ObjId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(default)]
    pub id: ObjId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    #[serde(default)]
    pub parent: Option<ObjId>,
    #[serde(default)]
    pub custom_cmds: BTreeMap<String, CustomAction>,
    #[serde(default)]
    pub custom_events: BTreeMap<String, String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Val>,
    pub kind: ObjKind,
}

impl Object {
    fn new(name: &str, description: &str, kind: ObjKind) -> Self {
        Object {
            id: ObjId::default(),
            name: name.to_string(),
            description: description.to_string(),
            flags: BTreeSet::new(),
            parent: None,
            custom_cmds: BTreeMap::new(),
            custom_events: BTreeMap::new(),
            attrs: BTreeMap::new(),
            kind,
        }
    }

    pub fn object(name: &str) -> Self {
        Self::new(name, "An abstract object.", ObjKind::Object)
    }

    pub fn room(name: &str) -> Self {
        Self::new(
            name,
            "A blank room.",
            ObjKind::Room {
                contents: vec![],
                exits: vec![],
            },
        )
    }

    pub fn thing(name: &str) -> Self {
        Self::new(
            name,
            "A boring non-descript thing",
            ObjKind::Thing {
                location: None,
                contents: vec![],
                powers: vec![],
            },
        )
    }

    pub fn player(name: &str) -> Self {
        Self::new(
            name,
            "A non-descript citizen.",
            ObjKind::Player {
                location: None,
                contents: vec![],
                powers: vec![],
            },
        )
    }

    pub fn config() -> Self {
        Self::new(
            "config",
            "The main game config object. No big deal.",
            ObjKind::Config {
                default_room: None,
                master_room: None,
            },
        )
    }

    pub fn kind_tag(&self) -> Kind {
        match self.kind {
            ObjKind::Object => Kind::Object,
            ObjKind::Room { .. } => Kind::Room,
            ObjKind::Thing { .. } => Kind::Thing,
            ObjKind::Player { .. } => Kind::Player,
            ObjKind::Config { .. } => Kind::Config,
        }
    }

    pub fn fancy_name(&self) -> &'static str {
        match self.kind_tag() {
            Kind::Object => "object",
            Kind::Thing => "thing",
            Kind::Room => "room",
            Kind::Player => "player",
            Kind::Config => "config",
        }
    }

    pub fn is_room(&self) -> bool {
        matches!(self.kind, ObjKind::Room { .. })
    }

    pub fn is_thing(&self) -> bool {
        matches!(self.kind, ObjKind::Thing { .. })
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, ObjKind::Player { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self.kind, ObjKind::Config { .. })
    }

    /// Where this object is, for locatable kinds. Rooms are nowhere.
    pub fn location(&self) -> Option<ObjId> {
        match &self.kind {
            ObjKind::Thing { location, .. } | ObjKind::Player { location, .. } => *location,
            _ => None,
        }
    }

    pub fn set_location(&mut self, dest: Option<ObjId>) -> bool {
        match &mut self.kind {
            ObjKind::Thing { location, .. } | ObjKind::Player { location, .. } => {
                *location = dest;
                true
            }
            _ => false,
        }
    }

    pub fn contents(&self) -> &[ObjId] {
        match &self.kind {
            ObjKind::Room { contents, .. }
            | ObjKind::Thing { contents, .. }
            | ObjKind::Player { contents, .. } => contents,
            _ => &[],
        }
    }

    pub fn contents_mut(&mut self) -> Option<&mut Vec<ObjId>> {
        match &mut self.kind {
            ObjKind::Room { contents, .. }
            | ObjKind::Thing { contents, .. }
            | ObjKind::Player { contents, .. } => Some(contents),
            _ => None,
        }
    }

    pub fn exits(&self) -> &[ObjId] {
        match &self.kind {
            ObjKind::Room { exits, .. } => exits,
            _ => &[],
        }
    }

    pub fn exits_mut(&mut self) -> Option<&mut Vec<ObjId>> {
        match &mut self.kind {
            ObjKind::Room { exits, .. } => Some(exits),
            _ => None,
        }
    }

    pub fn powers(&self) -> &[Power] {
        match &self.kind {
            ObjKind::Thing { powers, .. } | ObjKind::Player { powers, .. } => powers,
            _ => &[],
        }
    }

    pub fn powers_mut(&mut self) -> Option<&mut Vec<Power>> {
        match &mut self.kind {
            ObjKind::Thing { powers, .. } | ObjKind::Player { powers, .. } => Some(powers),
            _ => None,
        }
    }

    /// Read a structural field by its user-visible name, if this object has
    /// it. Dynamic attributes are a separate store; lookup order and parent
    /// fall-through are the database's business.
    pub fn field(&self, name: &str) -> Option<Val> {
        match name {
            "id" => Some(Val::Int(self.id.0 as i64)),
            "name" => Some(Val::Str(self.name.clone())),
            "description" => Some(Val::Str(self.description.clone())),
            "parent" => Some(self.parent.into()),
            "flags" => Some(Val::List(
                self.flags.iter().map(|f| Val::Str(f.clone())).collect(),
            )),
            "location" => match &self.kind {
                ObjKind::Thing { location, .. } | ObjKind::Player { location, .. } => {
                    Some((*location).into())
                }
                _ => None,
            },
            "contents" => match &self.kind {
                ObjKind::Room { contents, .. }
                | ObjKind::Thing { contents, .. }
                | ObjKind::Player { contents, .. } => {
                    Some(Val::List(contents.iter().map(|&c| Val::Obj(c)).collect()))
                }
                _ => None,
            },
            "exits" => match &self.kind {
                ObjKind::Room { exits, .. } => {
                    Some(Val::List(exits.iter().map(|&e| Val::Obj(e)).collect()))
                }
                _ => None,
            },
            "powers" => match &self.kind {
                ObjKind::Thing { powers, .. } | ObjKind::Player { powers, .. } => Some(Val::List(
                    powers.iter().map(|p| Val::Str(p.to_string())).collect(),
                )),
                _ => None,
            },
            "default_room" => match &self.kind {
                ObjKind::Config { default_room, .. } => Some((*default_room).into()),
                _ => None,
            },
            "master_room" => match &self.kind {
                ObjKind::Config { master_room, .. } => Some((*master_room).into()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Write a structural field by name. `Ok(true)` when the name is a
    /// writable field of this object, `Ok(false)` when it is not structural
    /// at all (the caller falls back to the attribute store), and `Err` when
    /// it exists but cannot be written this way.
    pub fn set_field(&mut self, name: &str, value: &Val) -> Result<bool, &'static str> {
        fn as_obj_ref(value: &Val) -> Result<Option<ObjId>, &'static str> {
            match value {
                Val::Nil => Ok(None),
                Val::Obj(id) => Ok(Some(*id)),
                _ => Err("expected an object reference or nil"),
            }
        }

        match name {
            "name" => {
                self.name = value.to_string();
                Ok(true)
            }
            "description" => {
                self.description = value.to_string();
                Ok(true)
            }
            "parent" => {
                self.parent = as_obj_ref(value)?;
                Ok(true)
            }
            "default_room" => match &mut self.kind {
                ObjKind::Config { default_room, .. } => {
                    *default_room = as_obj_ref(value)?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            "master_room" => match &mut self.kind {
                ObjKind::Config { master_room, .. } => {
                    *master_room = as_obj_ref(value)?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            "id" | "location" | "contents" | "exits" | "flags" | "powers" => {
                Err("that attribute is managed by the engine")
            }
            _ => Ok(false),
        }
    }

    /// Names enumerable through the scripting proxy and `examine`: the
    /// structural fields this kind has, then dynamic attributes, with
    /// `_`-prefixed ones hidden.
    pub fn visible_attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["id", "name", "description", "parent", "flags"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match &self.kind {
            ObjKind::Object => {}
            ObjKind::Room { .. } => names.extend(["contents".into(), "exits".into()]),
            ObjKind::Thing { .. } | ObjKind::Player { .. } => {
                names.extend(["location".into(), "contents".into(), "powers".into()])
            }
            ObjKind::Config { .. } => {
                names.extend(["default_room".into(), "master_room".into()])
            }
        }
        names.extend(
            self.attrs
                .keys()
                .filter(|k| !k.starts_with('_'))
                .cloned(),
        );
        names
    }

    /// The `<#id kind name>` rendering used by `examine` and `eval`.
    pub fn repr(&self) -> String {
        format!("<{} {} {}>", self.id, self.fancy_name(), self.name)
    }

    /// A detached copy: same concrete kind, same plain attributes, fresh
    /// location/contents, scripted code re-owned by the clone once it gets
    /// an id. Does not enter the database.
    pub fn clone_fresh(&self) -> Object {
        let mut copy = self.clone();
        copy.id = ObjId::default();
        copy.set_location(None);
        if let Some(contents) = copy.contents_mut() {
            contents.clear();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ref_parsing() {
        assert_eq!(ObjId::parse_ref("#12"), Some(ObjId(12)));
        assert_eq!(ObjId::parse_ref("#"), None);
        assert_eq!(ObjId::parse_ref("12"), None);
        assert_eq!(ObjId::parse_ref("#12a"), None);
    }

    #[test]
    fn cmd_flags_round_trip() {
        let f: CmdFlags = "op".parse().unwrap();
        assert!(f.owner && f.peer && !f.interior);
        assert_eq!(f.to_string(), "op");
        assert_eq!(CmdFlags::default().to_string(), "opi");
        assert!("ox".parse::<CmdFlags>().is_err());
    }

    #[test]
    fn fields_by_kind() {
        let room = Object::room("hall");
        assert_eq!(room.fancy_name(), "room");
        assert_eq!(room.field("exits"), Some(Val::List(vec![])));
        assert_eq!(room.field("location"), None);

        let player = Object::player("ada");
        assert_eq!(player.field("location"), Some(Val::Nil));
        assert_eq!(player.field("exits"), None);
    }

    #[test]
    fn engine_fields_not_writable() {
        let mut thing = Object::thing("rock");
        assert!(thing.set_field("contents", &Val::Nil).is_err());
        assert_eq!(thing.set_field("shade", &Val::Int(1)), Ok(false));
        assert_eq!(thing.set_field("name", &Val::Str("stone".into())), Ok(true));
        assert_eq!(thing.name, "stone");
    }

    #[test]
    fn clone_is_detached() {
        let mut thing = Object::thing("sack");
        thing.id = ObjId(9);
        thing.set_location(Some(ObjId(2)));
        thing.contents_mut().unwrap().push(ObjId(5));
        thing.attrs.insert("weight".into(), Val::Int(3));

        let copy = thing.clone_fresh();
        assert_eq!(copy.id, ObjId::default());
        assert_eq!(copy.location(), None);
        assert!(copy.contents().is_empty());
        assert_eq!(copy.attrs.get("weight"), Some(&Val::Int(3)));
    }

    #[test]
    fn old_snapshot_backfills_missing_fields() {
        // a record written before custom_events / attrs existed
        let json = r#"{"id": 4, "name": "door", "kind": {"type": "thing"}}"#;
        let obj: Object = serde_json::from_str(json).unwrap();
        assert_eq!(obj.id, ObjId(4));
        assert!(obj.custom_events.is_empty());
        assert!(obj.attrs.is_empty());
        assert_eq!(obj.location(), None);
    }
}
