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

//! The object graph itself: an id-keyed arena with a monotonic id counter.
//! All cross-references are ids resolved on access, so cycles (rooms contain
//! players, players point back at rooms) cost nothing, and stale references
//! are simply skipped by whoever traverses them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use morel_common::{Kind, ObjId, Object, Power, Val, WorldError, match_list, match_name};

/// Attribute/command/event lookups fall through the parent chain at most
/// this far; a cycle in the chain just stops resolving.
const PARENT_DEPTH_LIMIT: usize = 64;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WorldState {
    #[serde(default)]
    objects: BTreeMap<ObjId, Object>,
    #[serde(default)]
    last_id: u64,
}

impl WorldState {
    pub fn new() -> Self {
        WorldState::default()
    }

    /// Insert an object, assigning the next id. Ids are never reused.
    pub fn add(&mut self, mut obj: Object) -> ObjId {
        let id = ObjId(self.last_id);
        self.last_id += 1;
        obj.id = id;
        self.objects.insert(id, obj);
        id
    }

    /// Remove an object from the graph. Does not cascade: the caller is
    /// responsible for repairing locators that pointed at it.
    pub fn remove(&mut self, id: ObjId) -> Option<Object> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: ObjId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjId, &Object)> {
        self.objects.iter()
    }

    /// Linear scan for objects whose name matches `short` under the prefix
    /// rule, optionally narrowed to one kind.
    pub fn search(&self, short: &str, kind: Option<Kind>) -> Vec<ObjId> {
        self.objects
            .values()
            .filter(|o| kind.is_none_or(|k| o.kind_tag() == k))
            .filter(|o| match_name(short, &o.name))
            .map(|o| o.id)
            .collect()
    }

    pub fn list_all(&self, kind: Option<Kind>) -> Vec<ObjId> {
        self.search("", kind)
    }

    /// Resolve a `#<digits>` token to a live object id.
    pub fn dbref(&self, token: &str) -> Option<ObjId> {
        let id = ObjId::parse_ref(token)?;
        self.contains(id).then_some(id)
    }

    pub fn name_of(&self, id: ObjId) -> String {
        self.get(id).map(|o| o.name.clone()).unwrap_or_default()
    }

    pub fn repr_of(&self, id: ObjId) -> String {
        match self.get(id) {
            Some(o) => o.repr(),
            None => format!("<{id} gone>"),
        }
    }

    /// Relocate a thing or player, keeping `x.location = c ⇔ x ∈ c.contents`
    /// in both directions. `None` moves it to nowhere.
    pub fn move_to(&mut self, id: ObjId, dest: Option<ObjId>) -> Result<(), WorldError> {
        let obj = self.get(id).ok_or(WorldError::NoSuchObject(id))?;
        if !obj.is_thing() && !obj.is_player() {
            return Err(WorldError::NotLocatable(id));
        }
        if let Some(dest) = dest {
            let target = self.get(dest).ok_or(WorldError::NoSuchObject(dest))?;
            if !target.is_room() && !target.is_thing() && !target.is_player() {
                return Err(WorldError::NotLocatable(dest));
            }
        }

        let old = self.get(id).and_then(|o| o.location());
        if let Some(old) = old
            && let Some(container) = self.get_mut(old)
            && let Some(contents) = container.contents_mut()
        {
            contents.retain(|&c| c != id);
        }
        if let Some(obj) = self.get_mut(id) {
            obj.set_location(dest);
        }
        if let Some(dest) = dest
            && let Some(container) = self.get_mut(dest)
            && let Some(contents) = container.contents_mut()
        {
            contents.push(id);
        }
        Ok(())
    }

    /// The singleton config object, created on first use.
    pub fn ensure_config(&mut self) -> ObjId {
        if let Some(id) = self.config_id() {
            return id;
        }
        self.add(Object::config())
    }

    pub fn config_id(&self) -> Option<ObjId> {
        self.objects.values().find(|o| o.is_config()).map(|o| o.id)
    }

    pub fn default_room(&self) -> Option<ObjId> {
        let cfg = self.config_id()?;
        match self.get(cfg)?.field("default_room")? {
            Val::Obj(id) => self.contains(id).then_some(id),
            _ => None,
        }
    }

    pub fn master_room(&self) -> Option<ObjId> {
        let cfg = self.config_id()?;
        match self.get(cfg)?.field("master_room")? {
            Val::Obj(id) => self.contains(id).then_some(id),
            _ => None,
        }
    }

    /// The parent chain above `id`, oldest last, bounded. A cycle just cuts
    /// the chain off at the limit.
    pub fn parents(&self, id: ObjId) -> Vec<ObjId> {
        let mut chain = Vec::new();
        let mut cursor = self.get(id).and_then(|o| o.parent);
        while let Some(pid) = cursor {
            if chain.len() >= PARENT_DEPTH_LIMIT || chain.contains(&pid) || pid == id {
                break;
            }
            chain.push(pid);
            cursor = self.get(pid).and_then(|o| o.parent);
        }
        chain
    }

    /// Attribute lookup with prototype fall-through: structural field, then
    /// the local attribute store, then the parent chain. `_`-prefixed names
    /// never fall through.
    pub fn attr(&self, id: ObjId, name: &str) -> Option<Val> {
        let obj = self.get(id)?;
        if let Some(v) = obj.field(name) {
            return Some(v);
        }
        if let Some(v) = obj.attrs.get(name) {
            return Some(v.clone());
        }
        if name.starts_with('_') {
            return None;
        }
        for pid in self.parents(id) {
            let parent = self.get(pid)?;
            if let Some(v) = parent.field(name) {
                return Some(v);
            }
            if let Some(v) = parent.attrs.get(name) {
                return Some(v.clone());
            }
        }
        None
    }

    /// Custom commands visible on `id`, child definitions shadowing parent
    /// ones of the same name. Each entry carries the object that actually
    /// defined it, which is what `self` binds to when it runs.
    pub fn custom_cmds_of(&self, id: ObjId) -> Vec<(String, morel_common::CustomAction, ObjId)> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        let mut ids = vec![id];
        ids.extend(self.parents(id));
        for oid in ids {
            let Some(obj) = self.get(oid) else { continue };
            for (name, action) in &obj.custom_cmds {
                if seen.contains(name) {
                    continue;
                }
                seen.push(name.clone());
                out.push((name.clone(), action.clone(), oid));
            }
        }
        out
    }

    /// The scripted handler for `event` on `id`, if any, walking the parent
    /// chain.
    pub fn event_handler(&self, id: ObjId, event: &str) -> Option<(ObjId, String)> {
        let mut ids = vec![id];
        ids.extend(self.parents(id));
        for oid in ids {
            if let Some(code) = self.get(oid).and_then(|o| o.custom_events.get(event)) {
                return Some((oid, code.clone()));
            }
        }
        None
    }

    /// Powers in effect for `id`: its own, any inherited from ancestors,
    /// and those carried by things in its pockets.
    pub fn powers_of(&self, id: ObjId) -> Vec<Power> {
        let mut out = Vec::new();
        let mut push = |p: Power, out: &mut Vec<Power>| {
            if !out.contains(&p) {
                out.push(p);
            }
        };
        let mut ids = vec![id];
        ids.extend(self.parents(id));
        for oid in &ids {
            if let Some(obj) = self.get(*oid) {
                for &p in obj.powers() {
                    push(p, &mut out);
                }
            }
        }
        if let Some(obj) = self.get(id) {
            for &tid in obj.contents() {
                if let Some(thing) = self.get(tid)
                    && thing.is_thing()
                {
                    for &p in thing.powers() {
                        push(p, &mut out);
                    }
                }
            }
        }
        out
    }

    /// Flag check across the object's own flags, its ancestors', and the
    /// flags of every power in effect.
    pub fn has_flag(&self, id: ObjId, flag: &str) -> bool {
        let mut ids = vec![id];
        ids.extend(self.parents(id));
        for oid in ids {
            if let Some(obj) = self.get(oid)
                && obj.flags.contains(flag)
            {
                return true;
            }
        }
        self.powers_of(id).iter().any(|p| {
            p.flag() == flag || p.constituents().iter().any(|c| c.flag() == flag)
        })
    }

    /// What a player can name without a db ref: their pockets, the place
    /// they stand in, and everything standing there with them.
    pub fn reachable_of(&self, player: ObjId) -> Vec<ObjId> {
        let mut out = Vec::new();
        let Some(obj) = self.get(player) else {
            return out;
        };
        out.extend(obj.contents());
        if let Some(loc) = obj.location()
            && let Some(room) = self.get(loc)
        {
            out.push(loc);
            out.extend(room.contents());
        }
        out.retain(|&id| self.contains(id));
        out
    }

    /// Prefix-resolve `query` against a candidate list, exact equality
    /// winning as usual.
    pub fn match_among(&self, query: &str, candidates: &[ObjId]) -> Vec<ObjId> {
        let named: Vec<(ObjId, &str)> = candidates
            .iter()
            .filter_map(|&id| self.get(id).map(|o| (id, o.name.as_str())))
            .collect();
        match_list(query, named)
    }

    pub(crate) fn set_contents_from_snapshot(objects: BTreeMap<ObjId, Object>) -> Self {
        let last_id = objects.keys().map(|id| id.0 + 1).max().unwrap_or(0);
        WorldState { objects, last_id }
    }

    pub(crate) fn objects(&self) -> &BTreeMap<ObjId, Object> {
        &self.objects
    }

    pub(crate) fn last_id(&self) -> u64 {
        self.last_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn world_with_room() -> (WorldState, ObjId) {
        let mut ws = WorldState::new();
        let room = ws.add(Object::room("hall"));
        (ws, room)
    }

    #[test]
    fn ids_are_monotonic_and_stable() {
        let mut ws = WorldState::new();
        let a = ws.add(Object::thing("a"));
        let b = ws.add(Object::thing("b"));
        assert_eq!(a, ObjId(0));
        assert_eq!(b, ObjId(1));
        ws.remove(a);
        let c = ws.add(Object::thing("c"));
        assert_eq!(c, ObjId(2), "removed ids are never reused");
        assert!(ws.get(a).is_none());
    }

    #[test]
    fn removed_objects_stop_matching() {
        let mut ws = WorldState::new();
        let apple = ws.add(Object::thing("apple"));
        assert_eq!(ws.search("apple", None), vec![apple]);
        ws.remove(apple);
        assert!(ws.search("apple", None).is_empty());
    }

    #[test]
    fn search_narrows_by_kind() {
        let mut ws = WorldState::new();
        let room = ws.add(Object::room("apple orchard"));
        let thing = ws.add(Object::thing("apple"));
        assert_eq!(ws.search("apple", Some(Kind::Room)), vec![room]);
        assert_eq!(ws.search("apple", Some(Kind::Thing)), vec![thing]);
        assert_eq!(ws.search("apple", None), vec![room, thing]);
    }

    #[test]
    fn dbref_resolves_live_ids_only() {
        let (mut ws, room) = world_with_room();
        assert_eq!(ws.dbref("#0"), Some(room));
        assert_eq!(ws.dbref("#42"), None);
        assert_eq!(ws.dbref("0"), None);
        ws.remove(room);
        assert_eq!(ws.dbref("#0"), None);
    }

    #[test]
    fn move_to_keeps_both_directions() {
        let (mut ws, room) = world_with_room();
        let apple = ws.add(Object::thing("apple"));
        ws.move_to(apple, Some(room)).unwrap();
        assert_eq!(ws.get(apple).unwrap().location(), Some(room));
        assert!(ws.get(room).unwrap().contents().contains(&apple));

        let player = ws.add(Object::player("ada"));
        ws.move_to(player, Some(room)).unwrap();
        ws.move_to(apple, Some(player)).unwrap();
        assert_eq!(ws.get(apple).unwrap().location(), Some(player));
        assert!(!ws.get(room).unwrap().contents().contains(&apple));
        assert!(ws.get(player).unwrap().contents().contains(&apple));

        ws.move_to(apple, None).unwrap();
        assert_eq!(ws.get(apple).unwrap().location(), None);
        assert!(!ws.get(player).unwrap().contents().contains(&apple));
    }

    #[test]
    fn rooms_do_not_move() {
        let (mut ws, room) = world_with_room();
        let other = ws.add(Object::room("garden"));
        assert!(matches!(
            ws.move_to(room, Some(other)),
            Err(WorldError::NotLocatable(_))
        ));
    }

    #[test]
    fn attrs_fall_through_the_parent_chain() {
        let mut ws = WorldState::new();
        let proto = ws.add(Object::thing("proto"));
        ws.get_mut(proto)
            .unwrap()
            .attrs
            .insert("color".into(), Val::Str("red".into()));
        ws.get_mut(proto)
            .unwrap()
            .attrs
            .insert("_secret".into(), Val::Int(1));

        let child = ws.add(Object::thing("child"));
        ws.get_mut(child).unwrap().parent = Some(proto);

        assert_eq!(ws.attr(child, "color"), Some(Val::Str("red".into())));
        // underscore attrs never fall through
        assert_eq!(ws.attr(child, "_secret"), None);
        assert_eq!(ws.attr(proto, "_secret"), Some(Val::Int(1)));
        // local attributes shadow inherited ones
        ws.get_mut(child)
            .unwrap()
            .attrs
            .insert("color".into(), Val::Str("blue".into()));
        assert_eq!(ws.attr(child, "color"), Some(Val::Str("blue".into())));
    }

    #[test]
    fn parent_cycles_are_bounded() {
        let mut ws = WorldState::new();
        let a = ws.add(Object::thing("a"));
        let b = ws.add(Object::thing("b"));
        ws.get_mut(a).unwrap().parent = Some(b);
        ws.get_mut(b).unwrap().parent = Some(a);
        assert_eq!(ws.parents(a), vec![b]);
        assert_eq!(ws.attr(a, "ghost"), None);
    }

    #[test]
    fn pocket_powers_flow_to_the_carrier() {
        let mut ws = WorldState::new();
        let player = ws.add(Object::player("ada"));
        let wand = ws.add(Object::thing("wand"));
        ws.get_mut(wand).unwrap().powers_mut().unwrap().push(Power::Digger);
        ws.move_to(wand, Some(player)).unwrap();

        assert_eq!(ws.powers_of(player), vec![Power::Digger]);
        assert!(ws.has_flag(player, "digger"));
        assert!(!ws.has_flag(player, "god"));
    }

    #[test]
    fn composite_power_answers_constituent_flags() {
        let mut ws = WorldState::new();
        let player = ws.add(Object::player("eve"));
        ws.get_mut(player).unwrap().powers_mut().unwrap().push(Power::God);
        for flag in ["god", "engineer", "maker", "superdigger", "digger"] {
            assert!(ws.has_flag(player, flag), "missing {flag}");
        }
    }

    #[test]
    fn reachable_covers_pockets_room_and_roommates() {
        let (mut ws, room) = world_with_room();
        let player = ws.add(Object::player("ada"));
        let coin = ws.add(Object::thing("coin"));
        let statue = ws.add(Object::thing("statue"));
        ws.move_to(player, Some(room)).unwrap();
        ws.move_to(coin, Some(player)).unwrap();
        ws.move_to(statue, Some(room)).unwrap();

        let reach = ws.reachable_of(player);
        for id in [coin, room, player, statue] {
            assert!(reach.contains(&id));
        }
    }

    #[test]
    fn custom_cmds_shadow_by_name() {
        let mut ws = WorldState::new();
        let proto = ws.add(Object::thing("proto"));
        let child = ws.add(Object::thing("child"));
        ws.get_mut(child).unwrap().parent = Some(proto);
        let script = |code: &str| morel_common::CustomAction::Script {
            code: code.into(),
            flags: Default::default(),
        };
        ws.get_mut(proto)
            .unwrap()
            .custom_cmds
            .insert("wave".into(), script("send(\"old\")"));
        ws.get_mut(proto)
            .unwrap()
            .custom_cmds
            .insert("bow".into(), script("send(\"bow\")"));
        ws.get_mut(child)
            .unwrap()
            .custom_cmds
            .insert("wave".into(), script("send(\"new\")"));

        let cmds = ws.custom_cmds_of(child);
        assert_eq!(cmds.len(), 2);
        let wave = cmds.iter().find(|(n, _, _)| n == "wave").unwrap();
        assert_eq!(wave.1.code(), "send(\"new\")");
        assert_eq!(wave.2, child, "defined on the child");
        let bow = cmds.iter().find(|(n, _, _)| n == "bow").unwrap();
        assert_eq!(bow.2, proto, "inherited from the prototype");
    }
}
