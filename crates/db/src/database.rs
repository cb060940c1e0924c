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

//! The database: the world state behind the writer-priority lock, plus
//! snapshot persistence. Snapshots are a single serialized id→object
//! mapping, written to `<path>.tmp` and renamed over `<path>`, so a failed
//! or interrupted dump never clobbers the previous one.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use morel_common::{ObjId, Object, WorldError};

use crate::lock::{ReadGuard, WorldLock, WriteGuard};
use crate::world_state::WorldState;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    last_id: u64,
    objects: BTreeMap<ObjId, Object>,
}

pub struct Database {
    lock: WorldLock<WorldState>,
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Database {
            lock: WorldLock::new(WorldState::new()),
        }
    }

    pub fn read(&self) -> ReadGuard<'_, WorldState> {
        self.lock.read()
    }

    pub fn write(&self) -> WriteGuard<'_, WorldState> {
        self.lock.write()
    }

    /// Serialize the whole graph. Holds the read side for the duration, so
    /// writers queue behind the dump but readers keep flowing.
    pub fn dump(&self, path: &Path) -> Result<(), WorldError> {
        let tmp = tmp_path(path);
        let result = {
            let ws = self.read();
            let snapshot = Snapshot {
                last_id: ws.last_id(),
                objects: ws.objects().clone(),
            };
            write_snapshot(&tmp, &snapshot)
        };
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), "world snapshot written");
        Ok(())
    }

    /// Replace the live graph with the snapshot at `path`. On any failure
    /// the in-memory state is left untouched.
    pub fn load(&self, path: &Path) -> Result<(), WorldError> {
        let file = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WorldError::SnapshotFormat(e.to_string()))?;

        let count = snapshot.objects.len();
        let mut ws = self.write();
        *ws = WorldState::set_contents_from_snapshot(snapshot.objects);
        info!(count, path = %path.display(), "world snapshot loaded");
        Ok(())
    }

    /// Load if the file exists; a missing snapshot just means a fresh
    /// world.
    pub fn load_if_present(&self, path: &Path) -> Result<bool, WorldError> {
        match self.load(path) {
            Ok(()) => Ok(true),
            Err(WorldError::SnapshotIo(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no snapshot found, starting fresh");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    s.into()
}

fn write_snapshot(tmp: &Path, snapshot: &Snapshot) -> Result<(), WorldError> {
    let file = File::create(tmp)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)
        .map_err(|e| WorldError::SnapshotFormat(e.to_string()))?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use morel_common::{Kind, Val};
    use pretty_assertions::assert_eq;

    #[test]
    fn dump_load_round_trips_ids_and_sharing() {
        let db = Database::new();
        let (room, apple, player) = {
            let mut ws = db.write();
            let room = ws.add(Object::room("garden"));
            let apple = ws.add(Object::thing("apple"));
            let player = ws.add(Object::player("ada"));
            ws.move_to(apple, Some(room)).unwrap();
            ws.move_to(player, Some(room)).unwrap();
            ws.get_mut(apple)
                .unwrap()
                .attrs
                .insert("taste".into(), Val::Str("sweet".into()));
            (room, apple, player)
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.sav");
        db.dump(&path).unwrap();
        assert!(!tmp_path(&path).exists());

        let restored = Database::new();
        restored.load(&path).unwrap();
        let ws = restored.read();
        assert_eq!(ws.search("garden", Some(Kind::Room)), vec![room]);
        assert_eq!(ws.get(apple).unwrap().location(), Some(room));
        // shared references still point at the same object
        assert!(ws.get(room).unwrap().contents().contains(&apple));
        assert!(ws.get(room).unwrap().contents().contains(&player));
        assert_eq!(
            ws.get(apple).unwrap().attrs.get("taste"),
            Some(&Val::Str("sweet".into()))
        );
        drop(ws);

        // new ids continue above everything loaded
        let next = restored.write().add(Object::thing("pear"));
        assert!(next.0 > player.0);
    }

    #[test]
    fn missing_snapshot_starts_fresh() {
        let db = Database::new();
        let dir = tempfile::tempdir().unwrap();
        let loaded = db.load_if_present(&dir.path().join("nope.sav")).unwrap();
        assert!(!loaded);
        assert!(db.read().is_empty());
    }

    #[test]
    fn corrupt_snapshot_keeps_current_state() {
        let db = Database::new();
        db.write().add(Object::thing("keepsake"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.sav");
        fs::write(&path, b"{ not json").unwrap();

        assert!(db.load(&path).is_err());
        assert_eq!(db.read().search("keepsake", None).len(), 1);
    }

    #[test]
    fn failed_dump_leaves_no_tmp_file() {
        let db = Database::new();
        let dir = tempfile::tempdir().unwrap();
        // dumping into a directory that does not exist fails cleanly
        let path = dir.path().join("missing").join("world.sav");
        assert!(db.dump(&path).is_err());
        assert!(!tmp_path(&path).exists());
    }
}
