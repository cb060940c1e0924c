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

//! The hub handed to everything that acts on the world: the database, the
//! scheduler handle, the live-session registry, and engine options. Cheap to
//! clone; all members are shared.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use morel_db::Database;

use crate::game::Game;
use crate::sessions::Registry;

pub struct WorldOptions {
    /// Echo error detail to clients instead of a generic apology.
    pub debug: bool,
    /// Where snapshots go, for autosave and shutdown dumps.
    pub db_path: PathBuf,
    pub autosave_period: Duration,
}

impl Default for WorldOptions {
    fn default() -> Self {
        WorldOptions {
            debug: false,
            db_path: PathBuf::from("world.sav"),
            autosave_period: Duration::from_secs(300),
        }
    }
}

#[derive(Clone)]
pub struct World {
    pub db: Arc<Database>,
    pub game: Game,
    pub sessions: Arc<Registry>,
    pub options: Arc<WorldOptions>,
}

impl World {
    /// Assemble a world around a database and start the scheduler worker.
    pub fn boot(db: Arc<Database>, options: WorldOptions) -> World {
        let (game, game_rx) = Game::new();
        let world = World {
            db,
            game,
            sessions: Arc::new(Registry::new()),
            options: Arc::new(options),
        };
        crate::game::spawn_game_loop(game_rx, world.clone());
        world
    }
}
