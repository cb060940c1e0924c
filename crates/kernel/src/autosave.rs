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

//! Periodic snapshots. A worker sleeps for the configured period, dumps,
//! and lets everyone online know the world is safe. A failed dump is
//! logged and the previous snapshot survives, courtesy of the
//! tmp-and-rename discipline.

use tracing::{debug, error};

use crate::world::World;

pub fn spawn_autosave(world: World) {
    std::thread::Builder::new()
        .name("morel-autosave".to_string())
        .spawn(move || {
            loop {
                std::thread::sleep(world.options.autosave_period);
                match world.db.dump(&world.options.db_path) {
                    Ok(()) => {
                        debug!("autosave complete");
                        if world.sessions.any_live() {
                            world.sessions.broadcast("Saving the world...");
                        }
                    }
                    Err(e) => error!("autosave failed: {e}"),
                }
            }
        })
        .expect("Failed to spawn autosave thread");
}
