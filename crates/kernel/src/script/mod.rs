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

//! User scripting. Scripts are stored as source text owned by a world
//! object and compiled fresh against a throwaway environment on every
//! execution. The environment exposes `self`, `caller`, `here`, `db`,
//! `game`, `send`, `fail`, and whatever extras the invoker binds (`query`
//! for commands, `groups` for matchers). Proxied attribute access never
//! reveals `_`-prefixed internals; writes land in the attribute store.

use std::sync::Arc;

use thiserror::Error;

use morel_common::{ActionFailed, ObjId, Val};
use morel_db::WorldState;

use crate::sessions::Session;
use crate::world::World;

pub use eval::{call_lambda, run_program, run_scheduled};
pub use parse::parse_program;

pub mod ast;
mod eval;
mod parse;

/// Failure from user code. `Failed` is the script signalling the
/// distinguished user-visible failure; everything else reports to the
/// caller as `"<kind>: <message>"` and goes no further.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Failed(ActionFailed),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("name error: {0}")]
    Name(String),
    #[error("attribute error: {0}")]
    Attribute(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("value error: {0}")]
    Value(String),
}

/// Everything a running script may touch. Held for the duration of one
/// execution, under the database write lock.
pub struct ScriptCtx<'w, 'ws> {
    pub world: &'w World,
    pub ws: &'ws mut WorldState,
    /// The object the executed code belongs to; `self` in scripts.
    pub self_id: Option<ObjId>,
    /// The player on whose behalf the code runs, if any.
    pub caller: Option<ObjId>,
    /// Where `send` goes; scheduled scripts have no session and their
    /// `send` output is dropped.
    pub session: Option<Arc<Session>>,
}

impl ScriptCtx<'_, '_> {
    /// The binding for `here`: the caller's location, else the owner's.
    pub fn here(&self) -> Val {
        let at = |id: Option<ObjId>| {
            id.and_then(|i| self.ws.get(i))
                .and_then(|o| o.location())
        };
        at(self.caller).or_else(|| at(self.self_id)).into()
    }
}
