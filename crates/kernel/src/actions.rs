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

//! The action contract. Everything dispatchable is an `Action`: matching an
//! input line against one both decides and, on a hit, executes. Built-in
//! commands match on their lowercased first word; user-authored commands do
//! the same; regex matchers run their pattern against the whole line.

use std::sync::Arc;

use thiserror::Error;

use morel_common::{ActionFailed, ObjId, WorldError};

use crate::script::ScriptError;
use crate::sessions::Session;
use crate::world::World;

/// What a command execution can come back with. The dispatch boundary in
/// the session turns each of these into the right thing on the wire.
#[derive(Debug, Error)]
pub enum CmdError {
    #[error(transparent)]
    Failed(#[from] ActionFailed),
    #[error(transparent)]
    Script(ScriptError),
    #[error(transparent)]
    World(#[from] WorldError),
}

impl From<ScriptError> for CmdError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::Failed(f) => CmdError::Failed(f),
            other => CmdError::Script(other),
        }
    }
}

/// Execution context for a built-in command: the world, the session the
/// input arrived on, and the player it is bound to.
pub struct Ctx<'w> {
    pub world: &'w World,
    pub session: Arc<Session>,
    pub player: ObjId,
}

impl Ctx<'_> {
    pub fn send(&self, text: &str) {
        self.session.send(text);
    }
}

pub type RunFn = fn(&mut Ctx<'_>, Option<&str>) -> Result<(), CmdError>;

/// A built-in command: a name, a line of help, and the bound function.
pub struct BuiltinCmd {
    pub name: &'static str,
    pub help: &'static str,
    pub run: RunFn,
}

/// One dispatch candidate, assembled per input line.
pub enum Action {
    Builtin(&'static BuiltinCmd),
    Custom {
        owner: ObjId,
        name: String,
        code: String,
    },
    Matcher {
        owner: ObjId,
        pattern: String,
        code: String,
    },
}

impl Action {
    /// The name shown by `help`.
    pub fn name(&self) -> &str {
        match self {
            Action::Builtin(def) => def.name,
            Action::Custom { name, .. } => name,
            Action::Matcher { pattern, .. } => {
                pattern.split_whitespace().next().unwrap_or(pattern)
            }
        }
    }

    pub fn help(&self) -> &str {
        match self {
            Action::Builtin(def) => def.help,
            Action::Custom { .. } => "No help available",
            Action::Matcher { pattern, .. } => pattern,
        }
    }
}

/// Split an input line into its lowercased command word and the rest.
pub fn split_command(line: &str) -> (String, Option<&str>) {
    match line.split_once(' ') {
        Some((head, rest)) => {
            let rest = rest.trim();
            (
                head.to_lowercase(),
                if rest.is_empty() { None } else { Some(rest) },
            )
        }
        None => (line.to_lowercase(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_word_is_lowercased() {
        assert_eq!(split_command("Say hello there"), ("say".into(), Some("hello there")));
        assert_eq!(split_command("look"), ("look".into(), None));
        assert_eq!(split_command("look  "), ("look".into(), None));
    }

    #[test]
    fn matcher_names_use_the_first_pattern_word() {
        let a = Action::Matcher {
            owner: ObjId(1),
            pattern: r"put (\w+) in (\w+)".into(),
            code: String::new(),
        };
        assert_eq!(a.name(), "put");
    }
}
