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

//! The failure taxonomy. `ActionFailed` is the distinguished user-visible
//! signal: anything raising it gets its `Display` text written to the client
//! verbatim, and nothing else happens. `WorldError` covers the engine-level
//! conditions (persistence, invariants) that are logged rather than shown.

use crate::model::ObjId;
use thiserror::Error;

/// User-visible command/script failure. Display output is the exact text
/// the dispatching session sends to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailed {
    #[error("{0}")]
    ObjectNotFound(String),
    #[error("Which one?\nChoices are: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
    #[error("{0}")]
    BadSyntax(String),
    #[error("{0}")]
    NotPermitted(String),
    #[error("{0}")]
    NotHere(String),
    #[error("{0} is too big.")]
    TooBig(String),
    #[error("'{0}'? Never heard of it.")]
    NoSuchAttribute(String),
    #[error("{0} is already online.")]
    AlreadyOnline(String),
    /// A failure signalled from user script code, message and all.
    #[error("{0}")]
    Custom(String),
}

/// Engine-level failures. These never reach a client as-is; the dispatch
/// boundary logs them and sends a generic apology (or the verbose text when
/// the server runs with `debug`).
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no such object: {0}")]
    NoSuchObject(ObjId),
    #[error("{0} cannot be moved")]
    NotLocatable(ObjId),
    #[error("parent chain of {0} does not terminate")]
    ParentCycle(ObjId),
    #[error("snapshot io: {0}")]
    SnapshotIo(#[from] std::io::Error),
    #[error("snapshot format: {0}")]
    SnapshotFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ambiguous_lists_candidates() {
        let e = ActionFailed::Ambiguous(vec!["apple".into(), "apricot".into()]);
        assert_eq!(e.to_string(), "Which one?\nChoices are: apple, apricot");
    }

    #[test]
    fn too_big_names_the_thing() {
        assert_eq!(
            ActionFailed::TooBig("piano".into()).to_string(),
            "piano is too big."
        );
    }
}
