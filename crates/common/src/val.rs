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

//! The value domain shared by dynamic attributes and the scripting language.
//! Everything here is plain persistable data; lambdas carry source text, not
//! compiled state, and are re-evaluated fresh each call.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::ObjId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum Val {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Obj(ObjId),
    List(Vec<Val>),
    Lambda(Lambda),
}

/// A deferred expression. `code` is the source text of the body; `captures`
/// is the defining environment snapshot, so a lambda scheduled from a handler
/// still sees `here` and friends when it fires later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub code: String,
    #[serde(default)]
    pub owner: Option<ObjId>,
    #[serde(default)]
    pub captures: BTreeMap<String, Val>,
}

impl Val {
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Nil => "nil",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::Str(_) => "string",
            Val::Obj(_) => "object",
            Val::List(_) => "list",
            Val::Lambda(_) => "lambda",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Val::Nil => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::Str(s) => !s.is_empty(),
            Val::Obj(_) => true,
            Val::List(l) => !l.is_empty(),
            Val::Lambda(_) => true,
        }
    }

    /// The quoted, round-trippable rendering used by `eval` and `examine`.
    /// `Display` is the bare rendering used by `%` formatting and `send`.
    pub fn repr(&self) -> String {
        match self {
            Val::Str(s) => format!("{:?}", s),
            Val::List(l) => {
                let inner: Vec<String> = l.iter().map(Val::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Val::Lambda(l) => format!("<lambda: {}>", l.code),
            other => other.to_string(),
        }
    }
}

impl Display for Val {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Val::Nil => write!(f, "nil"),
            Val::Bool(b) => write!(f, "{b}"),
            Val::Int(i) => write!(f, "{i}"),
            Val::Float(x) => write!(f, "{x}"),
            Val::Str(s) => write!(f, "{s}"),
            Val::Obj(id) => write!(f, "{id}"),
            Val::List(l) => {
                let inner: Vec<String> = l.iter().map(Val::repr).collect();
                write!(f, "[{}]", inner.join(", "))
            }
            Val::Lambda(l) => write!(f, "<lambda: {}>", l.code),
        }
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<ObjId> for Val {
    fn from(id: ObjId) -> Self {
        Val::Obj(id)
    }
}

impl<T: Into<Val>> From<Option<T>> for Val {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Val::Nil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_vs_repr() {
        assert_eq!(Val::Str("hi".into()).to_string(), "hi");
        assert_eq!(Val::Str("hi".into()).repr(), "\"hi\"");
        assert_eq!(Val::Obj(ObjId(3)).to_string(), "#3");
        assert_eq!(
            Val::List(vec![Val::Int(1), Val::Str("a".into())]).repr(),
            "[1, \"a\"]"
        );
    }

    #[test]
    fn truthiness() {
        assert!(!Val::Nil.truthy());
        assert!(!Val::Str(String::new()).truthy());
        assert!(Val::Obj(ObjId(0)).truthy());
        assert!(!Val::Int(0).truthy());
        assert!(Val::Int(-1).truthy());
    }
}
