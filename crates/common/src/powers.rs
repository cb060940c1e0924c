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

//! Powers are capability bundles carried by players and things. Each power
//! contributes a set of built-in commands (the tables live in the kernel,
//! keyed by the atomic powers) and a flag. Composite powers flatten to their
//! constituent atoms; enumeration order is the order commands are offered to
//! the dispatch pipeline.

use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Power {
    Digger,
    SuperDigger,
    Maker,
    Engineer,
    God,
}

impl Power {
    /// The flattened atomic powers this power grants, in enumeration order.
    /// `God` is Engineer ∪ Maker ∪ SuperDigger; `SuperDigger` extends
    /// `Digger`.
    pub fn constituents(self) -> &'static [Power] {
        match self {
            Power::Digger => &[Power::Digger],
            Power::SuperDigger => &[Power::SuperDigger, Power::Digger],
            Power::Maker => &[Power::Maker],
            Power::Engineer => &[Power::Engineer],
            Power::God => &[
                Power::Engineer,
                Power::Maker,
                Power::SuperDigger,
                Power::Digger,
            ],
        }
    }

    /// The capability flag a bearer of this power answers `has_flag` for.
    pub fn flag(self) -> &'static str {
        match self {
            Power::Digger => "digger",
            Power::SuperDigger => "superdigger",
            Power::Maker => "maker",
            Power::Engineer => "engineer",
            Power::God => "god",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn god_flattens_the_union() {
        let atoms = Power::God.constituents();
        assert!(atoms.contains(&Power::Engineer));
        assert!(atoms.contains(&Power::Maker));
        assert!(atoms.contains(&Power::SuperDigger));
        assert!(atoms.contains(&Power::Digger));
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(Power::SuperDigger.to_string(), "superdigger");
        assert_eq!("SUPERDIGGER".parse::<Power>().unwrap(), Power::SuperDigger);
    }
}
