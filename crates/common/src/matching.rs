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

//! Name matching, used everywhere a player names something. A short form
//! matches a full name when it is a case-insensitive prefix of the whole
//! name or of any whitespace-separated word of it. When a set of candidates
//! contains exact (case-insensitive) equalities, only those are returned:
//! the user could not have been more specific.

/// Does `short` name `full`?
pub fn match_name(short: &str, full: &str) -> bool {
    let short = short.to_lowercase();
    if full.to_lowercase().starts_with(&short) {
        return true;
    }
    full.split_whitespace()
        .any(|word| word.to_lowercase().starts_with(&short))
}

/// Filter `candidates` down to those named by `short`, exact equalities
/// taking precedence over prefix matches.
pub fn match_list<'a, T, I>(short: &str, candidates: I) -> Vec<T>
where
    I: IntoIterator<Item = (T, &'a str)>,
{
    let mut exact = Vec::new();
    let mut prefix = Vec::new();
    for (item, name) in candidates {
        if name.to_lowercase() == short.to_lowercase() {
            exact.push(item);
        } else if match_name(short, name) {
            prefix.push(item);
        }
    }
    if exact.is_empty() { prefix } else { exact }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn whole_and_word_prefixes() {
        assert!(match_name("app", "apple"));
        assert!(match_name("apple", "apple"));
        assert!(match_name("tree", "apple tree"));
        assert!(match_name("tr", "apple tree"));
        assert!(match_name("APPLE T", "apple tree"));
        assert!(!match_name("pple", "apple"));
    }

    #[test]
    fn identity_matches_for_any_name() {
        for name in ["a", "Apple", "red door"] {
            assert!(match_name(name, name));
        }
    }

    #[test]
    fn empty_short_matches_everything() {
        assert!(match_name("", "anything"));
    }

    #[test]
    fn exact_equality_wins_over_prefixes() {
        let candidates = vec![(1, "apple"), (2, "apple tree"), (3, "apricot")];
        assert_eq!(match_list("ap", candidates.clone()), vec![1, 2, 3]);
        assert_eq!(match_list("apple", candidates.clone()), vec![1]);
        assert_eq!(match_list("Apple", candidates), vec![1]);
    }

    #[test]
    fn no_match_is_empty() {
        let candidates = vec![(1, "apple")];
        assert_eq!(match_list("pear", candidates), Vec::<i32>::new());
    }
}
