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

//! Server configuration: defaults, overridden by a TOML file when one is
//! given.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Empty means listen on all addresses.
    pub listen_address: String,
    pub listen_port: u16,
    pub motd_file: PathBuf,
    pub db_file: PathBuf,
    pub op_password: String,
    pub op_command_prefix: char,
    /// Echo error detail to clients.
    pub debug: bool,
    /// Empty means log to stdout.
    pub log_file: PathBuf,
    /// Seconds between autosaves.
    pub autosave_period: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: String::new(),
            listen_port: 1337,
            motd_file: PathBuf::from("MOTD"),
            db_file: PathBuf::from("world.sav"),
            op_password: String::new(),
            op_command_prefix: '@',
            debug: false,
            log_file: PathBuf::from("server.log"),
            autosave_period: 300,
        }
    }
}

pub fn load(path: Option<&Path>) -> Result<Config, figment::Error> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.extract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.listen_port, 1337);
        assert_eq!(cfg.db_file, PathBuf::from("world.sav"));
        assert_eq!(cfg.op_command_prefix, '@');
        assert_eq!(cfg.autosave_period, 300);
    }

    #[test]
    fn toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "listen_port = 4000\nop_password = \"sesame\"\ndebug = true"
        )
        .unwrap();
        let cfg = load(Some(file.path())).unwrap();
        assert_eq!(cfg.listen_port, 4000);
        assert_eq!(cfg.op_password, "sesame");
        assert!(cfg.debug);
        // untouched keys keep their defaults
        assert_eq!(cfg.listen_port, 4000);
        assert_eq!(cfg.motd_file, PathBuf::from("MOTD"));
    }
}
