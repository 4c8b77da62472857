use std::{fs::read_to_string, path::Path, str::FromStr};

use anyhow::Result;
use serde::Deserialize;

/// External-authentication settings.
#[derive(Deserialize, Debug, Clone)]
pub struct Auth {
    ///
    /// Identity-provider URL template.
    ///
    /// Must contain exactly one `%s` slot, which receives the token issued
    /// for the participant. This is the only setting without a default.
    ///
    pub url_template: String,
    ///
    /// Comma-separated room local parts that anyone may create without
    /// authenticating. Empty means no reserved rooms.
    ///
    #[serde(default)]
    pub reserved_rooms: String,
    ///
    /// Maximum time an unredeemed token lives, in milliseconds.
    ///
    #[serde(default = "Auth::token_lifetime_ms")]
    pub token_lifetime_ms: u64,
    ///
    /// Maximum time an authentication state lives while its room has not
    /// been created, in milliseconds. Once the room exists the state lives
    /// as long as the room.
    ///
    #[serde(default = "Auth::pre_auth_lifetime_ms")]
    pub pre_auth_lifetime_ms: u64,
    ///
    /// How often the background sweep looks for expired entries, in
    /// milliseconds.
    ///
    #[serde(default = "Auth::expiry_poll_interval_ms")]
    pub expiry_poll_interval_ms: u64,
}

impl Auth {
    fn token_lifetime_ms() -> u64 {
        60_000
    }

    fn pre_auth_lifetime_ms() -> u64 {
        30_000
    }

    fn expiry_poll_interval_ms() -> u64 {
        10_000
    }

    /// Reserved room names split out of the CSV form, whitespace trimmed,
    /// empty entries dropped.
    pub fn reserved_room_names(&self) -> Vec<String> {
        self.reserved_rooms
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub auth: Auth,
    #[serde(default)]
    pub log: Log,
}

impl Config {
    ///
    /// Load configuration from a TOML file.
    ///
    /// The embedding service owns the path; only `auth.url_template` is
    /// required, everything else falls back to its default.
    ///
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(toml::from_str(&read_to_string(path)?)?)
    }
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        toml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = "[auth]\nurl_template = \"https://idp/a?t=%s\"\n"
            .parse()
            .unwrap();

        assert_eq!(config.auth.token_lifetime_ms, 60_000);
        assert_eq!(config.auth.pre_auth_lifetime_ms, 30_000);
        assert_eq!(config.auth.expiry_poll_interval_ms, 10_000);
        assert!(config.auth.reserved_room_names().is_empty());
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn url_template_is_required() {
        assert!("[auth]\n".parse::<Config>().is_err());
    }

    #[test]
    fn reserved_rooms_csv_is_trimmed_and_filtered() {
        let config: Config = concat!(
            "[auth]\n",
            "url_template = \"https://idp/a?t=%s\"\n",
            "reserved_rooms = \" lobby , helpdesk ,, \"\n",
        )
        .parse()
        .unwrap();

        assert_eq!(
            config.auth.reserved_room_names(),
            vec!["lobby".to_string(), "helpdesk".to_string()]
        );
    }

    #[test]
    fn log_level_maps_onto_the_facade() {
        let config: Config = concat!(
            "[auth]\n",
            "url_template = \"https://idp/a?t=%s\"\n",
            "[log]\n",
            "level = \"debug\"\n",
        )
        .parse()
        .unwrap();

        assert_eq!(config.log.level.as_level(), log::Level::Debug);
    }
}
