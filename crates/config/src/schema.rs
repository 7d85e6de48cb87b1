//! Config schema types (identity, runner flags, logging, skills).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub identity: BotIdentity,
    pub runner: RunnerConfig,
    pub logging: LoggingConfig,
    pub skills: SkillsConfig,
}

/// The bot's own identity on each protocol version, used to drop its own
/// messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotIdentity {
    /// Wallet address the v2 client signs with.
    pub address: Option<String>,
    /// Inbox id of the v3 client.
    pub inbox_id: Option<String>,
}

impl BotIdentity {
    pub fn new(address: Option<&str>, inbox_id: Option<&str>) -> Self {
        Self {
            address: address.map(str::to_string),
            inbox_id: inbox_id.map(str::to_string),
        }
    }

    /// Case-insensitive comparison against the bot's address.
    pub fn is_own_address(&self, address: Option<&str>) -> bool {
        matches!((self.address.as_deref(), address), (Some(own), Some(other)) if own.eq_ignore_ascii_case(other))
    }

    /// Case-insensitive comparison against the bot's inbox id.
    pub fn is_own_inbox(&self, inbox_id: Option<&str>) -> bool {
        matches!((self.inbox_id.as_deref(), inbox_id), (Some(own), Some(other)) if own.eq_ignore_ascii_case(other))
    }
}

/// Feature flags consulted by the validity rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Accept every message that passes the admin gate.
    pub experimental: bool,
    /// Accept remote attachments without a trigger.
    pub attachments: bool,
    /// Drop membership changes that added nobody.
    pub member_change: bool,
}

/// Message logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log every decision at `info` and every accepted message.
    pub msg_log: bool,
}

/// Where the skill table is declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// TOML/YAML/JSON skills file. Relative paths resolve against the working
    /// directory.
    pub path: Option<PathBuf>,
}

impl SkillsConfig {
    /// Effective skills file path. A relative path missing from the working
    /// directory is looked up next to the config file.
    pub fn resolve(&self, config_path: Option<&Path>) -> Option<PathBuf> {
        let path = self.path.as_deref()?;
        match config_path.and_then(Path::parent) {
            Some(dir) if path.is_relative() && !path.exists() => Some(dir.join(path)),
            _ => Some(path.to_path_buf()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_every_flag() {
        let cfg: CourierConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, CourierConfig::default());
        assert!(!cfg.runner.experimental);
        assert!(!cfg.runner.attachments);
        assert!(!cfg.runner.member_change);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let cfg: CourierConfig = toml::from_str(
            r#"
[identity]
inbox_id = "bot-inbox"

[runner]
attachments = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.identity.inbox_id.as_deref(), Some("bot-inbox"));
        assert!(cfg.identity.address.is_none());
        assert!(cfg.runner.attachments);
        assert!(!cfg.runner.experimental);
    }

    #[test]
    fn identity_matches_ignore_case() {
        let id = BotIdentity::new(Some("0xABCdef"), Some("Inbox-1"));
        assert!(id.is_own_address(Some("0xabcDEF")));
        assert!(!id.is_own_address(None));
        assert!(id.is_own_inbox(Some("inbox-1")));
        assert!(!id.is_own_inbox(Some("inbox-2")));
        assert!(!BotIdentity::default().is_own_inbox(Some("inbox-1")));
    }
}
