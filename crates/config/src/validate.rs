//! Configuration validation.
//!
//! Detects unknown/misspelled fields in the raw document and reports settings
//! that make routing behave unexpectedly.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::schema::CourierConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "unknown-field", "identity", "file-ref", "routing"
    pub category: &'static str,
    /// Dotted path, e.g. "runner.experimental"
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Known sections and their fields.
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("identity", &["address", "inbox_id"]),
    ("runner", &["experimental", "attachments", "member_change"]),
    ("logging", &["msg_log"]),
    ("skills", &["path"]),
];

/// Validate a loaded config. `raw` is the untyped document (see
/// [`crate::load_config_value`]) and enables unknown-field detection.
pub fn validate(
    config: &CourierConfig,
    raw: Option<&serde_json::Value>,
    config_path: Option<&Path>,
) -> ValidationResult {
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path: config_path.map(Path::to_path_buf),
    };

    if let Some(raw) = raw {
        check_unknown_fields(raw, &mut result);
    }
    check_identity(config, &mut result);
    check_skills(config, config_path, &mut result);

    if config.runner.experimental {
        result.push(
            Severity::Info,
            "routing",
            "runner.experimental",
            "every message that passes the admin gate is routed to the generic handler",
        );
    }

    result.diagnostics.sort_by_key(|d| d.severity);
    result
}

fn check_unknown_fields(raw: &serde_json::Value, result: &mut ValidationResult) {
    let Some(root) = raw.as_object() else {
        result.push(
            Severity::Error,
            "unknown-field",
            "",
            "config root must be a table",
        );
        return;
    };

    for (section, value) in root {
        let Some((_, fields)) = KNOWN_KEYS.iter().find(|(name, _)| *name == section.as_str()) else {
            result.push(
                Severity::Warning,
                "unknown-field",
                section.clone(),
                format!("unknown section '{section}'"),
            );
            continue;
        };
        let Some(table) = value.as_object() else {
            continue;
        };
        for key in table.keys() {
            if !fields.contains(&key.as_str()) {
                result.push(
                    Severity::Warning,
                    "unknown-field",
                    format!("{section}.{key}"),
                    format!("unknown field '{key}'"),
                );
            }
        }
    }
}

fn check_identity(config: &CourierConfig, result: &mut ValidationResult) {
    let identity = &config.identity;
    if identity.address.is_none() && identity.inbox_id.is_none() {
        result.push(
            Severity::Warning,
            "identity",
            "identity",
            "no bot address or inbox id configured; the bot's own messages will not be suppressed",
        );
    }
    if let Some(address) = identity.address.as_deref() {
        let valid = address
            .strip_prefix("0x")
            .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));
        if !valid {
            result.push(
                Severity::Warning,
                "identity",
                "identity.address",
                format!("'{address}' is not a 0x-prefixed 20-byte hex address"),
            );
        }
    }
}

fn check_skills(config: &CourierConfig, config_path: Option<&Path>, result: &mut ValidationResult) {
    let Some(resolved) = config.skills.resolve(config_path) else {
        result.push(
            Severity::Info,
            "routing",
            "skills.path",
            "no skills file configured; only fallback routing is possible",
        );
        return;
    };
    if !resolved.exists() {
        result.push(
            Severity::Error,
            "file-ref",
            "skills.path",
            format!("skills file {} does not exist", resolved.display()),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::schema::{BotIdentity, SkillsConfig},
        serde_json::json,
    };

    fn configured() -> CourierConfig {
        CourierConfig {
            identity: BotIdentity::new(Some(&format!("0x{}", "ab".repeat(20))), None),
            ..Default::default()
        }
    }

    #[test]
    fn clean_config_has_no_warnings() {
        let result = validate(&configured(), Some(&json!({"runner": {"attachments": true}})), None);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 0);
    }

    #[test]
    fn unknown_section_and_field() {
        let raw = json!({"runner": {"experimentl": true}, "server": {}});
        let result = validate(&configured(), Some(&raw), None);
        let paths: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.category == "unknown-field")
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"runner.experimentl"));
        assert!(paths.contains(&"server"));
    }

    #[test]
    fn missing_identity_warns() {
        let result = validate(&CourierConfig::default(), None, None);
        assert!(result.diagnostics.iter().any(|d| d.path == "identity"));
    }

    #[test]
    fn malformed_address_warns() {
        let cfg = CourierConfig {
            identity: BotIdentity::new(Some("bot.eth"), None),
            ..Default::default()
        };
        let result = validate(&cfg, None, None);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.path == "identity.address" && d.severity == Severity::Warning)
        );
    }

    #[test]
    fn missing_skills_file_is_an_error() {
        let cfg = CourierConfig {
            skills: SkillsConfig {
                path: Some(PathBuf::from("/nonexistent/courier-skills.toml")),
            },
            ..configured()
        };
        let result = validate(&cfg, None, None);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn skills_path_resolves_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("skills.toml"), "").unwrap();
        let cfg = CourierConfig {
            skills: SkillsConfig {
                path: Some(PathBuf::from("skills.toml")),
            },
            ..configured()
        };
        let config_path = dir.path().join("courier.toml");
        let result = validate(&cfg, None, Some(&config_path));
        assert!(!result.has_errors());
    }
}
