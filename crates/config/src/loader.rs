use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{env_subst::substitute_env, schema::CourierConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format), then apply
/// `COURIER_*` environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<CourierConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load the config file as an untyped value (after env substitution), for
/// unknown-field validation.
pub fn load_config_value(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config_value(&raw, path)
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

/// Apply `COURIER_*` environment variables on top of file values.
///
/// | variable                | field                     |
/// |-------------------------|---------------------------|
/// | `COURIER_EXPERIMENTAL`  | `runner.experimental`     |
/// | `COURIER_ATTACHMENTS`   | `runner.attachments`      |
/// | `COURIER_MEMBER_CHANGE` | `runner.member_change`    |
/// | `COURIER_MSG_LOG`       | `logging.msg_log`         |
/// | `COURIER_BOT_ADDRESS`   | `identity.address`        |
/// | `COURIER_BOT_INBOX_ID`  | `identity.inbox_id`       |
/// | `COURIER_SKILLS`        | `skills.path`             |
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    let flag = |name: &str, target: &mut bool| {
        if let Some(raw) = lookup(name) {
            match parse_bool(&raw) {
                Some(value) => *target = value,
                None => warn!(variable = name, value = %raw, "ignoring non-boolean override"),
            }
        }
    };
    flag("COURIER_EXPERIMENTAL", &mut config.runner.experimental);
    flag("COURIER_ATTACHMENTS", &mut config.runner.attachments);
    flag("COURIER_MEMBER_CHANGE", &mut config.runner.member_change);
    flag("COURIER_MSG_LOG", &mut config.logging.msg_log);

    if let Some(address) = lookup("COURIER_BOT_ADDRESS").filter(|v| !v.is_empty()) {
        config.identity.address = Some(address);
    }
    if let Some(inbox_id) = lookup("COURIER_BOT_INBOX_ID").filter(|v| !v.is_empty()) {
        config.identity.inbox_id = Some(inbox_id);
    }
    if let Some(path) = lookup("COURIER_SKILLS").filter(|v| !v.is_empty()) {
        config.skills.path = Some(PathBuf::from(path));
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

fn parse_config_value(raw: &str, path: &Path) -> anyhow::Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parses_toml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(
            &path,
            "[runner]\nexperimental = true\n\n[identity]\naddress = \"0xbot\"\n",
        )
        .unwrap();
        let cfg = parse_config(&std::fs::read_to_string(&path).unwrap(), &path).unwrap();
        assert!(cfg.runner.experimental);
        assert_eq!(cfg.identity.address.as_deref(), Some("0xbot"));
    }

    #[test]
    fn parses_yaml_and_json() {
        let yaml = parse_config("runner:\n  member_change: true\n", Path::new("c.yaml")).unwrap();
        assert!(yaml.runner.member_change);
        let json = parse_config(r#"{"logging":{"msg_log":true}}"#, Path::new("c.json")).unwrap();
        assert!(json.logging.msg_log);
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(parse_config("", Path::new("courier.ini")).is_err());
    }

    #[test]
    fn value_form_keeps_unknown_keys() {
        let value = parse_config_value("[runner]\nexperimentl = true\n", Path::new("c.toml")).unwrap();
        assert_eq!(value["runner"]["experimentl"], serde_json::Value::Bool(true));
    }

    #[test]
    fn env_overrides_flags_and_identity() {
        let mut cfg = CourierConfig::default();
        cfg.runner.attachments = true;
        apply_env_overrides_with(
            &mut cfg,
            lookup_from(&[
                ("COURIER_EXPERIMENTAL", "yes"),
                ("COURIER_ATTACHMENTS", "0"),
                ("COURIER_MSG_LOG", "true"),
                ("COURIER_BOT_INBOX_ID", "inbox-9"),
                ("COURIER_SKILLS", "skills.yaml"),
            ]),
        );
        assert!(cfg.runner.experimental);
        assert!(!cfg.runner.attachments);
        assert!(!cfg.runner.member_change);
        assert!(cfg.logging.msg_log);
        assert_eq!(cfg.identity.inbox_id.as_deref(), Some("inbox-9"));
        assert_eq!(cfg.skills.path, Some(PathBuf::from("skills.yaml")));
    }

    #[test]
    fn invalid_boolean_override_is_ignored() {
        let mut cfg = CourierConfig::default();
        cfg.runner.member_change = true;
        apply_env_overrides_with(&mut cfg, lookup_from(&[("COURIER_MEMBER_CHANGE", "maybe")]));
        assert!(cfg.runner.member_change);
    }
}
