//! Loading skill tables declared in TOML, YAML or JSON.
//!
//! ```toml
//! [[groups]]
//! name = "ens"
//! tag = "@ensbot"
//! tag_handler = "ens"
//!
//! [[groups.commands]]
//! name = "register"
//! triggers = ["/register"]
//! handler = "ens"
//! params = [{ name = "domain", type = "string" }]
//! ```

use std::path::Path;

use {serde::Deserialize, tracing::debug};

use crate::{
    Error, Result,
    types::{SkillGroup, SkillTable},
};

#[derive(Debug, Deserialize)]
struct SkillsFile {
    #[serde(default)]
    groups: Vec<SkillGroup>,
}

/// Read and validate a skills file; the format follows the extension.
pub fn load_table(path: &Path) -> Result<SkillTable> {
    let raw = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let table = parse_table(&raw, ext)?;
    debug!(
        path = %path.display(),
        groups = table.groups().len(),
        commands = table.commands().count(),
        "loaded skill table"
    );
    Ok(table)
}

/// Parse a skills document in the given format (`toml`, `yaml`/`yml`, `json`).
pub fn parse_table(raw: &str, format: &str) -> Result<SkillTable> {
    let file: SkillsFile = match format {
        "toml" => toml::from_str(raw)?,
        "yaml" | "yml" => serde_yaml::from_str(raw)?,
        "json" => serde_json::from_str(raw)?,
        other => {
            return Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            });
        },
    };
    SkillTable::new(file.groups)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::types::{ParamType, ParamValue},
        crate::resolve::resolve_command,
    };

    const TOML: &str = r#"
[[groups]]
name = "loyalty"
tag = "@stack"
tag_handler = "points"

[[groups.commands]]
name = "points"
triggers = ["/points"]
handler = "points"
description = "Check your points or the leaderboard."
params = [{ name = "type", type = "enum", values = ["me", "leaderboard"], default = "me" }]

[[groups.commands]]
name = "grant"
triggers = ["/grant"]
admin_only = true
params = [{ name = "to", type = "address" }, { name = "amount", type = "number" }]
"#;

    #[test]
    fn parses_toml_table() {
        let table = parse_table(TOML, "toml").unwrap();
        let group = &table.groups()[0];
        assert_eq!(group.tag.as_deref(), Some("@stack"));
        assert_eq!(group.commands.len(), 2);
        assert_eq!(group.commands[0].params[0].kind, ParamType::Enum);
        assert!(group.commands[1].admin_only);
        assert_eq!(group.commands[1].handler, None);

        let m = resolve_command("/points", &table).unwrap();
        assert_eq!(m.params["type"], ParamValue::Text("me".into()));
    }

    #[test]
    fn parses_yaml_table() {
        let yaml = r#"
groups:
  - name: ens
    commands:
      - name: info
        triggers: ["/info"]
        params:
          - name: domain
"#;
        let table = parse_table(yaml, "yaml").unwrap();
        let info = &table.groups()[0].commands[0];
        assert_eq!(info.params[0].kind, ParamType::String);
    }

    #[test]
    fn loads_from_disk_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills.json");
        std::fs::write(
            &path,
            r#"{"groups":[{"name":"g","commands":[{"name":"ping","triggers":["/PING"]}]}]}"#,
        )
        .unwrap();
        let table = load_table(&path).unwrap();
        assert_eq!(table.groups()[0].commands[0].triggers, vec!["/ping"]);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(matches!(
            parse_table("", "ini"),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn validation_errors_surface() {
        let raw = r#"{"groups":[{"name":"g","commands":[{"name":"Bad Name","triggers":["/x"]}]}]}"#;
        assert!(matches!(
            parse_table(raw, "json"),
            Err(Error::InvalidName { .. })
        ));
    }
}
