use std::fmt::Write as _;

use crate::types::SkillTable;

/// Render a human-readable listing of every group and command.
///
/// Used for `/help` replies and the `courier skills` subcommand.
pub fn render_help(table: &SkillTable) -> String {
    let mut out = String::new();

    for group in table.groups() {
        let _ = write!(out, "## {}", group.name);
        if let Some(tag) = &group.tag {
            let _ = write!(out, " ({tag})");
        }
        out.push('\n');
        if !group.description.is_empty() {
            let _ = writeln!(out, "{}", group.description);
        }

        for command in &group.commands {
            let _ = write!(out, "- {}", command.usage_line());
            if command.admin_only {
                out.push_str(" (admin)");
            }
            if !command.description.is_empty() {
                let _ = write!(out, ": {}", command.description);
            }
            out.push('\n');
            if let Some(example) = &command.example {
                let _ = writeln!(out, "  e.g. {example}");
            }
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}
