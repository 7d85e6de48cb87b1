use std::collections::{BTreeMap, HashSet};

use {
    serde::{Deserialize, Serialize},
    tracing::warn,
};

use crate::{
    Error, Result,
    parse::{TRAILING_PUNCTUATION, normalize_tag},
};

// ── Parameters ──────────────────────────────────────────────────────────────

/// How a parameter token is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Any single token.
    #[default]
    String,
    /// A finite number.
    Number,
    /// The rest of the input, verbatim, with enclosing quotes removed.
    Quoted,
    /// One of the declared `values` (case-insensitive).
    Enum,
    /// An `0x`-prefixed 20-byte hex address.
    Address,
    /// A handle starting with `@`.
    Username,
    /// An `http://` or `https://` URL.
    Url,
}

/// Declared parameter of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: ParamType,
    /// Allowed values for [`ParamType::Enum`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Consume every remaining token.
    #[serde(default)]
    pub plural: bool,
    /// Applied when the token is missing or fails its type check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            values: Vec::new(),
            plural: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn quoted(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Quoted)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn one_of<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::new(name, ParamType::Enum)
        }
    }

    #[must_use]
    pub fn plural(mut self) -> Self {
        self.plural = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// An extracted parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Parameters extracted for a matched command, keyed by parameter name.
pub type Params = BTreeMap<String, ParamValue>;

// ── Commands and groups ─────────────────────────────────────────────────────

/// A single command (skill) a message can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    /// Usage line shown in help, e.g. `/check [domain] [cool_alternatives]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    /// Checked in order; the first matching trigger wins.
    pub triggers: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub admin_only: bool,
    /// Name of the handler bound at startup. `None` uses the generic handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: None,
            triggers: Vec::new(),
            params: Vec::new(),
            admin_only: false,
            handler: None,
            description: String::new(),
            example: None,
        }
    }

    #[must_use]
    pub fn trigger(mut self, trigger: impl Into<String>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    #[must_use]
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Usage line, derived from the first trigger and the parameter names
    /// when none was declared.
    pub fn usage_line(&self) -> String {
        if let Some(usage) = &self.usage {
            return usage.clone();
        }
        let mut line = self.triggers.first().cloned().unwrap_or_default();
        for param in &self.params {
            line.push_str(&format!(" [{}]", param.name));
        }
        line
    }
}

/// A named collection of commands, optionally addressed by a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Token (e.g. `@ensbot`) that routes to this group when no command matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Handler invoked when the tag is detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_handler: Option<String>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl SkillGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tag: None,
            tag_handler: None,
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>, handler: Option<&str>) -> Self {
        self.tag = Some(tag.into());
        self.tag_handler = handler.map(str::to_string);
        self
    }

    #[must_use]
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }
}

/// Position of a command inside a [`SkillTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CommandId {
    pub group: usize,
    pub command: usize,
}

/// Position of a group inside a [`SkillTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GroupId(pub usize);

/// The static, validated registry of every skill group.
///
/// Triggers and tags are stored lowercased so lookups compare exactly against
/// normalized input. Tags also lose trailing punctuation; triggers may not
/// end in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillTable {
    groups: Vec<SkillGroup>,
}

impl SkillTable {
    pub fn new(groups: Vec<SkillGroup>) -> Result<Self> {
        let mut groups = groups;
        let mut seen = HashSet::new();

        for group in &mut groups {
            if let Some(tag) = group.tag.as_mut() {
                *tag = normalize_tag(tag.trim());
                if tag.is_empty() {
                    return Err(Error::EmptyTag {
                        group: group.name.clone(),
                    });
                }
            }

            for command in &mut group.commands {
                validate_command(command)?;
                for trigger in &mut command.triggers {
                    *trigger = trigger.to_lowercase();
                    // Mention triggers are legitimately shared between commands.
                    if !trigger.starts_with('@') && !seen.insert(trigger.clone()) {
                        warn!(
                            command = %command.name,
                            trigger = %trigger,
                            "duplicate trigger, earlier command wins"
                        );
                    }
                }
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[SkillGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.commands.is_empty() && g.tag.is_none())
    }

    pub fn group(&self, id: GroupId) -> Option<&SkillGroup> {
        self.groups.get(id.0)
    }

    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.groups.get(id.group)?.commands.get(id.command)
    }

    /// Iterate every command with its position, in table order.
    pub fn commands(&self) -> impl Iterator<Item = (CommandId, &Command)> {
        self.groups.iter().enumerate().flat_map(|(g, group)| {
            group.commands.iter().enumerate().map(move |(c, command)| {
                (
                    CommandId {
                        group: g,
                        command: c,
                    },
                    command,
                )
            })
        })
    }

    /// Every handler name referenced by a command or a group tag.
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let referenced = self
            .groups
            .iter()
            .flat_map(|g| {
                g.commands
                    .iter()
                    .filter_map(|c| c.handler.as_deref())
                    .chain(g.tag_handler.as_deref())
            });
        for name in referenced {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Validate a command name: lowercase ASCII, digits, hyphens, 1-64 chars.
pub fn validate_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

fn validate_command(command: &Command) -> Result<()> {
    if !validate_name(&command.name) {
        return Err(Error::InvalidName {
            name: command.name.clone(),
        });
    }
    if command.triggers.is_empty() {
        return Err(Error::NoTriggers {
            command: command.name.clone(),
        });
    }
    for trigger in &command.triggers {
        if trigger.is_empty()
            || trigger.chars().any(char::is_whitespace)
            || trigger.ends_with(TRAILING_PUNCTUATION)
            || trigger == "@"
        {
            return Err(Error::invalid_trigger(&command.name, trigger));
        }
    }

    let mut names = HashSet::new();
    for (i, param) in command.params.iter().enumerate() {
        if !names.insert(param.name.as_str()) {
            return Err(Error::invalid_param(
                &command.name,
                &param.name,
                "declared twice",
            ));
        }
        if param.kind == ParamType::Enum && param.values.is_empty() {
            return Err(Error::invalid_param(
                &command.name,
                &param.name,
                "enum without values",
            ));
        }
        let consumes_rest = param.kind == ParamType::Quoted || param.plural;
        if consumes_rest && i + 1 != command.params.len() {
            return Err(Error::invalid_param(
                &command.name,
                &param.name,
                "quoted and plural parameters must come last",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn ens_group() -> SkillGroup {
        SkillGroup::new("ens")
            .tag("@EnsBot", Some("ens-tag"))
            .command(
                Command::new("register")
                    .trigger("/Register")
                    .param(ParamSpec::string("domain"))
                    .handler("ens"),
            )
            .command(
                Command::new("check")
                    .trigger("/check")
                    .param(ParamSpec::string("domain"))
                    .param(ParamSpec::quoted("cool_alternatives"))
                    .handler("ens"),
            )
    }

    #[test]
    fn triggers_and_tags_are_lowercased() {
        let table = SkillTable::new(vec![ens_group()]).unwrap();
        let group = &table.groups()[0];
        assert_eq!(group.tag.as_deref(), Some("@ensbot"));
        assert_eq!(group.commands[0].triggers, vec!["/register"]);
    }

    #[rstest]
    #[case::no_triggers(Command::new("lonely"))]
    #[case::bad_name(Command::new("Not Valid").trigger("/x"))]
    #[case::whitespace_trigger(Command::new("x").trigger("/a b"))]
    #[case::bare_at(Command::new("x").trigger("@"))]
    #[case::trailing_punctuation(Command::new("x").trigger("@bot!"))]
    #[case::quoted_not_last(
        Command::new("x")
            .trigger("/x")
            .param(ParamSpec::quoted("rest"))
            .param(ParamSpec::string("after"))
    )]
    #[case::enum_without_values(
        Command::new("x")
            .trigger("/x")
            .param(ParamSpec::new("kind", ParamType::Enum))
    )]
    #[case::duplicate_param(
        Command::new("x")
            .trigger("/x")
            .param(ParamSpec::string("a"))
            .param(ParamSpec::string("a"))
    )]
    fn invalid_commands_are_rejected(#[case] command: Command) {
        let group = SkillGroup::new("g").command(command);
        assert!(SkillTable::new(vec![group]).is_err());
    }

    #[test]
    fn invalid_trigger_reports_the_trigger() {
        let group = SkillGroup::new("g").command(Command::new("x").trigger("/help?"));
        assert!(matches!(
            SkillTable::new(vec![group]),
            Err(Error::InvalidTrigger { trigger, .. }) if trigger == "/help?"
        ));
    }

    #[test]
    fn tag_loses_trailing_punctuation() {
        let group = SkillGroup::new("g").tag(" @Bot! ", None);
        let table = SkillTable::new(vec![group]).unwrap();
        assert_eq!(table.groups()[0].tag.as_deref(), Some("@bot"));
    }

    #[test]
    fn empty_tag_is_rejected() {
        let group = SkillGroup::new("g").tag("  ", None);
        assert!(matches!(
            SkillTable::new(vec![group]),
            Err(Error::EmptyTag { .. })
        ));
    }

    #[test]
    fn handler_names_are_unique_and_ordered() {
        let table = SkillTable::new(vec![ens_group()]).unwrap();
        assert_eq!(table.handler_names(), vec!["ens", "ens-tag"]);
    }

    #[test]
    fn usage_line_falls_back_to_trigger_and_params() {
        let table = SkillTable::new(vec![ens_group()]).unwrap();
        let check = &table.groups()[0].commands[1];
        assert_eq!(check.usage_line(), "/check [domain] [cool_alternatives]");
    }

    #[test]
    fn command_lookup_by_id() {
        let table = SkillTable::new(vec![ens_group()]).unwrap();
        let ids: Vec<_> = table.commands().map(|(id, c)| (id, c.name.clone())).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(table.command(ids[1].0).map(|c| c.name.as_str()), Some("check"));
        assert!(table.group(GroupId(3)).is_none());
    }
}
