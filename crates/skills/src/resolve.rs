//! Map free text to a registered command or a tagged skill group.
//!
//! Both lookups are pure: the same text and table always yield the same
//! result, and table order breaks every tie.

use serde::Serialize;

use crate::{
    parse::{self, Token},
    types::{CommandId, GroupId, Params, SkillTable},
};

/// A command selected by its trigger, with the parameters extracted from
/// the text that followed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandMatch {
    pub id: CommandId,
    /// The (normalized) trigger that matched.
    pub trigger: String,
    pub params: Params,
}

/// Find the first command whose trigger matches `text`.
///
/// Slash-style triggers must equal the first token; mention-style triggers
/// (`@bot`) may appear anywhere, even inside a token. Returns `None` when nothing matches.
pub fn resolve_command(text: &str, table: &SkillTable) -> Option<CommandMatch> {
    let text = text.trim();
    let tokens = parse::tokenize(text);
    let first = parse::normalize_token(tokens.first()?.text);

    for (id, command) in table.commands() {
        for trigger in &command.triggers {
            let Some(end) = match_trigger(trigger, &first, &tokens) else {
                continue;
            };
            return Some(CommandMatch {
                id,
                trigger: trigger.clone(),
                params: parse::extract_params(command, &text[end..]),
            });
        }
    }
    None
}

/// Byte offset where the arguments start when `trigger` matches.
///
/// Mentions are a containment check: the trigger may sit inside a token
/// (`(@dice)`, `@dice's`), and the arguments start after that token.
fn match_trigger(trigger: &str, first: &str, tokens: &[Token<'_>]) -> Option<usize> {
    if trigger.starts_with('@') {
        tokens
            .iter()
            .find(|token| parse::normalize_token(token.text).contains(trigger))
            .map(|token| token.end)
    } else if first == trigger {
        tokens.first().map(|token| token.end)
    } else {
        None
    }
}

/// Find the first skill group whose tag appears as a token in `text`.
pub fn resolve_group(text: &str, table: &SkillTable) -> Option<GroupId> {
    let tags: Vec<String> = parse::tokenize(text)
        .iter()
        .map(|token| parse::normalize_tag(token.text))
        .collect();

    table
        .groups()
        .iter()
        .position(|group| {
            group
                .tag
                .as_deref()
                .is_some_and(|tag| tags.iter().any(|t| t == tag))
        })
        .map(GroupId)
}
