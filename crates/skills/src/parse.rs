//! Tokenizing free text and extracting typed command parameters.

use crate::types::{Command, ParamSpec, ParamType, ParamValue, Params};

/// Punctuation ignored at the end of a tag or mention token (`@bot,`).
pub(crate) const TRAILING_PUNCTUATION: &[char] = &[',', '.', '!', '?', ':', ';'];

/// A whitespace-delimited token and the byte offset just past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub end: usize,
}

/// Split `input` on whitespace, keeping where each token ends so the
/// remainder after any token can be sliced out verbatim.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, ch) in input.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push(Token {
                    text: &input[s..i],
                    end: i,
                });
                start = None;
            },
            (false, None) => start = Some(i),
            _ => {},
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: &input[s..],
            end: input.len(),
        });
    }
    tokens
}

/// Lowercase a command token for comparison against stored triggers.
pub fn normalize_token(token: &str) -> String {
    token.to_lowercase()
}

/// Lowercase a tag/mention token and drop trailing punctuation.
pub fn normalize_tag(token: &str) -> String {
    token.trim_end_matches(TRAILING_PUNCTUATION).to_lowercase()
}

/// Extract parameters for `command` from the text following its trigger.
///
/// Each declared parameter consumes one token in order; `quoted` takes the
/// rest verbatim and `plural` takes every remaining token. Missing or
/// ill-typed values fall back to the declared default, or stay absent.
pub fn extract_params(command: &Command, remainder: &str) -> Params {
    let mut params = Params::new();
    let mut rest = remainder.trim_start();

    for spec in &command.params {
        let value = if spec.kind == ParamType::Quoted {
            let quoted = unquote(rest.trim());
            rest = "";
            (!quoted.is_empty()).then(|| ParamValue::Text(quoted.to_string()))
        } else if spec.plural {
            let items: Vec<String> = rest
                .split_whitespace()
                .filter_map(|token| coerce(spec, token))
                .filter_map(|value| match value {
                    ParamValue::Text(s) => Some(s),
                    ParamValue::Number(n) => Some(n.to_string()),
                    ParamValue::List(_) => None,
                })
                .collect();
            rest = "";
            (!items.is_empty()).then_some(ParamValue::List(items))
        } else {
            match next_token(rest) {
                Some((token, after)) => {
                    rest = after;
                    coerce(spec, token)
                },
                None => None,
            }
        };

        if let Some(value) = value.or_else(|| default_value(spec)) {
            params.insert(spec.name.clone(), value);
        }
    }

    params
}

fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(i) => Some((&input[..i], input[i..].trim_start())),
        None => Some((input, "")),
    }
}

fn default_value(spec: &ParamSpec) -> Option<ParamValue> {
    let raw = spec.default.as_deref()?;
    if spec.plural {
        return Some(ParamValue::List(vec![raw.to_string()]));
    }
    if spec.kind == ParamType::Quoted {
        return Some(ParamValue::Text(raw.to_string()));
    }
    coerce(spec, raw)
}

/// Type-check a single token against its declared parameter type.
fn coerce(spec: &ParamSpec, token: &str) -> Option<ParamValue> {
    match spec.kind {
        ParamType::String | ParamType::Quoted => Some(ParamValue::Text(token.to_string())),
        ParamType::Number => token
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ParamValue::Number),
        ParamType::Enum => spec
            .values
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(token))
            .map(|allowed| ParamValue::Text(allowed.clone())),
        ParamType::Address => is_address(token).then(|| ParamValue::Text(token.to_string())),
        ParamType::Username => {
            (token.len() > 1 && token.starts_with('@')).then(|| ParamValue::Text(token.to_string()))
        },
        ParamType::Url => (token.starts_with("https://") || token.starts_with("http://"))
            .then(|| ParamValue::Text(token.to_string())),
    }
}

fn is_address(token: &str) -> bool {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Remove one pair of matching enclosing quotes, then trim.
fn unquote(input: &str) -> &str {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('`', '`'), ('“', '”')];
    for (open, close) in PAIRS {
        if let Some(inner) = input
            .strip_prefix(*open)
            .and_then(|rest| rest.strip_suffix(*close))
        {
            return inner.trim();
        }
    }
    input
}
