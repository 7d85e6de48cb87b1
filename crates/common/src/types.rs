//! Version-agnostic message model shared by the resolver, the validity
//! engine and the dispatcher.

use std::fmt;

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::{Error, Result};

// ── Protocol version ────────────────────────────────────────────────────────

/// Wire protocol a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// Legacy address-based protocol.
    V2,
    /// Inbox-based protocol with group roles.
    V3,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Message kind ────────────────────────────────────────────────────────────

/// Content type family of a message, derived from its wire type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Reply,
    RemoteAttachment,
    Reaction,
    GroupUpdate,
    Other,
}

impl MessageKind {
    /// Map a wire content type id (e.g. `remoteStaticAttachment`) to a kind.
    ///
    /// Unknown ids map to [`MessageKind::Other`].
    pub fn from_type_id(type_id: &str) -> Self {
        match type_id {
            "text" => Self::Text,
            "reply" => Self::Reply,
            "remoteStaticAttachment" => Self::RemoteAttachment,
            "reaction" => Self::Reaction,
            "group_updated" => Self::GroupUpdate,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Reply => "reply",
            Self::RemoteAttachment => "remote_attachment",
            Self::Reaction => "reaction",
            Self::GroupUpdate => "group_update",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Content payloads ────────────────────────────────────────────────────────

/// Reference to an inbox inside a membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxRef {
    pub inbox_id: String,
}

/// Membership change inside a group conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupUpdate {
    pub initiated_by_inbox_id: Option<String>,
    pub added_inboxes: Vec<InboxRef>,
    pub removed_inboxes: Vec<InboxRef>,
}

/// Pointer to an encrypted attachment hosted elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAttachment {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextPayload {
    Plain(String),
    Object { text: String },
}

impl From<TextPayload> for String {
    fn from(payload: TextPayload) -> Self {
        match payload {
            TextPayload::Plain(text) | TextPayload::Object { text } => text,
        }
    }
}

#[derive(Deserialize)]
struct ReplyPayload {
    reference: String,
    #[serde(default, alias = "text")]
    content: Option<TextPayload>,
}

#[derive(Deserialize)]
struct ReactionPayload {
    reference: String,
    #[serde(default = "default_reaction_action")]
    action: String,
    content: String,
}

fn default_reaction_action() -> String {
    "added".into()
}

/// Decoded message content, one variant per [`MessageKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    Reply {
        reference: String,
        text: Option<String>,
    },
    RemoteAttachment(RemoteAttachment),
    Reaction {
        reference: String,
        action: String,
        emoji: String,
    },
    GroupUpdate(GroupUpdate),
    Other {
        type_id: String,
        payload: Value,
    },
}

impl Content {
    /// Decode an already-decrypted payload according to its content kind.
    pub fn decode(kind: MessageKind, type_id: &str, payload: Value) -> Result<Self> {
        let content = match kind {
            MessageKind::Text => Self::Text {
                text: serde_json::from_value::<TextPayload>(payload)?.into(),
            },
            MessageKind::Reply => {
                let reply: ReplyPayload = serde_json::from_value(payload)?;
                Self::Reply {
                    reference: reply.reference,
                    text: reply.content.map(String::from),
                }
            },
            MessageKind::RemoteAttachment => {
                Self::RemoteAttachment(serde_json::from_value(payload)?)
            },
            MessageKind::Reaction => {
                let reaction: ReactionPayload = serde_json::from_value(payload)?;
                Self::Reaction {
                    reference: reaction.reference,
                    action: reaction.action,
                    emoji: reaction.content,
                }
            },
            MessageKind::GroupUpdate => {
                if payload.is_null() {
                    return Err(Error::normalize("group update without payload"));
                }
                Self::GroupUpdate(serde_json::from_value(payload)?)
            },
            MessageKind::Other => Self::Other {
                type_id: type_id.to_string(),
                payload,
            },
        };
        Ok(content)
    }

    /// Free text carried by the content, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Reply { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

// ── Sender / conversation ───────────────────────────────────────────────────

/// Identity of the message author. v2 senders carry an address, v3 senders an
/// inbox id; either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sender {
    pub address: Option<String>,
    pub inbox_id: Option<String>,
}

/// Where the message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "version", rename_all = "lowercase")]
pub enum ConversationRef {
    V2 {
        topic: String,
        #[serde(default)]
        peer_address: Option<String>,
    },
    V3 {
        id: String,
    },
}

impl ConversationRef {
    pub fn id(&self) -> &str {
        match self {
            Self::V2 { topic, .. } => topic,
            Self::V3 { id } => id,
        }
    }
}

// ── Envelope ────────────────────────────────────────────────────────────────

/// Normalized, version-agnostic representation of an incoming message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub id: String,
    pub kind: MessageKind,
    pub content: Content,
    pub sender: Sender,
    pub version: ProtocolVersion,
    pub conversation: ConversationRef,
}

impl Envelope {
    pub fn text(&self) -> Option<&str> {
        self.content.text()
    }

    /// Number of inboxes added, when this is a membership change.
    pub fn added_members(&self) -> Option<usize> {
        match &self.content {
            Content::GroupUpdate(update) => Some(update.added_inboxes.len()),
            _ => None,
        }
    }

    /// Short human-readable description used in message logs.
    pub fn summary(&self) -> String {
        match self.text() {
            Some(text) => text.to_string(),
            None => self.kind.to_string(),
        }
    }
}
