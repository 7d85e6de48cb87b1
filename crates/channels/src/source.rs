//! Raw protocol messages and the streams that deliver them.

use std::path::Path;

use {
    async_trait::async_trait,
    courier_common::types::ProtocolVersion,
    futures::stream::{BoxStream, StreamExt},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tokio::sync::{Mutex, mpsc},
    tokio_stream::wrappers::ReceiverStream,
};

use crate::error::{Context, Error, Result};

// ── Raw messages ────────────────────────────────────────────────────────────

/// A decrypted message as delivered by one protocol client, before
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version", rename_all = "lowercase")]
pub enum RawMessage {
    V2(V2Message),
    V3(V3Message),
}

impl RawMessage {
    pub fn version(&self) -> ProtocolVersion {
        match self {
            Self::V2(_) => ProtocolVersion::V2,
            Self::V3(_) => ProtocolVersion::V3,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::V2(msg) => &msg.id,
            Self::V3(msg) => &msg.id,
        }
    }
}

/// Legacy message: the conversation travels inside the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Message {
    pub id: String,
    #[serde(default)]
    pub sender_address: Option<String>,
    /// Wire content type id, e.g. `text` or `remoteStaticAttachment`.
    pub content_type: String,
    #[serde(default)]
    pub content: Value,
    pub conversation: V2Conversation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Conversation {
    pub topic: String,
    #[serde(default)]
    pub peer_address: Option<String>,
}

/// Inbox message: the conversation is referenced by id and looked up in a
/// [`crate::ConversationStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Message {
    pub id: String,
    #[serde(default)]
    pub sender_inbox_id: Option<String>,
    pub conversation_id: String,
    pub content_type: String,
    #[serde(default)]
    pub content: Value,
}

// ── Sources ─────────────────────────────────────────────────────────────────

/// One inbound stream of raw messages for a single protocol version.
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn version(&self) -> ProtocolVersion;

    /// Open the stream. The stream ending means the source is exhausted.
    async fn subscribe(&self) -> Result<BoxStream<'static, RawMessage>>;
}

/// A [`MessageSource`] fed through a tokio mpsc channel.
///
/// The stream can be subscribed to once; it ends when every sender is
/// dropped.
pub struct ChannelSource {
    version: ProtocolVersion,
    rx: Mutex<Option<mpsc::Receiver<RawMessage>>>,
}

impl ChannelSource {
    pub fn new(version: ProtocolVersion, capacity: usize) -> (Self, mpsc::Sender<RawMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let source = Self {
            version,
            rx: Mutex::new(Some(rx)),
        };
        (source, tx)
    }

    /// A source that yields `messages` in order, then ends.
    pub fn from_messages(version: ProtocolVersion, messages: Vec<RawMessage>) -> Self {
        let (source, tx) = Self::new(version, messages.len());
        for message in messages {
            // Capacity equals the message count, so this never fills up.
            if tx.try_send(message).is_err() {
                break;
            }
        }
        source
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, RawMessage>> {
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::unavailable(format!("{} stream already subscribed", self.version)))?;
        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Read a recorded stream: one JSON [`RawMessage`] per line, blank lines and
/// `#` comments skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<RawMessage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_jsonl(&raw).with_context(|| format!("invalid message log {}", path.display()))
}

fn parse_jsonl(raw: &str) -> Result<Vec<RawMessage>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str::<RawMessage>(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}
