use std::{collections::HashMap, path::Path};

use {
    async_trait::async_trait,
    courier_routing::GroupRoles,
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
};

use crate::error::{Context, Result};

/// A v3 conversation as known to the protocol client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Admin sets, for group conversations. `None` for direct messages or
    /// when the client could not load them.
    #[serde(default)]
    pub roles: Option<GroupRoles>,
}

impl Conversation {
    pub fn direct(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: None,
        }
    }

    pub fn group(id: impl Into<String>, roles: GroupRoles) -> Self {
        Self {
            id: id.into(),
            roles: Some(roles),
        }
    }
}

/// Lookup of v3 conversations by id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;
}

/// In-memory [`ConversationStore`].
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversations(conversations: impl IntoIterator<Item = Conversation>) -> Self {
        Self {
            conversations: RwLock::new(
                conversations
                    .into_iter()
                    .map(|c| (c.id.clone(), c))
                    .collect(),
            ),
        }
    }

    /// Load a JSON array of conversations.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let conversations: Vec<Conversation> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid conversations file {}", path.display()))?;
        Ok(Self::with_conversations(conversations))
    }

    pub async fn upsert(&self, conversation: Conversation) {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation);
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(id).cloned())
    }
}
