use courier_common::FromMessage;

/// Crate-wide result type for stream, store and dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors shared across the channel traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The raw message carries no usable sender identity.
    #[error("message {message_id} has no sender identity")]
    MissingSender { message_id: String },

    /// A v3 message referenced a conversation the store does not know.
    #[error("unknown conversation: {conversation_id}")]
    UnknownConversation { conversation_id: String },

    /// The content payload could not be decoded for its type id.
    #[error(transparent)]
    Content(#[from] courier_common::Error),

    /// A source could not be subscribed to (already consumed, closed).
    #[error("message source unavailable: {message}")]
    Unavailable { message: String },

    /// A recorded stream or conversations file could not be read.
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn missing_sender(message_id: impl Into<String>) -> Self {
        Self::MissingSender {
            message_id: message_id.into(),
        }
    }

    #[must_use]
    pub fn unknown_conversation(conversation_id: impl Into<String>) -> Self {
        Self::UnknownConversation {
            conversation_id: conversation_id.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

courier_common::impl_context!();
