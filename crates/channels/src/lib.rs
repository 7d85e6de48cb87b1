//! Inbound message plumbing: raw protocol messages, the collaborator traits
//! (message sources, conversation store, handlers) and the dual-stream
//! dispatcher that ties them to the routing rules.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod normalize;
pub mod source;
pub mod store;

pub use {
    dispatcher::{Disposition, Dispatcher, RunSummary, StreamStats},
    error::{Error, Result},
    handler::{Handler, HandlerRegistry},
    normalize::{normalize_v2, normalize_v3},
    source::{
        ChannelSource, MessageSource, RawMessage, V2Conversation, V2Message, V3Message, read_jsonl,
    },
    store::{Conversation, ConversationStore, InMemoryConversationStore},
};
