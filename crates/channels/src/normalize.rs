//! Raw protocol messages to version-agnostic envelopes.

use courier_common::types::{
    Content, ConversationRef, Envelope, MessageKind, ProtocolVersion, Sender,
};

use crate::{
    error::{Error, Result},
    source::{V2Message, V3Message},
    store::Conversation,
};

/// Normalize a legacy message. Its conversation travels with it.
pub fn normalize_v2(message: V2Message) -> Result<Envelope> {
    let address = non_empty(message.sender_address)
        .ok_or_else(|| Error::missing_sender(&message.id))?;
    let kind = MessageKind::from_type_id(&message.content_type);
    let content = Content::decode(kind, &message.content_type, message.content)?;

    Ok(Envelope {
        id: message.id,
        kind,
        content,
        sender: Sender {
            address: Some(address),
            inbox_id: None,
        },
        version: ProtocolVersion::V2,
        conversation: ConversationRef::V2 {
            topic: message.conversation.topic,
            peer_address: message.conversation.peer_address,
        },
    })
}

/// Normalize an inbox message against the conversation it was posted in.
pub fn normalize_v3(message: V3Message, conversation: &Conversation) -> Result<Envelope> {
    let inbox_id = non_empty(message.sender_inbox_id)
        .ok_or_else(|| Error::missing_sender(&message.id))?;
    let kind = MessageKind::from_type_id(&message.content_type);
    let content = Content::decode(kind, &message.content_type, message.content)?;

    Ok(Envelope {
        id: message.id,
        kind,
        content,
        sender: Sender {
            address: None,
            inbox_id: Some(inbox_id),
        },
        version: ProtocolVersion::V3,
        conversation: ConversationRef::V3 {
            id: conversation.id.clone(),
        },
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::source::V2Conversation,
        courier_common::types::{GroupUpdate, InboxRef},
        serde_json::{Value, json},
    };

    fn v2(content_type: &str, content: Value) -> V2Message {
        V2Message {
            id: "v2-1".into(),
            sender_address: Some("0xA11CE".into()),
            content_type: content_type.into(),
            content,
            conversation: V2Conversation {
                topic: "/xmtp/0/dm-1".into(),
                peer_address: Some("0xb0b".into()),
            },
        }
    }

    fn v3(content_type: &str, content: Value) -> V3Message {
        V3Message {
            id: "v3-1".into(),
            sender_inbox_id: Some("alice".into()),
            conversation_id: "group-1".into(),
            content_type: content_type.into(),
            content,
        }
    }

    #[test]
    fn legacy_text() {
        let envelope = normalize_v2(v2("text", json!("gm"))).unwrap();
        assert_eq!(envelope.kind, MessageKind::Text);
        assert_eq!(envelope.text(), Some("gm"));
        assert_eq!(envelope.sender.address.as_deref(), Some("0xA11CE"));
        assert_eq!(envelope.conversation.id(), "/xmtp/0/dm-1");
    }

    #[test]
    fn inbox_group_update() {
        let envelope = normalize_v3(
            v3(
                "group_updated",
                json!({"initiatedByInboxId": "alice", "addedInboxes": [{"inboxId": "bob"}]}),
            ),
            &Conversation::direct("group-1"),
        )
        .unwrap();
        assert_eq!(
            envelope.content,
            Content::GroupUpdate(GroupUpdate {
                initiated_by_inbox_id: Some("alice".into()),
                added_inboxes: vec![InboxRef {
                    inbox_id: "bob".into()
                }],
                removed_inboxes: Vec::new(),
            })
        );
        assert_eq!(envelope.added_members(), Some(1));
        assert_eq!(envelope.version, ProtocolVersion::V3);
    }

    #[test]
    fn unknown_type_is_kept_as_other() {
        let envelope = normalize_v3(
            v3("readReceipt", json!({})),
            &Conversation::direct("group-1"),
        )
        .unwrap();
        assert_eq!(envelope.kind, MessageKind::Other);
    }

    #[test]
    fn missing_sender_is_rejected() {
        let mut message = v3("text", json!("hi"));
        message.sender_inbox_id = Some(" ".into());
        let err = normalize_v3(message, &Conversation::direct("group-1")).unwrap_err();
        assert!(matches!(err, Error::MissingSender { .. }));

        let mut message = v2("text", json!("hi"));
        message.sender_address = None;
        assert!(normalize_v2(message).is_err());
    }

    #[test]
    fn undecodable_payload_is_rejected() {
        let err = normalize_v3(v3("reaction", json!(42)), &Conversation::direct("g")).unwrap_err();
        assert!(matches!(err, Error::Content(_)));
    }
}
