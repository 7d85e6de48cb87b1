#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Dispatcher behaviour over in-memory sources.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    courier_channels::{
        ChannelSource, Conversation, Dispatcher, Error, Handler, HandlerRegistry,
        InMemoryConversationStore, MessageSource, RawMessage, Result, StreamStats,
        V2Conversation, V2Message, V3Message,
    },
    courier_common::types::ProtocolVersion,
    courier_config::{BotIdentity, RunnerConfig},
    courier_routing::{GroupRoles, SessionContext},
    courier_skills::{Command, ParamSpec, SkillGroup, SkillTable},
    futures::stream::BoxStream,
    serde_json::{Value, json},
};

type Log = Arc<Mutex<Vec<(String, String)>>>;

/// Records `(handler name, message summary)` for every call.
struct Recorder {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl Handler for Recorder {
    async fn handle(&self, ctx: &SessionContext) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((self.name.to_string(), ctx.envelope().summary()));
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl Handler for Failing {
    async fn handle(&self, ctx: &SessionContext) -> anyhow::Result<()> {
        if ctx.param("domain").and_then(|v| v.as_str()) == Some("panic.eth") {
            panic!("handler blew up");
        }
        anyhow::bail!("registrar unavailable")
    }
}

struct Unsubscribable;

#[async_trait]
impl MessageSource for Unsubscribable {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, RawMessage>> {
        Err(Error::unavailable("client not initialized"))
    }
}

const BOT_INBOX: &str = "bot-inbox";

fn table() -> Arc<SkillTable> {
    Arc::new(
        SkillTable::new(vec![
            SkillGroup::new("ens")
                .tag("@ensbot", Some("agent"))
                .command(
                    Command::new("register")
                        .trigger("/register")
                        .param(ParamSpec::string("domain"))
                        .handler("ens"),
                )
                .command(
                    Command::new("reset")
                        .trigger("/reset")
                        .admin_only()
                        .handler("ens"),
                )
                .command(
                    Command::new("renew")
                        .trigger("/renew")
                        .param(ParamSpec::string("domain"))
                        .handler("renewals"),
                ),
        ])
        .unwrap(),
    )
}

fn v2(id: &str, content_type: &str, content: Value) -> RawMessage {
    RawMessage::V2(V2Message {
        id: id.into(),
        sender_address: Some("0xa11ce".into()),
        content_type: content_type.into(),
        content,
        conversation: V2Conversation {
            topic: "/xmtp/0/dm-alice".into(),
            peer_address: Some("0xa11ce".into()),
        },
    })
}

fn v3(id: &str, from: &str, conversation: &str, content_type: &str, content: Value) -> RawMessage {
    RawMessage::V3(V3Message {
        id: id.into(),
        sender_inbox_id: Some(from.into()),
        conversation_id: conversation.into(),
        content_type: content_type.into(),
        content,
    })
}

fn store() -> Arc<InMemoryConversationStore> {
    let roles = GroupRoles {
        admins: ["alice".to_string()].into_iter().collect(),
        super_admins: Default::default(),
    };
    Arc::new(InMemoryConversationStore::with_conversations([
        Conversation::group("group", roles),
        Conversation::direct("dm"),
    ]))
}

fn dispatcher(config: RunnerConfig, handlers: HandlerRegistry) -> Dispatcher {
    Dispatcher::new(table(), config)
        .with_identity(BotIdentity::new(None, Some(BOT_INBOX)))
        .with_handlers(handlers)
        .with_store(store())
}

fn recorder(name: &'static str, log: &Log) -> Arc<dyn Handler> {
    Arc::new(Recorder {
        name,
        log: Arc::clone(log),
    })
}

fn source(version: ProtocolVersion, messages: Vec<RawMessage>) -> Arc<dyn MessageSource> {
    Arc::new(ChannelSource::from_messages(version, messages))
}

fn entries(log: &Log) -> Vec<(String, String)> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn routes_both_streams_to_the_right_handlers() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with("ens", recorder("ens", &log))
        .with("agent", recorder("agent", &log));
    let dispatcher = dispatcher(RunnerConfig::default(), handlers);

    let v2_messages = vec![
        v2("a", "text", json!("/register legacy.eth")),
        v2("b", "reaction", json!({"reference": "a", "content": "👍"})),
    ];
    let v3_messages = vec![
        v3("1", "bob", "dm", "text", json!("/register vitalik.eth")),
        v3("2", "bob", "dm", "text", json!("gm everyone")),
        v3("3", "bob", "dm", "text", json!("hey @ensbot")),
        v3("4", BOT_INBOX, "dm", "text", json!("/register echo.eth")),
        v3("5", "bob", "missing", "text", json!("/register lost.eth")),
    ];

    let summary = dispatcher
        .run(
            recorder("generic", &log),
            source(ProtocolVersion::V2, v2_messages),
            source(ProtocolVersion::V3, v3_messages),
        )
        .await;

    let seen = entries(&log);
    assert!(seen.contains(&("generic".into(), "/register legacy.eth".into())));
    assert!(seen.contains(&("ens".into(), "/register vitalik.eth".into())));
    assert!(seen.contains(&("agent".into(), "hey @ensbot".into())));
    assert_eq!(seen.len(), 3);

    assert_eq!(summary.v2, StreamStats {
        received: 2,
        dropped: 0,
        rejected: 1,
        handled: 1,
        failed: 0,
    });
    assert_eq!(summary.v3, StreamStats {
        received: 5,
        dropped: 1,
        rejected: 2,
        handled: 2,
        failed: 0,
    });
}

#[tokio::test]
async fn per_stream_order_is_preserved() {
    let log = Log::default();
    let dispatcher = dispatcher(
        RunnerConfig {
            experimental: true,
            ..Default::default()
        },
        HandlerRegistry::new(),
    );
    let messages = (0..20)
        .map(|i| v3(&i.to_string(), "bob", "dm", "text", json!(format!("m{i}"))))
        .collect();

    dispatcher
        .run(
            recorder("generic", &log),
            source(ProtocolVersion::V2, Vec::new()),
            source(ProtocolVersion::V3, messages),
        )
        .await;

    let bodies: Vec<String> = entries(&log).into_iter().map(|(_, body)| body).collect();
    let expected: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
    assert_eq!(bodies, expected);
}

#[tokio::test]
async fn handler_failures_do_not_stop_the_stream() {
    let log = Log::default();
    let handlers = HandlerRegistry::new().with("ens", Arc::new(Failing));
    let dispatcher = dispatcher(RunnerConfig::default(), handlers);

    let summary = dispatcher
        .run(
            recorder("generic", &log),
            source(ProtocolVersion::V2, Vec::new()),
            source(ProtocolVersion::V3, vec![
                v3("1", "bob", "dm", "text", json!("/register broken.eth")),
                v3("2", "bob", "dm", "text", json!("/register panic.eth")),
                v3("3", "bob", "dm", "text", json!("/renew still.eth")),
            ]),
        )
        .await;

    assert_eq!(summary.v3.failed, 2);
    assert_eq!(summary.v3.handled, 1);
    // `renewals` is never bound, so the generic handler takes it.
    assert_eq!(entries(&log), [("generic".to_string(), "/renew still.eth".to_string())]);
}

#[tokio::test]
async fn admin_only_commands_need_group_roles() {
    let log = Log::default();
    let handlers = HandlerRegistry::new().with("ens", recorder("ens", &log));
    let dispatcher = dispatcher(
        RunnerConfig {
            experimental: true,
            ..Default::default()
        },
        handlers,
    );

    let summary = dispatcher
        .run(
            recorder("generic", &log),
            source(ProtocolVersion::V2, Vec::new()),
            source(ProtocolVersion::V3, vec![
                v3("1", "mallory", "group", "text", json!("/reset")),
                v3("2", "alice", "dm", "text", json!("/reset")),
                v3("3", "alice", "group", "text", json!("/reset")),
            ]),
        )
        .await;

    assert_eq!(summary.v3.rejected, 2);
    // Experimental mode routes the admin's command to the generic handler.
    assert_eq!(entries(&log), [("generic".to_string(), "/reset".to_string())]);
}

#[tokio::test]
async fn stalled_stream_does_not_block_the_other() {
    let log = Log::default();
    let dispatcher = dispatcher(RunnerConfig::default(), HandlerRegistry::new());

    let (v2_source, v2_tx) = ChannelSource::new(ProtocolVersion::V2, 8);
    let v3_source = source(ProtocolVersion::V3, vec![
        v3("1", "bob", "dm", "text", json!("hello @ensbot")),
        v3("2", "bob", "dm", "text", json!("/register fast.eth")),
    ]);

    let run = tokio::spawn({
        let generic = recorder("generic", &log);
        async move {
            dispatcher
                .run(generic, Arc::new(v2_source), v3_source)
                .await
        }
    });

    // The v2 stream stays open and silent while v3 is fully processed.
    tokio::time::timeout(Duration::from_secs(5), async {
        while entries(&log).len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("v3 messages were not dispatched while v2 was idle");

    v2_tx
        .send(v2("late", "text", json!("still here")))
        .await
        .unwrap();
    drop(v2_tx);

    let summary = run.await.unwrap();
    assert_eq!(summary.v2.handled, 1);
    assert_eq!(summary.v3.handled, 2);
}

#[tokio::test]
async fn subscription_error_only_ends_that_stream() {
    let log = Log::default();
    let dispatcher = dispatcher(RunnerConfig::default(), HandlerRegistry::new());

    let summary = dispatcher
        .run(
            recorder("generic", &log),
            Arc::new(Unsubscribable),
            source(ProtocolVersion::V3, vec![v3(
                "1",
                "bob",
                "dm",
                "text",
                json!("/register ok.eth"),
            )]),
        )
        .await;

    assert_eq!(summary.v2, StreamStats::default());
    assert_eq!(summary.v3.handled, 1);
}

#[tokio::test]
async fn membership_changes_respect_the_filter() {
    let log = Log::default();
    let dispatcher = dispatcher(
        RunnerConfig {
            member_change: true,
            ..Default::default()
        },
        HandlerRegistry::new(),
    );

    let summary = dispatcher
        .run(
            recorder("generic", &log),
            source(ProtocolVersion::V2, Vec::new()),
            source(ProtocolVersion::V3, vec![
                v3(
                    "1",
                    BOT_INBOX,
                    "group",
                    "group_updated",
                    json!({"initiatedByInboxId": BOT_INBOX, "addedInboxes": []}),
                ),
                v3("2", "alice", "group", "group_updated", Value::Null),
            ]),
        )
        .await;

    // The bot's own update is not self-suppressed but has nobody added; the
    // null payload cannot be normalized.
    assert_eq!(summary.v3.rejected, 1);
    assert_eq!(summary.v3.dropped, 1);
    assert!(entries(&log).is_empty());
}
