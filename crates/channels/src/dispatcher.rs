//! The dual-stream dispatcher.
//!
//! One tokio task per protocol version. Each task handles its stream strictly
//! in arrival order and awaits the handler before pulling the next message,
//! so a slow handler only backs up its own stream.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use {
    courier_common::types::{Envelope, ProtocolVersion},
    courier_config::{BotIdentity, RunnerConfig},
    courier_routing::{GroupRoles, Route, Rule, SessionContext, Verdict, evaluate},
    courier_skills::SkillTable,
    futures::{FutureExt, StreamExt},
    serde::Serialize,
    tracing::{debug, error, info, warn},
};

use crate::{
    error::{Error, Result},
    handler::{Handler, HandlerRegistry},
    normalize::{normalize_v2, normalize_v3},
    source::{MessageSource, RawMessage},
    store::{ConversationStore, InMemoryConversationStore},
};

/// What happened to a single raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Could not be normalized.
    Dropped,
    /// Normalized, but the rules rejected it.
    Rejected(Rule),
    /// Accepted and the handler returned `Ok`.
    Handled(Route),
    /// Accepted, but the handler returned an error or panicked.
    Failed(Route),
}

/// Per-stream counters returned by [`Dispatcher::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub received: usize,
    pub dropped: usize,
    pub rejected: usize,
    pub handled: usize,
    pub failed: usize,
}

impl StreamStats {
    fn record(&mut self, disposition: Disposition) {
        self.received += 1;
        match disposition {
            Disposition::Dropped => self.dropped += 1,
            Disposition::Rejected(_) => self.rejected += 1,
            Disposition::Handled(_) => self.handled += 1,
            Disposition::Failed(_) => self.failed += 1,
        }
    }
}

/// Counters for both streams once they have ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub v2: StreamStats,
    pub v3: StreamStats,
}

/// Routes messages from both protocol streams to handlers.
///
/// Everything it holds is immutable and shared between the two stream tasks.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<SkillTable>,
    config: RunnerConfig,
    identity: Arc<BotIdentity>,
    handlers: Arc<HandlerRegistry>,
    store: Arc<dyn ConversationStore>,
    msg_log: bool,
}

impl Dispatcher {
    pub fn new(table: Arc<SkillTable>, config: RunnerConfig) -> Self {
        Self {
            table,
            config,
            identity: Arc::new(BotIdentity::default()),
            handlers: Arc::new(HandlerRegistry::new()),
            store: Arc::new(InMemoryConversationStore::new()),
            msg_log: false,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: BotIdentity) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        for name in handlers.unbound(&self.table) {
            warn!(handler = name, "handler name has no binding, generic handler will be used");
        }
        self.handlers = Arc::new(handlers);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    /// Log every decision at `info` instead of `debug`, and every accepted
    /// message body.
    #[must_use]
    pub fn with_msg_log(mut self, enabled: bool) -> Self {
        self.msg_log = enabled;
        self
    }

    pub fn table(&self) -> &SkillTable {
        &self.table
    }

    /// Consume both streams until they end.
    ///
    /// `fallback` is the generic handler: it receives every accepted message
    /// whose route names no handler, or names one that is not bound.
    pub async fn run(
        &self,
        fallback: Arc<dyn Handler>,
        v2: Arc<dyn MessageSource>,
        v3: Arc<dyn MessageSource>,
    ) -> RunSummary {
        let v2_task = tokio::spawn(self.clone().run_stream(
            ProtocolVersion::V2,
            v2,
            Arc::clone(&fallback),
        ));
        let v3_task = tokio::spawn(self.clone().run_stream(ProtocolVersion::V3, v3, fallback));

        let (v2, v3) = tokio::join!(v2_task, v3_task);
        let summary = RunSummary {
            v2: v2.unwrap_or_else(|e| {
                error!(version = "v2", error = %e, "stream task failed");
                StreamStats::default()
            }),
            v3: v3.unwrap_or_else(|e| {
                error!(version = "v3", error = %e, "stream task failed");
                StreamStats::default()
            }),
        };
        info!(?summary, "both message streams ended");
        summary
    }

    async fn run_stream(
        self,
        version: ProtocolVersion,
        source: Arc<dyn MessageSource>,
        fallback: Arc<dyn Handler>,
    ) -> StreamStats {
        let mut stats = StreamStats::default();
        let mut stream = match source.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                error!(%version, error = %e, "failed to subscribe, stream disabled");
                return stats;
            },
        };
        info!(%version, "listening for messages");

        while let Some(raw) = stream.next().await {
            let disposition = if raw.version() == version {
                self.dispatch(raw, &fallback).await
            } else {
                warn!(
                    %version,
                    message_id = raw.id(),
                    "message arrived on the wrong stream, dropping"
                );
                Disposition::Dropped
            };
            stats.record(disposition);
        }

        info!(%version, ?stats, "message stream ended");
        stats
    }

    /// Run one raw message through normalization, the rules and its handler.
    pub async fn dispatch(&self, raw: RawMessage, fallback: &Arc<dyn Handler>) -> Disposition {
        let version = raw.version();
        let message_id = raw.id().to_string();

        let (envelope, roles) = match self.prepare(raw).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(
                    %version,
                    message_id = %message_id,
                    error = %e,
                    "dropping message that cannot be normalized"
                );
                return Disposition::Dropped;
            },
        };

        let ctx = SessionContext::new(
            envelope,
            roles,
            Arc::clone(&self.table),
            self.config,
            Arc::clone(&self.identity),
        );
        let verdict = evaluate(&ctx);
        self.log_verdict(&ctx, &verdict);

        let Some(route) = verdict.route else {
            return Disposition::Rejected(verdict.rule);
        };

        if self.msg_log {
            info!("msg_{}: {}", version, ctx.envelope().summary());
        }

        let handler = self.resolve_handler(&ctx, route, fallback);
        match AssertUnwindSafe(handler.handle(&ctx)).catch_unwind().await {
            Ok(Ok(())) => Disposition::Handled(route),
            Ok(Err(e)) => {
                warn!(%version, message_id = %message_id, error = %e, "handler failed");
                Disposition::Failed(route)
            },
            Err(panic) => {
                error!(
                    %version,
                    message_id = %message_id,
                    panic = %panic_message(panic.as_ref()),
                    "handler panicked"
                );
                Disposition::Failed(route)
            },
        }
    }

    async fn prepare(&self, raw: RawMessage) -> Result<(Envelope, Option<GroupRoles>)> {
        match raw {
            RawMessage::V2(message) => Ok((normalize_v2(message)?, None)),
            RawMessage::V3(message) => {
                let conversation = self
                    .store
                    .get_conversation(&message.conversation_id)
                    .await?
                    .ok_or_else(|| Error::unknown_conversation(&message.conversation_id))?;
                let roles = conversation.roles.clone();
                Ok((normalize_v3(message, &conversation)?, roles))
            },
        }
    }

    fn resolve_handler(
        &self,
        ctx: &SessionContext,
        route: Route,
        fallback: &Arc<dyn Handler>,
    ) -> Arc<dyn Handler> {
        let Some(name) = ctx.handler_name(route) else {
            return Arc::clone(fallback);
        };
        self.handlers.get(name).unwrap_or_else(|| {
            warn!(handler = name, "no handler bound under this name, using generic handler");
            Arc::clone(fallback)
        })
    }

    fn log_verdict(&self, ctx: &SessionContext, verdict: &Verdict) {
        let envelope = ctx.envelope();
        let command = ctx.command().map(|c| c.name.as_str());
        if self.msg_log {
            info!(
                version = %envelope.version,
                message_id = %envelope.id,
                kind = %envelope.kind,
                valid = verdict.valid,
                rule = ?verdict.rule,
                route = ?verdict.route,
                command,
                "{}",
                verdict.rule
            );
        } else {
            debug!(
                version = %envelope.version,
                message_id = %envelope.id,
                kind = %envelope.kind,
                valid = verdict.valid,
                rule = ?verdict.rule,
                route = ?verdict.route,
                command,
                "{}",
                verdict.rule
            );
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("handlers", &self.handlers)
            .field("msg_log", &self.msg_log)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
