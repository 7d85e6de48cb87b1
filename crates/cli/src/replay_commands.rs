use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    clap::Args,
    courier_channels::{
        ChannelSource, Dispatcher, Handler, HandlerRegistry, InMemoryConversationStore,
        MessageSource, read_jsonl,
    },
    courier_common::types::ProtocolVersion,
    courier_config::CourierConfig,
    courier_routing::SessionContext,
    courier_skills::render_help,
    tracing::info,
};

use crate::table;

#[derive(Args)]
pub struct ReplayArgs {
    /// Recorded v2 stream, one JSON message per line.
    #[arg(long, required_unless_present = "v3")]
    v2: Option<PathBuf>,
    /// Recorded v3 stream, one JSON message per line.
    #[arg(long)]
    v3: Option<PathBuf>,
    /// JSON array of v3 conversations with their admin sets.
    #[arg(long)]
    conversations: Option<PathBuf>,
    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

/// Prints every message it receives along with the resolved command.
struct LogHandler {
    name: String,
}

#[async_trait]
impl Handler for LogHandler {
    async fn handle(&self, ctx: &SessionContext) -> Result<()> {
        let envelope = ctx.envelope();
        let params = match ctx.params() {
            Some(params) if !params.is_empty() => serde_json::to_string(params)?,
            _ => String::new(),
        };
        info!(
            handler = %self.name,
            message_id = %envelope.id,
            command = ctx.command().map(|c| c.name.as_str()),
            "handled"
        );
        println!(
            "[{}] {} {}: {} {}",
            self.name,
            envelope.version,
            envelope.id,
            envelope.summary(),
            params
        );
        Ok(())
    }
}

/// Answers `/help` with the rendered skill table.
struct HelpHandler;

#[async_trait]
impl Handler for HelpHandler {
    async fn handle(&self, ctx: &SessionContext) -> Result<()> {
        println!("[help] {}:\n{}", ctx.envelope().id, render_help(ctx.table()));
        Ok(())
    }
}

pub async fn handle_replay(
    args: ReplayArgs,
    config: CourierConfig,
    config_path: Option<&Path>,
) -> Result<()> {
    let table = Arc::new(table::load(&config, config_path)?);

    let mut handlers = HandlerRegistry::new();
    for name in table.handler_names() {
        let handler: Arc<dyn Handler> = match name {
            "help" => Arc::new(HelpHandler),
            _ => Arc::new(LogHandler {
                name: name.to_string(),
            }),
        };
        handlers.register(name, handler);
    }

    let store = match &args.conversations {
        Some(path) => InMemoryConversationStore::from_json_file(path)?,
        None => InMemoryConversationStore::new(),
    };

    let dispatcher = Dispatcher::new(Arc::clone(&table), config.runner)
        .with_identity(config.identity.clone())
        .with_handlers(handlers)
        .with_store(Arc::new(store))
        .with_msg_log(config.logging.msg_log);

    let v2 = recorded(ProtocolVersion::V2, args.v2.as_deref())?;
    let v3 = recorded(ProtocolVersion::V3, args.v3.as_deref())?;
    let generic = Arc::new(LogHandler {
        name: "generic".into(),
    });

    let summary = dispatcher.run(generic, v2, v3).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for (version, stats) in [("v2", summary.v2), ("v3", summary.v3)] {
            println!(
                "{version}: {} received, {} handled, {} rejected, {} dropped, {} failed",
                stats.received, stats.handled, stats.rejected, stats.dropped, stats.failed
            );
        }
    }
    Ok(())
}

fn recorded(version: ProtocolVersion, path: Option<&Path>) -> Result<Arc<dyn MessageSource>> {
    let messages = match path {
        Some(path) => read_jsonl(path)?,
        None => Vec::new(),
    };
    Ok(Arc::new(ChannelSource::from_messages(version, messages)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn demo(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../demos")
            .join(name)
    }

    #[tokio::test]
    async fn demo_streams_replay_with_the_builtin_table() {
        let args = ReplayArgs {
            v2: Some(demo("v2.jsonl")),
            v3: Some(demo("v3.jsonl")),
            conversations: Some(demo("conversations.json")),
            json: true,
        };
        handle_replay(args, CourierConfig::default(), None)
            .await
            .unwrap();
    }

    #[test]
    fn missing_stream_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.jsonl");
        assert!(recorded(ProtocolVersion::V3, Some(&missing)).is_err());
        assert!(recorded(ProtocolVersion::V2, None).is_ok());
    }
}
