mod config_commands;
mod replay_commands;
mod table;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier: message routing for dual-protocol chat bots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./courier.toml and
    /// ~/.config/courier/courier.toml).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed recorded message streams through the dispatcher.
    Replay(replay_commands::ReplayArgs),
    /// List the configured skill groups and commands.
    Skills,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    match cli.command {
        Commands::Replay(args) => {
            let (config, path) = config_commands::load(cli.config.as_deref())?;
            replay_commands::handle_replay(args, config, path.as_deref()).await
        },
        Commands::Skills => {
            let (config, path) = config_commands::load(cli.config.as_deref())?;
            let table = table::load(&config, path.as_deref())?;
            println!("{}", courier_skills::render_help(&table));
            Ok(())
        },
        Commands::Config { action } => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
    }
}
