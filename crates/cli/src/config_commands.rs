use std::path::{Path, PathBuf};

use {anyhow::Result, clap::Subcommand};

use courier_config::{CourierConfig, Severity};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration (file, then environment overrides).
    Show,
}

pub fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config_path, verbose),
        ConfigAction::Show => show(config_path),
    }
}

/// Load the config from `--config`, or from the first file found in the
/// standard locations, or fall back to defaults. Returns the path actually
/// read.
pub fn load(explicit: Option<&Path>) -> Result<(CourierConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => courier_config::find_config_file(),
    };
    match path {
        Some(path) => {
            let config = courier_config::load_config(&path)?;
            Ok((config, Some(path)))
        },
        None => {
            let mut config = CourierConfig::default();
            courier_config::apply_env_overrides(&mut config);
            Ok((config, None))
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let (config, path) = load(config_path)?;
    let raw = path
        .as_deref()
        .map(courier_config::load_config_value)
        .transpose()?;
    let result = courier_config::validate(&config, raw.as_ref(), path.as_deref());

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message);
        } else {
            eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let (config, path) = load(config_path)?;
    if let Some(path) = path {
        eprintln!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
