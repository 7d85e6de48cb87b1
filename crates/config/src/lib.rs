//! Configuration loading, validation and env substitution.
//!
//! Config files: `courier.toml`, `courier.yaml`, or `courier.json`
//! Searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string
//! values, plus `COURIER_*` overrides for the runner flags and bot identity.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, find_config_file, load_config, load_config_value,
    },
    schema::{BotIdentity, CourierConfig, LoggingConfig, RunnerConfig, SkillsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
