//! Skill tables: commands grouped into skills, trigger resolution and
//! typed parameter extraction.
//!
//! A [`SkillTable`] is built once at startup (in code or from a TOML/YAML/JSON
//! file) and shared read-only. [`resolve_command`] and [`resolve_group`] are
//! pure lookups over it.

pub mod error;
pub mod help;
pub mod load;
pub mod parse;
pub mod resolve;
pub mod types;

pub use {
    error::{Error, Result},
    help::render_help,
    load::{load_table, parse_table},
    resolve::{CommandMatch, resolve_command, resolve_group},
    types::{
        Command, CommandId, GroupId, ParamSpec, ParamType, ParamValue, Params, SkillGroup,
        SkillTable,
    },
};
