use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("unsupported skills file format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("invalid command name '{name}': must be 1-64 lowercase alphanumeric/hyphen chars")]
    InvalidName { name: String },

    #[error("command '{command}' declares no triggers")]
    NoTriggers { command: String },

    #[error("command '{command}' has invalid trigger '{trigger}'")]
    InvalidTrigger { command: String, trigger: String },

    #[error("skill group '{group}' has an empty tag")]
    EmptyTag { group: String },

    #[error("command '{command}' has an invalid parameter '{param}': {reason}")]
    InvalidParam {
        command: String,
        param: String,
        reason: String,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_trigger(command: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self::InvalidTrigger {
            command: command.into(),
            trigger: trigger.into(),
        }
    }

    #[must_use]
    pub fn invalid_param(
        command: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            command: command.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
