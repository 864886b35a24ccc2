use finvestor_core::{
    ActivityError, ConfigError, CoreError, DurationParseError, SourceError, ValidationError,
};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] DurationParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Parse(_) | Self::Config(_) => 2,
            Self::Source(_) => 3,
            Self::Serialization(_) => 4,
            Self::Activity(ActivityError::Io(_)) | Self::Io(_) => 10,
            Self::Activity(_) => 2,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(error) => Self::Validation(error),
            CoreError::Parse(error) => Self::Parse(error),
            CoreError::Source(error) => Self::Source(error),
            CoreError::Activity(error) => Self::Activity(error),
            CoreError::Csv(error) => Self::Activity(ActivityError::Csv(error)),
            CoreError::Serialization(error) => Self::Serialization(error),
        }
    }
}
