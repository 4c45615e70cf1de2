//! Error types for the CLI

use std::fmt::Display;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] sivt_common::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command failed: {message}")]
    CommandFailed { message: String },

    #[error("{failed} of {total} tasks failed")]
    TasksFailed { failed: usize, total: usize },
}

impl Error {
    pub fn command_failed(message: impl Into<String>) -> Self {
        Error::CommandFailed {
            message: message.into(),
        }
    }
}

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Adapter-side counterpart of [`CommandErrorExt`]: actuator contracts
/// return `sivt_common::Error`, tagged with the entity being touched.
pub trait ActuationErrorExt<T> {
    fn actuation_err(self, entity: &str) -> sivt_common::Result<T>;
}

impl<T, E: Display> ActuationErrorExt<T> for std::result::Result<T, E> {
    fn actuation_err(self, entity: &str) -> sivt_common::Result<T> {
        self.map_err(|e| sivt_common::Error::actuation(entity, e.to_string()))
    }
}
