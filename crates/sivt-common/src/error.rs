//! Error types shared by every sivt crate
//!
//! Errors fall into four categories that drive reporting and retry decisions:
//! configuration mistakes, transient actuation failures, precondition
//! violations and a corrupt state document. Plumbing errors (git, io, yaml)
//! are carried alongside and classified by [`Error::kind`].

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across sivt crates
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by task reports and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    TransientActuation,
    Precondition,
    StateCorruption,
    Timeout,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::TransientActuation => "actuation",
            ErrorKind::Precondition => "precondition",
            ErrorKind::StateCorruption => "state-corruption",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Main error type for sivt operations
#[derive(Debug, Error)]
pub enum Error {
    /// Human input mistake: unsupported version, illegal downgrade, bad spec
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what's wrong with the input
        message: String,
    },

    /// An external CLI or API call failed
    #[error("actuation failed for {entity}: {message}")]
    TransientActuation {
        /// Entity being actuated (cluster, extension, ...)
        entity: String,
        /// Description of what failed
        message: String,
    },

    /// The entity is not in a state that allows the requested operation
    #[error("precondition failed for {entity}: {message}")]
    Precondition {
        /// Entity the precondition applies to
        entity: String,
        /// Description of the violated precondition
        message: String,
    },

    /// The state document is unreadable or invalid
    #[error("state file {} is corrupt: {message}", path.display())]
    StateCorruption {
        /// Path of the state document
        path: PathBuf,
        /// Parser or validation message
        message: String,
    },

    /// A bounded poll ran out of budget
    #[error("timeout waiting for {description}")]
    Timeout {
        /// What was being waited on
        description: String,
    },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an actuation error for an entity
    pub fn actuation(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientActuation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a precondition error for an entity
    pub fn precondition(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Precondition {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a state corruption error for the document at `path`
    pub fn state_corruption(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StateCorruption {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(description: impl Into<String>) -> Self {
        Self::Timeout {
            description: description.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::TransientActuation { .. } => ErrorKind::TransientActuation,
            Error::Precondition { .. } => ErrorKind::Precondition,
            Error::StateCorruption { .. } => ErrorKind::StateCorruption,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Git(_) | Error::Io(_) | Error::Yaml(_) | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is worth another attempt
    ///
    /// Configuration, precondition and state errors need a human to fix the input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientActuation { .. } | Error::Timeout { .. }
        )
    }

    /// Attach entity context to an error raised below the workflow layer.
    ///
    /// Errors that already name an entity keep theirs. Plumbing errors become
    /// actuation errors for `entity` so the report says what was being touched.
    pub fn in_entity(self, entity: &str) -> Self {
        match self {
            Error::Git(e) => Error::actuation(entity, format!("git: {e}")),
            Error::Io(e) => Error::actuation(entity, format!("io: {e}")),
            Error::Timeout { description } if !description.contains(entity) => {
                Error::timeout(format!("{description} ({entity})"))
            }
            other => other,
        }
    }

    /// Get the entity name if this error is tied to one
    pub fn entity(&self) -> Option<&str> {
        match self {
            Error::TransientActuation { entity, .. } | Error::Precondition { entity, .. } => {
                Some(entity)
            }
            _ => None,
        }
    }
}
