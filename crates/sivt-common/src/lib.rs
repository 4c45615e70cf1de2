//! Shared types for sivt: the deployment state model and its git-backed
//! store, the input documents (spec, desired state, support matrix), the
//! error taxonomy, and retry/poll/version helpers used by the workflows.

pub mod desired;
pub mod error;
pub mod git;
pub mod layout;
pub mod matrix;
pub mod poll;
pub mod retry;
pub mod spec;
pub mod state;
pub mod version;

pub use desired::DesiredState;
pub use error::{Error, ErrorKind, Result};
pub use layout::RootLayout;
pub use matrix::SupportMatrix;
pub use poll::{poll_attempts, wait_with_timeout, PollBudget, PollResult};
pub use retry::{retry_with_backoff, RetryConfig};
pub use spec::DeploymentSpec;
pub use state::{ClusterRef, DeploymentState, EntityStatus, Extension, Health, StateStore};
