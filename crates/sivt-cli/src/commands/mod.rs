//! CLI commands

use std::path::Path;

use tracing::info;

use sivt_common::RootLayout;
use sivt_workflow::{failures, Actuators, RunContext, TaskReport};

use crate::adapters;
use crate::{Error, Result};

pub mod avi;
pub mod dev;
pub mod health;
pub mod mgmt;
pub mod shared_services;
pub mod validate;
pub mod workload_clusters;

/// Loaded run context plus production actuators for one invocation
pub struct Session {
    pub ctx: RunContext,
    pub act: Actuators,
}

impl Session {
    /// Load every input document under `root_dir`, creating the fresh state
    /// document when none exists yet
    pub fn open(root_dir: &Path) -> Result<Self> {
        let layout = RootLayout::new(root_dir);
        let ctx = RunContext::load(&layout)?;
        if ctx.store.init_fresh()? {
            info!(path = %ctx.store.path().display(), "Initialised state");
        }
        let act = adapters::actuators(&layout, &ctx.spec)?;
        Ok(Self { ctx, act })
    }
}

/// Print one line per report and fail when any task failed
pub fn finish(reports: &[TaskReport]) -> Result<()> {
    for report in reports {
        println!("{report}");
    }
    match failures(reports) {
        0 => Ok(()),
        failed => Err(Error::TasksFailed {
            failed,
            total: reports.len(),
        }),
    }
}
