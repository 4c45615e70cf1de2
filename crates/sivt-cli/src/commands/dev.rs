//! `sivt dev`: maintenance helpers for test environments

use std::path::Path;

use clap::Subcommand;
use tracing::warn;

use sivt_common::{RootLayout, StateStore};

use crate::Result;

const CLEANUP_MESSAGE: &str = "Delete state file for testing";

#[derive(Subcommand, Debug)]
pub enum DevCommand {
    /// Delete the state file and commit the removal
    Cleanup,
}

pub async fn run(root_dir: &Path, command: DevCommand) -> Result<()> {
    match command {
        DevCommand::Cleanup => cleanup(root_dir),
    }
}

fn cleanup(root_dir: &Path) -> Result<()> {
    let store = StateStore::new(RootLayout::new(root_dir).state());
    warn!(path = %store.path().display(), "Deleting state file");
    store.remove(CLEANUP_MESSAGE)?;
    Ok(())
}
