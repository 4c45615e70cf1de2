//! Git-backed audit log for state directories

use std::path::Path;

use git2::{IndexAddOption, Oid, Repository, Signature};
use tracing::debug;

use crate::Result;

const FALLBACK_AUTHOR: &str = "sivt";
const FALLBACK_EMAIL: &str = "sivt@localhost";

/// Open the repository at `dir`, initializing one if it doesn't exist yet
pub fn open_or_init(dir: &Path) -> Result<Repository> {
    match Repository::open(dir) {
        Ok(repo) => Ok(repo),
        Err(e) if e.code() == git2::ErrorCode::NotFound => {
            debug!(dir = %dir.display(), "Initializing git repository");
            Ok(Repository::init(dir)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Stage every change under `dir` (additions, modifications, deletions) and
/// commit with `message`. Returns `None` when the tree is unchanged.
pub fn add_all_and_commit(dir: &Path, message: &str) -> Result<Option<Oid>> {
    let repo = open_or_init(dir)?;

    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e)
            if matches!(
                e.code(),
                git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
            ) =>
        {
            None
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = &parent {
        if parent.tree_id() == tree_id {
            debug!(dir = %dir.display(), "Nothing to commit");
            return Ok(None);
        }
    }

    let signature = repo
        .signature()
        .or_else(|_| Signature::now(FALLBACK_AUTHOR, FALLBACK_EMAIL))?;
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

    debug!(dir = %dir.display(), commit = %oid, message, "Committed");
    Ok(Some(oid))
}
