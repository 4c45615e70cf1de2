//! File layout of an environment's root directory

use std::path::{Path, PathBuf};

pub const SPEC_PATH: &str = "config/deployment-config.yml";
pub const DESIRED_STATE_PATH: &str = "desired-state/desired-state.yml";
pub const STATE_PATH: &str = "deployment-state/state.yml";
pub const SUPPORT_MATRIX_PATH: &str = "template/support-matrix.yml";
pub const KUBECONFIG_PATH: &str = "kubeconfig-repo/.kube/config";

/// Resolves the well-known documents under `--root-dir`
#[derive(Debug, Clone)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spec(&self) -> PathBuf {
        self.root.join(SPEC_PATH)
    }

    pub fn desired_state(&self) -> PathBuf {
        self.root.join(DESIRED_STATE_PATH)
    }

    pub fn state(&self) -> PathBuf {
        self.root.join(STATE_PATH)
    }

    pub fn support_matrix(&self) -> PathBuf {
        self.root.join(SUPPORT_MATRIX_PATH)
    }

    pub fn kubeconfig(&self) -> PathBuf {
        self.root.join(KUBECONFIG_PATH)
    }
}
