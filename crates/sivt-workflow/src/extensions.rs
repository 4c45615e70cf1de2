//! Where each TKG release keeps its extension bundles on the bootstrap host

use std::path::PathBuf;

use sivt_common::{Error, Result};

const EXTENSION_ROOTS: &[(&str, &str)] = &[
    ("1.3.0", "/tanzu/tkg-extensions-v1.3.0+vmware.1"),
    ("1.3.1", "/tanzu/tkg-extensions-v1.3.1+vmware.1"),
    ("1.4.0", "/tanzu/tkg-standard-repo-v1.4.0"),
];

/// Bundle locations for one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDirs {
    /// Release root; cert-manager manifests live here
    pub root: PathBuf,
    /// `<root>/extensions`
    pub dir: PathBuf,
}

impl ExtensionDirs {
    pub fn for_version(version: &str) -> Result<Self> {
        let root = EXTENSION_ROOTS
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, root)| PathBuf::from(root))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no extension bundle is known for Tanzu version({version})"
                ))
            })?;
        let dir = root.join("extensions");
        Ok(Self { root, dir })
    }
}
