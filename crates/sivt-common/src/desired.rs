//! Desired state: the externally supplied target for one invocation

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetVersion {
    pub tkg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    pub version: TargetVersion,
    #[serde(default)]
    pub bom_image_tag: Option<String>,
}

impl DesiredState {
    pub fn new(tkg: impl Into<String>) -> Self {
        Self {
            version: TargetVersion { tkg: tkg.into() },
            bom_image_tag: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read desired state {}: {e}", path.display()))
        })?;
        let desired: DesiredState = serde_yaml::from_str(&data)
            .map_err(|e| Error::configuration(format!("invalid desired state: {e}")))?;
        if desired.version.tkg.trim().is_empty() {
            return Err(Error::configuration("desired state has an empty tkg version"));
        }
        Ok(desired)
    }

    pub fn target_version(&self) -> &str {
        &self.version.tkg
    }
}
