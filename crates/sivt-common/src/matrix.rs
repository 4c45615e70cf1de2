//! Support matrix: known TKG versions, their tool versions, and legal
//! upgrade paths.
//!
//! ```yaml
//! matrix:
//!   1.4.0:
//!     kubectl: v1.21.2+vmware.1
//!     jq: "1.6"
//! upgrade_path:
//!   1.3.1: [1.4.0]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportMatrix {
    /// Supported versions, each mapping tool name to expected tool version
    #[serde(default)]
    pub matrix: BTreeMap<String, Value>,
    /// Legal direct transitions, from version to target versions
    #[serde(default)]
    pub upgrade_path: BTreeMap<String, Vec<String>>,
}

impl SupportMatrix {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!(
                "failed to read support matrix {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        serde_yaml::from_str(data)
            .map_err(|e| Error::configuration(format!("invalid support matrix: {e}")))
    }

    pub fn is_supported(&self, version: &str) -> bool {
        self.matrix.contains_key(version)
    }

    /// True when `to` is a declared direct upgrade target of `from`
    pub fn can_upgrade(&self, from: &str, to: &str) -> bool {
        self.upgrade_path
            .get(from)
            .is_some_and(|targets| targets.iter().any(|t| t == to))
    }

    /// Expected version of `tool` for TKG `version`.
    ///
    /// `Ok(None)` when the version is supported but doesn't pin the tool.
    pub fn tool_version(&self, version: &str, tool: &str) -> Result<Option<String>> {
        let entry = self.matrix.get(version).ok_or_else(|| {
            Error::configuration(format!("Tanzu version({version}) is not in the support matrix"))
        })?;
        Ok(entry.get(tool).and_then(scalar_to_string))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
