//! Installed tool versions against the support matrix entry of the desired
//! Tanzu version.

use std::fmt;

use tracing::{info, warn};

use sivt_common::{Error, Result};

use crate::context::{Actuators, RunContext};

/// How to ask one tool for its version and read the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCheck {
    pub tool: &'static str,
    pub program: &'static str,
    pub args: &'static [&'static str],
    /// Text preceding the version on the first output line
    pub prefix: &'static str,
    pub matrix_key: &'static str,
}

impl ToolCheck {
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string();
        for arg in self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Installed version from the command output
    pub fn parse(&self, output: &str) -> Option<String> {
        let first = output.lines().next()?.trim();
        let version = first.strip_prefix(self.prefix).unwrap_or(first).trim();
        (!version.is_empty()).then(|| version.to_string())
    }
}

pub const TOOL_CHECKS: [ToolCheck; 7] = [
    ToolCheck {
        tool: "kubectl",
        program: "kubectl",
        args: &["version", "--client", "--short"],
        prefix: "Client Version: ",
        matrix_key: "kubectl",
    },
    ToolCheck {
        tool: "ytt",
        program: "ytt",
        args: &["version"],
        prefix: "ytt version ",
        matrix_key: "ytt",
    },
    ToolCheck {
        tool: "kapp",
        program: "kapp",
        args: &["version"],
        prefix: "kapp version ",
        matrix_key: "kapp",
    },
    ToolCheck {
        tool: "kbld",
        program: "kbld",
        args: &["version"],
        prefix: "kbld version ",
        matrix_key: "kbld",
    },
    ToolCheck {
        tool: "imgpkg",
        program: "imgpkg",
        args: &["version"],
        prefix: "imgpkg version ",
        matrix_key: "imgpkg",
    },
    ToolCheck {
        tool: "yq",
        program: "yq",
        args: &["--version"],
        prefix: "yq version ",
        matrix_key: "yq",
    },
    ToolCheck {
        tool: "jq",
        program: "jq",
        args: &["--version"],
        prefix: "jq-",
        matrix_key: "jq",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Matches(String),
    Mismatch { installed: String, expected: String },
    /// The matrix entry doesn't pin this tool
    Unchecked,
    /// The version command failed or printed nothing usable
    Unavailable(String),
}

impl ToolStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolStatus::Matches(_) | ToolStatus::Unchecked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReport {
    pub tool: &'static str,
    pub status: ToolStatus,
}

impl fmt::Display for ToolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ToolStatus::Matches(v) => write!(f, "{}: {v} OK", self.tool),
            ToolStatus::Mismatch { installed, expected } => {
                write!(f, "{}: {installed} installed, {expected} required", self.tool)
            }
            ToolStatus::Unchecked => write!(f, "{}: unchecked", self.tool),
            ToolStatus::Unavailable(reason) => write!(f, "{}: unavailable ({reason})", self.tool),
        }
    }
}

/// Run every check against the matrix entry for the desired version.
///
/// A missing matrix entry is a configuration error; individual tool
/// problems are reported per tool.
pub async fn validate_env(ctx: &RunContext, act: &Actuators) -> Result<Vec<ToolReport>> {
    let target = ctx.target_version();
    let mut reports = Vec::with_capacity(TOOL_CHECKS.len());

    for check in &TOOL_CHECKS {
        let Some(expected) = ctx.matrix.tool_version(target, check.matrix_key)? else {
            reports.push(ToolReport {
                tool: check.tool,
                status: ToolStatus::Unchecked,
            });
            continue;
        };

        let status = match act.commands.output(&check.command_line()).await {
            Ok(output) => match check.parse(&output) {
                Some(installed) if installed == expected => ToolStatus::Matches(installed),
                Some(installed) => ToolStatus::Mismatch { installed, expected },
                None => ToolStatus::Unavailable("empty version output".to_string()),
            },
            Err(e) => ToolStatus::Unavailable(e.to_string()),
        };
        let report = ToolReport {
            tool: check.tool,
            status,
        };
        if report.status.is_ok() {
            info!(tool = check.tool, "{report}");
        } else {
            warn!(tool = check.tool, "{report}");
        }
        reports.push(report);
    }
    Ok(reports)
}

/// Fail with every offending tool named
pub fn require_all(reports: &[ToolReport]) -> Result<()> {
    let failed: Vec<String> = reports
        .iter()
        .filter(|r| !r.status.is_ok())
        .map(ToString::to_string)
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "tool versions do not match the support matrix: {}",
            failed.join("; ")
        )))
    }
}
