//! dbt invocation
//!
//! The transformation project is built in fixed phases, each a separate
//! `dbt` process run from the project directory. A non-zero exit fails the
//! step; there is no partial-failure handling.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};

/// How much of stderr to keep in a failure message.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStep {
    RunStaging,
    RunCore,
    Snapshot,
    RunAnalytics,
    Test,
    DocsGenerate,
}

impl TransformStep {
    /// Build order: staging, core, snapshot, star models, tests, docs.
    pub const ALL: [TransformStep; 6] = [
        TransformStep::RunStaging,
        TransformStep::RunCore,
        TransformStep::Snapshot,
        TransformStep::RunAnalytics,
        TransformStep::Test,
        TransformStep::DocsGenerate,
    ];

    /// dbt sub-command and selection for this step
    pub fn args(self) -> &'static [&'static str] {
        match self {
            TransformStep::RunStaging => &["run", "--select", "models/staging"],
            TransformStep::RunCore => &["run", "--select", "models/core"],
            TransformStep::Snapshot => &["snapshot"],
            TransformStep::RunAnalytics => &["run", "--select", "models/star"],
            TransformStep::Test => &["test"],
            TransformStep::DocsGenerate => &["docs", "generate"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransformStep::RunStaging => "run_staging",
            TransformStep::RunCore => "run_core",
            TransformStep::Snapshot => "snapshot",
            TransformStep::RunAnalytics => "run_analytics",
            TransformStep::Test => "test",
            TransformStep::DocsGenerate => "docs_generate",
        }
    }
}

impl std::fmt::Display for TransformStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// dbt executable, resolved through PATH when not absolute
    pub executable: String,
    pub project_dir: PathBuf,
    pub profiles_dir: PathBuf,
    /// Where dbt writes manifest.json, run_results.json and the docs site
    pub target_dir: PathBuf,
}

impl Default for TransformConfig {
    fn default() -> Self {
        let project_dir = PathBuf::from("/opt/airflow/firmographics_dbt");
        Self {
            executable: "dbt".to_string(),
            target_dir: project_dir.join("target"),
            project_dir,
            profiles_dir: PathBuf::from("/opt/airflow/.dbt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: TransformStep,
    pub exit_code: i32,
    pub duration_ms: u64,
}

pub struct DbtRunner {
    config: TransformConfig,
}

impl DbtRunner {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Full argument list for `step`, including the profiles directory.
    pub fn command_args(&self, step: TransformStep) -> Vec<String> {
        step.args()
            .iter()
            .map(|arg| arg.to_string())
            .chain([
                "--profiles-dir".to_string(),
                self.config.profiles_dir.display().to_string(),
            ])
            .collect()
    }

    /// Run one step to completion.
    #[instrument(skip(self), fields(step = %step))]
    pub async fn run_step(&self, step: TransformStep) -> Result<StepOutcome> {
        let args = self.command_args(step);
        info!(
            "Running {} {} in {}",
            self.config.executable,
            args.join(" "),
            self.config.project_dir.display()
        );

        let start = Instant::now();
        let output = Command::new(&self.config.executable)
            .args(&args)
            .current_dir(&self.config.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::ToolFailed {
                step,
                code: None,
                stderr: format!("failed to spawn {}: {}", self.config.executable, e),
            })?;
        let duration_ms = start.elapsed().as_millis() as u64;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(target: "dbt", "{}", line);
        }

        if !output.status.success() {
            let stderr = tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_BYTES);
            warn!(code = ?output.status.code(), duration_ms, "dbt step failed");
            return Err(PipelineError::ToolFailed {
                step,
                code: output.status.code(),
                stderr,
            });
        }

        info!(duration_ms, "dbt step finished");

        Ok(StepOutcome {
            step,
            exit_code: output.status.code().unwrap_or(0),
            duration_ms,
        })
    }
}

fn tail(text: &str, max_bytes: usize) -> String {
    let trimmed = text.trim_end();
    if trimmed.len() <= max_bytes {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - max_bytes;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn runner(executable: &str, project_dir: PathBuf) -> DbtRunner {
        DbtRunner::new(TransformConfig {
            executable: executable.to_string(),
            target_dir: project_dir.join("target"),
            project_dir,
            profiles_dir: PathBuf::from("/opt/airflow/.dbt"),
        })
    }

    #[test]
    fn test_build_order() {
        assert_eq!(TransformStep::ALL[2], TransformStep::Snapshot);
        assert_eq!(TransformStep::ALL[3], TransformStep::RunAnalytics);
        assert_eq!(TransformStep::ALL[5], TransformStep::DocsGenerate);
    }

    #[test]
    fn test_command_args() {
        let runner = runner("dbt", PathBuf::from("/tmp"));
        assert_eq!(
            runner.command_args(TransformStep::RunAnalytics),
            vec!["run", "--select", "models/star", "--profiles-dir", "/opt/airflow/.dbt"]
        );
        assert_eq!(
            runner.command_args(TransformStep::DocsGenerate),
            vec!["docs", "generate", "--profiles-dir", "/opt/airflow/.dbt"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_step() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = runner("true", dir.path().to_path_buf())
            .run_step(TransformStep::Test)
            .await
            .unwrap();
        assert_eq!(outcome.step, TransformStep::Test);
        assert_eq!(outcome.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner("false", dir.path().to_path_buf())
            .run_step(TransformStep::Snapshot)
            .await
            .unwrap_err();
        match err {
            PipelineError::ToolFailed { step, code, .. } => {
                assert_eq!(step, TransformStep::Snapshot);
                assert_eq!(code, Some(1));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner("firmo-no-such-dbt-binary", dir.path().to_path_buf())
            .run_step(TransformStep::RunStaging)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { code: None, .. }));
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("short\n", 10), "short");
        assert_eq!(tail("0123456789abcdef", 4), "...cdef");
    }
}
