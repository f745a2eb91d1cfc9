//! DAG orchestrator
//!
//! Runs a [`Dag`] to completion. A task starts as soon as all of its upstreams
//! have succeeded, so independent branches run concurrently and never wait on
//! each other. A failed task blocks everything downstream of it.
//! Nothing is retried: recovery is a manual [`Orchestrator::run_task`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::Result;

pub mod dag;
pub mod pipeline;

pub use dag::{Dag, DagError, TaskId, TaskNode};
pub use pipeline::Pipeline;

/// Executes a single task. Implementations decide what each [`TaskId`] means.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: TaskId) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum TaskState {
    Succeeded,
    /// The task ran and returned an error
    Failed(String),
    /// An upstream task failed, so this one never ran
    UpstreamFailed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Succeeded => "succeeded",
            TaskState::Failed(_) => "failed",
            TaskState::UpstreamFailed => "upstream_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: TaskId,
    pub state: TaskState,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl TaskReport {
    fn skipped(task: TaskId) -> Self {
        Self {
            task,
            state: TaskState::UpstreamFailed,
            started_at: None,
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dag: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One report per task, in topological order
    pub tasks: Vec<TaskReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Succeeded)
    }

    pub fn state_of(&self, task: TaskId) -> Option<&TaskState> {
        self.tasks.iter().find(|t| t.task == task).map(|t| &t.state)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Failed(_)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Orchestrator;

impl Orchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Run every task of `dag`, respecting dependencies.
    pub async fn run(&self, dag: &Dag, runner: &dyn TaskRunner) -> Result<RunSummary> {
        let order = dag.topological_order()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let span = info_span!("dag_run", dag = dag.name(), %run_id);
        let reports = async {
            info!(tasks = order.len(), "Starting DAG run");
            let mut reports: HashMap<TaskId, TaskReport> = HashMap::new();
            let mut launched: HashSet<TaskId> = HashSet::new();
            let mut running = FuturesUnordered::new();

            loop {
                for task in order.iter().copied() {
                    if launched.contains(&task) || reports.contains_key(&task) {
                        continue;
                    }
                    let ready = dag.upstream(task).iter().all(|up| {
                        reports.get(up).map(|r| &r.state) == Some(&TaskState::Succeeded)
                    });
                    if ready {
                        launched.insert(task);
                        running.push(execute(runner, task));
                    }
                }

                let Some(report) = running.next().await else {
                    break;
                };

                if matches!(report.state, TaskState::Failed(_)) {
                    for blocked in dag.downstream_of(report.task) {
                        reports
                            .entry(blocked)
                            .or_insert_with(|| TaskReport::skipped(blocked));
                    }
                }
                reports.insert(report.task, report);
            }

            reports
        }
        .instrument(span)
        .await;

        let tasks: Vec<TaskReport> = order
            .iter()
            .map(|task| {
                reports
                    .get(task)
                    .cloned()
                    .unwrap_or_else(|| TaskReport::skipped(*task))
            })
            .collect();

        let summary = RunSummary {
            run_id,
            dag: dag.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            tasks,
        };

        if summary.succeeded() {
            info!(%run_id, "DAG run succeeded");
        } else {
            let failed: Vec<_> = summary.failed().map(|t| t.task.as_str()).collect();
            error!(%run_id, failed = ?failed, "DAG run failed");
        }

        Ok(summary)
    }

    /// Run one task in isolation, ignoring its upstreams.
    pub async fn run_task(&self, runner: &dyn TaskRunner, task: TaskId) -> TaskReport {
        execute(runner, task).await
    }
}

async fn execute(runner: &dyn TaskRunner, task: TaskId) -> TaskReport {
    let started_at = Utc::now();
    let clock = Instant::now();

    let result = runner
        .run(task)
        .instrument(info_span!("task", task = task.as_str()))
        .await;
    let duration_ms = clock.elapsed().as_millis() as u64;

    let state = match result {
        Ok(()) => {
            info!(task = task.as_str(), duration_ms, "Task succeeded");
            TaskState::Succeeded
        },
        Err(e) => {
            let message = format!("{:#}", e);
            warn!(task = task.as_str(), duration_ms, error = %message, "Task failed");
            TaskState::Failed(message)
        },
    };

    TaskReport {
        task,
        state,
        started_at: Some(started_at),
        duration_ms: Some(duration_ms),
    }
}
