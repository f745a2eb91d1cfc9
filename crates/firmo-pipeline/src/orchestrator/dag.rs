//! Static task graph

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskId {
    ExtractFortune,
    ScrapeSp500,
    LoadFortune,
    LoadSp500,
    DbtRunStage,
    DbtRunCore,
    DbtSnapshot,
    DbtRunAnalytics,
    DbtTest,
    DbtDocs,
    UploadArtifacts,
}

impl TaskId {
    pub const ALL: [TaskId; 11] = [
        TaskId::ExtractFortune,
        TaskId::ScrapeSp500,
        TaskId::LoadFortune,
        TaskId::LoadSp500,
        TaskId::DbtRunStage,
        TaskId::DbtRunCore,
        TaskId::DbtSnapshot,
        TaskId::DbtRunAnalytics,
        TaskId::DbtTest,
        TaskId::DbtDocs,
        TaskId::UploadArtifacts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskId::ExtractFortune => "extract_fortune",
            TaskId::ScrapeSp500 => "scrape_sp500",
            TaskId::LoadFortune => "load_fortune",
            TaskId::LoadSp500 => "load_sp500",
            TaskId::DbtRunStage => "dbt_run_stage",
            TaskId::DbtRunCore => "dbt_run_core",
            TaskId::DbtSnapshot => "dbt_snapshot",
            TaskId::DbtRunAnalytics => "dbt_run_analytics",
            TaskId::DbtTest => "dbt_test",
            TaskId::DbtDocs => "dbt_docs",
            TaskId::UploadArtifacts => "upload_artifacts",
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskId::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = TaskId::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown task '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    #[error("task {0} is declared twice")]
    DuplicateTask(TaskId),

    #[error("task {task} depends on undeclared task {upstream}")]
    UnknownUpstream { task: TaskId, upstream: TaskId },

    #[error("dependency cycle through: {}", .0.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<TaskId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub id: TaskId,
    pub upstream: Vec<TaskId>,
}

/// A directed acyclic graph of tasks with explicit upstream edges.
#[derive(Debug, Clone)]
pub struct Dag {
    name: String,
    nodes: Vec<TaskNode>,
}

impl Dag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Declare `id`, running after every task in `upstream`.
    pub fn task(mut self, id: TaskId, upstream: &[TaskId]) -> Self {
        self.nodes.push(TaskNode {
            id,
            upstream: upstream.to_vec(),
        });
        self
    }

    /// The firmographics ingestion graph.
    ///
    /// ```text
    /// extract_fortune >> load_fortune ─┐
    /// scrape_sp500    >> load_sp500  ──┴─> dbt_run_stage >> dbt_run_core >> dbt_snapshot
    ///     >> dbt_run_analytics >> dbt_test >> dbt_docs >> upload_artifacts
    /// ```
    pub fn firmographics() -> Self {
        use TaskId::*;

        Dag::new("firmographics_ingestion")
            .task(ExtractFortune, &[])
            .task(ScrapeSp500, &[])
            .task(LoadFortune, &[ExtractFortune])
            .task(LoadSp500, &[ScrapeSp500])
            .task(DbtRunStage, &[LoadFortune, LoadSp500])
            .task(DbtRunCore, &[DbtRunStage])
            .task(DbtSnapshot, &[DbtRunCore])
            .task(DbtRunAnalytics, &[DbtSnapshot])
            .task(DbtTest, &[DbtRunAnalytics])
            .task(DbtDocs, &[DbtTest])
            .task(UploadArtifacts, &[DbtDocs])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn upstream(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.upstream.as_slice())
            .unwrap_or(&[])
    }

    /// Every task that transitively depends on `id`.
    pub fn downstream_of(&self, id: TaskId) -> BTreeSet<TaskId> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for node in &self.nodes {
                if node.upstream.contains(&current) && found.insert(node.id) {
                    queue.push_back(node.id);
                }
            }
        }

        found
    }

    pub fn validate(&self) -> Result<(), DagError> {
        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm; ties are broken by declaration order.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, DagError> {
        let mut in_degree: HashMap<TaskId, usize> = HashMap::new();
        for node in &self.nodes {
            if in_degree.insert(node.id, node.upstream.len()).is_some() {
                return Err(DagError::DuplicateTask(node.id));
            }
        }
        for node in &self.nodes {
            if let Some(missing) = node.upstream.iter().find(|u| !in_degree.contains_key(u)) {
                return Err(DagError::UnknownUpstream {
                    task: node.id,
                    upstream: *missing,
                });
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut remaining = in_degree;

        loop {
            let next = self
                .nodes
                .iter()
                .map(|n| n.id)
                .find(|id| remaining.get(id) == Some(&0));

            let Some(id) = next else { break };
            remaining.remove(&id);
            order.push(id);

            for node in &self.nodes {
                let edges = node.upstream.iter().filter(|u| **u == id).count();
                if let Some(degree) = remaining.get_mut(&node.id) {
                    *degree -= edges;
                }
            }
        }

        if remaining.is_empty() {
            Ok(order)
        } else {
            let mut stuck: Vec<TaskId> = remaining.into_keys().collect();
            stuck.sort();
            Err(DagError::Cycle(stuck))
        }
    }
}
