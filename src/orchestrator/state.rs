//! Persisted build progress.
//!
//! A single [`BuildState`] document describes one build attempt and is
//! checkpointed to `.buildsmith/build-state.yaml` after every phase and task
//! transition. Every field carries a serde default so documents written by
//! older versions still load.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level build lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    NotStarted,
    Planning,
    Building,
    Reviewing,
    Completed,
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::NotStarted => write!(f, "not_started"),
            BuildStatus::Planning => write!(f, "planning"),
            BuildStatus::Building => write!(f, "building"),
            BuildStatus::Reviewing => write!(f, "reviewing"),
            BuildStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Per-task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One planned unit of work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    /// Agent the planner assigned to this task (e.g. "coder")
    pub agent: String,
    /// Files the planner expects this task to produce
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_files: Vec<String>,
    pub files_written: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub fn new(id: &str, name: &str, description: &str, agent: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            agent: agent.to_string(),
            ..Self::default()
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.error = None;
    }

    pub fn complete(&mut self, files_written: Vec<String>) {
        self.status = TaskStatus::Completed;
        self.files_written = files_written;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: &str) {
        self.status = TaskStatus::Failed;
        self.error = Some(message.to_string());
    }

    /// Return an interrupted task to the queue so a resumed run retries it.
    pub fn revert_to_pending(&mut self) {
        self.status = TaskStatus::Pending;
        self.started_at = None;
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// The persisted record of one build attempt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildState {
    pub build_id: String,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Generation backend name
    pub provider: String,
    /// Generation model name
    pub model: String,
    /// Content hash of the specification this build was planned from
    pub spec_hash: String,
    pub tasks: Vec<TaskState>,
    /// Rendered architecture decisions from the plan phase
    pub decisions: String,
    pub current_task_index: usize,
    pub files_written: Vec<String>,
    pub errors: Vec<String>,
}

impl BuildState {
    /// Start a new build attempt with a fresh identifier.
    pub fn fresh(provider: &str, model: &str, spec_hash: &str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            build_id: id[..8].to_string(),
            status: BuildStatus::Planning,
            started_at: Some(Utc::now()),
            provider: provider.to_string(),
            model: model.to_string(),
            spec_hash: spec_hash.to_string(),
            ..Self::default()
        }
    }

    /// Whether this state can be resumed for a spec with the given fingerprint.
    ///
    /// Requires a build that is mid-flight, planned from the same spec, with
    /// at least one task still pending or in progress.
    pub fn can_resume(&self, spec_hash: &str) -> bool {
        if matches!(self.status, BuildStatus::NotStarted | BuildStatus::Completed) {
            return false;
        }
        if self.spec_hash != spec_hash {
            return false;
        }
        self.tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress))
    }

    /// Index of the first task not yet completed (`tasks.len()` when all are).
    pub fn first_incomplete_index(&self) -> usize {
        self.tasks
            .iter()
            .position(|t| !t.is_done())
            .unwrap_or(self.tasks.len())
    }

    /// Re-point `current_task_index` at the first incomplete task.
    pub fn sync_task_index(&mut self) {
        self.current_task_index = self.first_incomplete_index();
    }

    pub fn in_progress_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count()
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Record files written during this build, keeping first-write order.
    pub fn record_files(&mut self, files: &[String]) {
        for file in files {
            if !self.files_written.contains(file) {
                self.files_written.push(file.clone());
            }
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn finish(&mut self) {
        self.status = BuildStatus::Completed;
        self.completed_at = Some(Utc::now());
    }
}

/// Content hash of a specification, used to decide whether state may be resumed.
pub fn spec_fingerprint(spec: &str) -> String {
    let digest = Sha256::digest(spec.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Loads and checkpoints [`BuildState`] as YAML.
pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    /// Load persisted state, or a `not_started` state when none exists.
    pub fn load(&self) -> Result<BuildState> {
        if !self.state_file.exists() {
            return Ok(BuildState::default());
        }
        let content = fs::read_to_string(&self.state_file).with_context(|| {
            format!("Failed to read state file: {}", self.state_file.display())
        })?;
        if content.trim().is_empty() {
            return Ok(BuildState::default());
        }
        serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse state file: {}", self.state_file.display())
        })
    }

    /// Persist state synchronously. The document is written to a sibling
    /// temp file and renamed so a crash never leaves a half-written state.
    pub fn save(&self, state: &BuildState) -> Result<()> {
        let yaml = serde_yaml::to_string(state).context("Failed to serialize build state")?;
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let tmp = self.state_file.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).context("Failed to write build state")?;
        fs::rename(&tmp, &self.state_file).context("Failed to commit build state")?;
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        if self.state_file.exists() {
            fs::remove_file(&self.state_file).context("Failed to remove state file")?;
        }
        Ok(())
    }
}
