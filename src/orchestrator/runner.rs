use anyhow::{Context, Result};
use std::fs;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::hygiene;
use super::state::{BuildState, BuildStatus, StateStore, TaskState, TaskStatus, spec_fingerprint};
use super::workspace::{read_optional, write_project_file};
use crate::agents::{
    GenerationRequest, Generator, PlanRequest, Planner, Reviewer, extract_files, format_decisions,
};
use crate::config::Config;
use crate::context::ContextAssembler;
use crate::errors::BuildError;
use crate::firewall::{AuditLog, Firewall, Verdict};
use crate::ui::BuildUI;
use crate::util::sanitize_file_stem;

/// The plan/generate/review collaborators a build talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub generator: Arc<dyn Generator>,
    /// `None` disables the review phase
    pub reviewer: Option<Arc<dyn Reviewer>>,
}

/// Drives one build through planning, building and review.
///
/// The orchestrator owns the [`BuildState`] for the life of the process and
/// checkpoints it after every phase and task transition, and before every
/// collaborator call that might not return.
pub struct BuildOrchestrator {
    pub(super) config: Config,
    pub(super) store: StateStore,
    pub(super) state: BuildState,
    pub(super) firewall: Firewall,
    pub(super) context: ContextAssembler,
    pub(super) collaborators: Collaborators,
    pub(super) ui: Option<Arc<BuildUI>>,
}

/// Await `fut` unless the operator cancels first.
pub(super) async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BuildError::Cancelled.into()),
        result = fut => result,
    }
}

impl BuildOrchestrator {
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        let store = StateStore::new(config.state_file.clone());
        let state = store.load()?;
        let firewall = Firewall::load(&config.policy_file, AuditLog::new(config.audit_log.clone()))
            .context("Failed to load firewall policy")?;
        let context = ContextAssembler::new(&config.project_dir);
        Ok(Self {
            config,
            store,
            state,
            firewall,
            context,
            collaborators,
            ui: None,
        })
    }

    pub fn with_ui(mut self, ui: Arc<BuildUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub(super) fn ui(&self) -> Option<&BuildUI> {
        self.ui.as_deref()
    }

    pub(super) fn checkpoint(&self) -> Result<()> {
        self.store.save(&self.state)
    }

    /// Run (or resume) the build.
    ///
    /// Returns `Ok` once the build is `completed`, possibly with per-task
    /// errors recorded in the state. Fatal input errors and cancellation are
    /// returned as errors; cancellation leaves the state resumable.
    pub async fn run(&mut self, feature: Option<&str>, cancel: &CancellationToken) -> Result<()> {
        let spec = self.read_spec()?;
        let rules = read_optional(&self.config.rules_file)?;
        self.config.ensure_directories()?;
        self.scan_inputs(&spec, &rules);

        let spec_hash = spec_fingerprint(&spec);
        if self.state.can_resume(&spec_hash) {
            let done = self.state.count_with_status(TaskStatus::Completed);
            tracing::info!(
                build_id = %self.state.build_id,
                done,
                total = self.state.tasks.len(),
                "resuming build"
            );
            if let Some(ui) = self.ui() {
                ui.show_resume(&self.state.build_id, done, self.state.tasks.len());
                ui.set_tasks(self.state.tasks.len(), done);
            }
            if feature.is_some() {
                tracing::warn!("resuming an unfinished build; the feature description is ignored");
            }
        } else {
            let provider = &self.config.settings.provider;
            self.state = BuildState::fresh(&provider.name, &provider.effective_model(), &spec_hash);
            tracing::info!(build_id = %self.state.build_id, spec_hash = %spec_hash, "starting fresh build");
            if let Some(ui) = self.ui() {
                ui.print_header(&self.state.build_id, &self.state.provider, &self.state.model);
            }
            self.checkpoint()?;
            self.plan_phase(&spec, &rules, feature, cancel).await?;
        }

        self.build_phase(&spec, &rules, cancel).await?;

        let review_enabled =
            self.config.settings.build.review && self.collaborators.reviewer.is_some();
        if review_enabled && !self.state.files_written.is_empty() {
            self.review_phase(&spec, &rules, cancel).await?;
        }

        self.state.finish();
        self.checkpoint()?;
        tracing::info!(
            build_id = %self.state.build_id,
            files = self.state.files_written.len(),
            errors = self.state.errors.len(),
            "build completed"
        );
        if let Some(ui) = self.ui() {
            ui.finish(self.state.files_written.len(), self.state.errors.len());
        }
        Ok(())
    }

    fn read_spec(&self) -> Result<String> {
        let spec = read_optional(&self.config.spec_file)?;
        if spec.trim().is_empty() {
            return Err(BuildError::MissingSpec {
                path: self.config.spec_file.clone(),
            }
            .into());
        }
        Ok(spec)
    }

    fn scan_inputs(&self, spec: &str, rules: &str) {
        let findings = hygiene::scan("spec.md", spec)
            .into_iter()
            .chain(hygiene::scan("rules.md", rules));
        for finding in findings {
            tracing::warn!(source = %finding.source, marker = finding.marker, "suspicious input");
            match self.ui() {
                Some(ui) => ui.warning(&finding.to_string()),
                None => eprintln!("warning: {}", finding),
            }
        }
    }

    async fn plan_phase(
        &mut self,
        spec: &str,
        rules: &str,
        feature: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(ui) = self.ui() {
            ui.plan_started();
        }
        let request = PlanRequest {
            spec: spec.to_string(),
            rules: rules.to_string(),
            context: self
                .context
                .snapshot(self.config.settings.build.plan_context_tokens)?,
            feature: feature.map(str::to_string),
        };

        let plan = guarded(cancel, self.collaborators.planner.plan(&request))
            .await
            .context("Plan phase failed")?;
        if plan.tasks.is_empty() {
            return Err(BuildError::EmptyPlan.into());
        }

        self.state.decisions = format_decisions(&plan.decisions);
        self.state.tasks = plan
            .tasks
            .into_iter()
            .enumerate()
            .map(|(i, planned)| {
                let id = planned.id.unwrap_or_else(|| format!("task_{:02}", i + 1));
                let name = planned.name.unwrap_or_else(|| "Unnamed task".to_string());
                let agent = planned.agent.unwrap_or_else(|| "coder".to_string());
                let mut task = TaskState::new(&id, &name, &planned.description, &agent);
                task.planned_files = planned.files;
                task
            })
            .collect();
        fs::write(
            &self.config.decisions_file,
            format!("# Build Decisions\n\n{}\n", self.state.decisions),
        )
        .context("Failed to write decisions.md")?;

        self.state.status = BuildStatus::Building;
        self.state.sync_task_index();
        self.checkpoint()?;
        tracing::info!(tasks = self.state.tasks.len(), "plan ready");
        if let Some(ui) = self.ui() {
            ui.plan_ready(self.state.tasks.len());
        }
        Ok(())
    }

    async fn build_phase(
        &mut self,
        spec: &str,
        rules: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.state.status = BuildStatus::Building;
        self.state.sync_task_index();
        self.checkpoint()?;

        let start = self.state.current_task_index;
        for index in start..self.state.tasks.len() {
            if self.state.tasks[index].is_done() {
                continue;
            }
            if cancel.is_cancelled() {
                if let Some(ui) = self.ui() {
                    ui.paused();
                }
                return Err(BuildError::Cancelled.into());
            }
            self.run_task(index, spec, rules, cancel).await?;
        }
        Ok(())
    }

    /// Run one task. Only cancellation and checkpoint failures escape; any
    /// other failure marks the task failed and the build moves on.
    async fn run_task(
        &mut self,
        index: usize,
        spec: &str,
        rules: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let total = self.state.tasks.len();
        self.state.tasks[index].start();
        self.state.sync_task_index();
        self.checkpoint()?;

        let name = self.state.tasks[index].name.clone();
        tracing::info!(task = %self.state.tasks[index].id, name = %name, "task started");
        if let Some(ui) = self.ui() {
            ui.task_started(index, total, &name);
        }

        match self.execute_task(index, spec, rules, cancel).await {
            Ok(files) => {
                tracing::info!(task = %self.state.tasks[index].id, files = files.len(), "task completed");
                if let Some(ui) = self.ui() {
                    ui.task_complete(files.len());
                }
                self.state.tasks[index].complete(files);
            }
            Err(err) if BuildError::is_cancellation(&err) => {
                self.state.tasks[index].revert_to_pending();
                self.state.sync_task_index();
                self.checkpoint()?;
                tracing::info!(task = %self.state.tasks[index].id, "task interrupted, returned to pending");
                if let Some(ui) = self.ui() {
                    ui.paused();
                }
                return Err(err);
            }
            Err(err) => {
                let message = format!("{:#}", err);
                tracing::warn!(task = %self.state.tasks[index].id, error = %message, "task failed");
                if let Some(ui) = self.ui() {
                    ui.task_failed(&message);
                }
                self.state.tasks[index].fail(&message);
                self.state
                    .record_error(format!("Task '{}' failed: {}", name, message));
            }
        }

        self.state.sync_task_index();
        self.checkpoint()
    }

    /// Generate, vet and write the files for one task; returns the paths written.
    async fn execute_task(
        &mut self,
        index: usize,
        spec: &str,
        rules: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let task = self.state.tasks[index].clone();
        let request = GenerationRequest {
            task_name: task.name.clone(),
            task_description: task.description.clone(),
            files: task.planned_files.clone(),
            spec: spec.to_string(),
            rules: rules.to_string(),
            decisions: self.state.decisions.clone(),
            context: self
                .context
                .snapshot(self.config.settings.build.task_context_tokens)?,
        };

        let response = guarded(cancel, self.collaborators.generator.generate(&request))
            .await
            .with_context(|| format!("Generation failed for task '{}'", task.name))?;
        self.save_response(index, &task.name, &response)?;

        let blocks = extract_files(&response);
        if blocks.is_empty() {
            tracing::warn!(task = %task.id, "generation response contained no file blocks");
            if let Some(ui) = self.ui() {
                ui.warning(&format!("Task '{}' produced no files", task.name));
            }
        }

        let mut written = Vec::new();
        for block in blocks {
            match self.commit_candidate(&block.path, &block.content) {
                Ok(true) => written.push(block.path),
                Ok(false) => {}
                Err(err) => {
                    // Files already on disk stay attributed to the task.
                    self.state.tasks[index].files_written = written;
                    return Err(err);
                }
            }
        }
        Ok(written)
    }

    fn save_response(&self, index: usize, name: &str, response: &str) -> Result<()> {
        let file = self.config.context_dir.join(format!(
            "{:02}_{}.md",
            index + 1,
            sanitize_file_stem(name, 40)
        ));
        fs::create_dir_all(&self.config.context_dir)
            .context("Failed to create context directory")?;
        fs::write(&file, response)
            .with_context(|| format!("Failed to save generation response: {}", file.display()))
    }

    /// Vet a candidate through the firewall and write it if permitted.
    ///
    /// Denials and unsafe paths are recorded as build-level errors and
    /// reported as `Ok(false)`; only I/O failures are returned as errors.
    pub(super) fn commit_candidate(&mut self, path: &str, content: &str) -> Result<bool> {
        if let Verdict::Denied { reason, message } = self.firewall.validate(path, content)? {
            if let Some(ui) = self.ui() {
                ui.file_blocked(path, reason.as_str());
            }
            self.state
                .record_error(format!("Firewall blocked '{}': {}", path, message));
            return Ok(false);
        }

        match write_project_file(&self.config.project_dir, path, content) {
            Ok(_) => {
                tracing::debug!(path, "file written");
                if let Some(ui) = self.ui() {
                    ui.file_written(path);
                }
                self.state.record_files(&[path.to_string()]);
                Ok(true)
            }
            Err(err) => match err.downcast_ref::<BuildError>() {
                Some(unsafe_path @ BuildError::UnsafePath { .. }) => {
                    let message = unsafe_path.to_string();
                    if let Some(ui) = self.ui() {
                        ui.file_blocked(path, "UNSAFE_PATH");
                    }
                    self.state.record_error(message);
                    Ok(false)
                }
                _ => Err(err),
            },
        }
    }
}
