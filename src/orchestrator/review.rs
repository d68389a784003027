//! Review phase: one verdict over every written file, then at most one
//! automatic fix per error-severity issue.
//!
//! Fix output goes through the same firewall as the build phase before it
//! is written. A fix must return a block for the file the issue named.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use tokio_util::sync::CancellationToken;

use super::runner::{BuildOrchestrator, guarded};
use super::state::BuildStatus;
use super::workspace::{normalize_rel_path, resolve_within};
use crate::agents::{FixRequest, ReviewIssue, ReviewRequest, extract_files};
use crate::errors::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    Applied,
    Denied,
    NoFileBlock,
    Failed,
    /// The issue named a file this build did not write
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRecord {
    pub file: String,
    pub outcome: FixOutcome,
}

/// The persisted review artifact (`.buildsmith/review.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub build_id: String,
    pub reviewed_at: DateTime<Utc>,
    pub passed: bool,
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub fixes: Vec<FixRecord>,
}

impl ReviewReport {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read review report: {}", path.display()))?;
        serde_yaml::from_str(&content).context("Failed to parse review report")
    }
}

impl BuildOrchestrator {
    pub(super) async fn review_phase(
        &mut self,
        spec: &str,
        rules: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(reviewer) = self.collaborators.reviewer.clone() else {
            return Ok(());
        };
        self.state.status = BuildStatus::Reviewing;
        self.checkpoint()?;

        let mut files = BTreeMap::new();
        for path in &self.state.files_written {
            let Ok(full) = resolve_within(&self.config.project_dir, path) else {
                continue;
            };
            match fs::read_to_string(&full) {
                Ok(content) => {
                    files.insert(path.clone(), content);
                }
                Err(err) => tracing::debug!(path = %path, error = %err, "written file no longer readable"),
            }
        }
        if files.is_empty() {
            return Ok(());
        }

        tracing::info!(files = files.len(), "review started");
        if let Some(ui) = self.ui() {
            ui.review_started(files.len());
        }
        let request = ReviewRequest {
            files,
            spec: spec.to_string(),
            rules: rules.to_string(),
        };
        let verdict = guarded(cancel, reviewer.review(&request))
            .await
            .context("Review phase failed")?;

        let (errors, warnings) = verdict.partition();
        let errors: Vec<ReviewIssue> = errors.into_iter().cloned().collect();
        let warning_count = warnings.len();
        for issue in verdict.issues.iter() {
            tracing::info!(
                file = %issue.file,
                severity = issue.severity.as_str(),
                message = %issue.message,
                "review issue"
            );
            if let Some(ui) = self.ui() {
                ui.review_issue(issue.severity.as_str(), &issue.file, &issue.message);
            }
        }

        let mut fixes = Vec::with_capacity(errors.len());
        for issue in &errors {
            let outcome = self.fix_issue(issue, spec, rules, cancel).await?;
            fixes.push(FixRecord {
                file: normalize_rel_path(&issue.file),
                outcome,
            });
            self.checkpoint()?;
        }

        let report = ReviewReport {
            build_id: self.state.build_id.clone(),
            reviewed_at: Utc::now(),
            passed: verdict.passed,
            issues: verdict.issues.clone(),
            fixes,
        };
        let yaml = serde_yaml::to_string(&report).context("Failed to serialize review report")?;
        fs::write(&self.config.review_file, yaml).context("Failed to write review report")?;

        if let Some(ui) = self.ui() {
            ui.review_done(verdict.passed, errors.len(), warning_count);
        }
        Ok(())
    }

    /// Make exactly one fix attempt for `issue`. Only cancellation and I/O
    /// failures are returned as errors.
    async fn fix_issue(
        &mut self,
        issue: &ReviewIssue,
        spec: &str,
        rules: &str,
        cancel: &CancellationToken,
    ) -> Result<FixOutcome> {
        let target = normalize_rel_path(&issue.file);
        if !self.state.files_written.contains(&target) {
            tracing::info!(file = %target, "review issue names an untracked file; not fixing");
            return Ok(FixOutcome::Untracked);
        }
        let current = resolve_within(&self.config.project_dir, &target)
            .ok()
            .and_then(|full| fs::read_to_string(full).ok());
        let Some(current_content) = current else {
            self.state.record_error(format!(
                "Fix for '{}' skipped: file is no longer readable",
                target
            ));
            return Ok(FixOutcome::Failed);
        };

        if let Some(ui) = self.ui() {
            ui.fix_attempt(&target);
        }
        let request = FixRequest {
            path: target.clone(),
            current_content,
            issue: issue.message.clone(),
            spec: spec.to_string(),
            rules: rules.to_string(),
        };
        let response = match guarded(cancel, self.collaborators.generator.fix(&request)).await {
            Ok(response) => response,
            Err(err) if BuildError::is_cancellation(&err) => return Err(err),
            Err(err) => {
                self.state
                    .record_error(format!("Fix for '{}' failed: {:#}", target, err));
                return Ok(FixOutcome::Failed);
            }
        };

        let block = extract_files(&response)
            .into_iter()
            .find(|block| normalize_rel_path(&block.path) == target);
        let Some(block) = block else {
            self.state.record_error(format!(
                "Fix for '{}' did not return a block for that file",
                target
            ));
            return Ok(FixOutcome::NoFileBlock);
        };

        if self.commit_candidate(&target, &block.content)? {
            tracing::info!(file = %target, "review fix applied");
            Ok(FixOutcome::Applied)
        } else {
            Ok(FixOutcome::Denied)
        }
    }
}
