//! Collaborator contracts used by the orchestrator.
//!
//! | Trait | Role |
//! |-------|------|
//! | [`Planner`] | spec + rules + snapshot → decisions and an ordered task list |
//! | [`Generator`] | task → free-form text carrying file blocks; review fixes |
//! | [`Reviewer`] | written files → pass/fail verdict with issues |
//!
//! The LLM-backed implementations live in [`llm`]; tests substitute scripted
//! fakes.

pub mod extract;
pub mod llm;
pub mod parse;
pub mod prompts;

pub use extract::{FileBlock, extract_files};
pub use llm::{LlmCoder, LlmPlanner, LlmReviewer};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Input to the plan phase.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub spec: String,
    pub rules: String,
    pub context: String,
    /// Feature description for an incremental build
    pub feature: Option<String>,
}

/// One task as proposed by the planner. Missing fields are filled in when
/// the task list is seeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Planner output. `tasks` is required; a document without it does not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub decisions: serde_yaml::Value,
    pub tasks: Vec<PlannedTask>,
}

/// Input to one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task_name: String,
    pub task_description: String,
    pub files: Vec<String>,
    pub spec: String,
    pub rules: String,
    pub decisions: String,
    pub context: String,
}

/// Input to a review fix: one file and the issue reported against it.
#[derive(Debug, Clone)]
pub struct FixRequest {
    pub path: String,
    pub current_content: String,
    pub issue: String,
    pub spec: String,
    pub rules: String,
}

#[derive(Debug, Clone)]
pub struct ReviewRequest {
    /// Relative path → current on-disk content
    pub files: BTreeMap<String, String>,
    pub spec: String,
    pub rules: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(if raw.trim().eq_ignore_ascii_case("error") {
            Severity::Error
        } else {
            Severity::Warning
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
}

impl ReviewVerdict {
    /// Split issues into (errors, warnings).
    pub fn partition(&self) -> (Vec<&ReviewIssue>, Vec<&ReviewIssue>) {
        self.issues
            .iter()
            .partition(|issue| issue.severity == Severity::Error)
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> Result<Plan>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce free-form text containing file blocks for one task.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Produce a corrected version of one file.
    async fn fix(&self, request: &FixRequest) -> Result<String>;
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewVerdict>;
}

/// Render the planner's decisions map as markdown.
///
/// Known sections (stack, architecture, reasoning, incremental change notes)
/// get headings; anything else falls back to a YAML dump.
pub fn format_decisions(decisions: &serde_yaml::Value) -> String {
    let Some(map) = decisions.as_mapping() else {
        return match decisions {
            serde_yaml::Value::Null => String::new(),
            other => yaml_scalar(other),
        };
    };

    let get = |key: &str| map.get(key);
    let mut sections = Vec::new();
    let mut known = 0;

    if let Some(stack) = get("stack").and_then(|s| s.as_mapping()) {
        known += 1;
        let mut lines = vec!["## Tech Stack".to_string()];
        for (key, value) in stack {
            lines.push(format!(
                "- **{}**: {}",
                capitalize(&yaml_scalar(key)),
                yaml_scalar(value)
            ));
        }
        sections.push(lines.join("\n"));
    }
    if let Some(summary) = get("changes_needed") {
        known += 1;
        sections.push(format!("## Changes Needed\n{}", yaml_scalar(summary)));
    }
    for (key, heading) in [
        ("files_to_modify", "Files to Modify"),
        ("files_to_create", "Files to Create"),
    ] {
        if let Some(list) = get(key).and_then(|v| v.as_sequence()) {
            known += 1;
            let items: Vec<String> = list.iter().map(|f| format!("- {}", yaml_scalar(f))).collect();
            sections.push(format!("## {}\n{}", heading, items.join("\n")));
        }
    }
    if let Some(architecture) = get("architecture") {
        known += 1;
        sections.push(format!("## Architecture\n{}", yaml_scalar(architecture)));
    }
    if let Some(reasoning) = get("reasoning") {
        known += 1;
        sections.push(format!("## Reasoning\n{}", yaml_scalar(reasoning)));
    }

    if known == 0 {
        return serde_yaml::to_string(decisions).unwrap_or_default();
    }
    sections.join("\n\n")
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
