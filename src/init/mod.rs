//! Initialization of the `.buildsmith/` directory.
//!
//! ```text
//! .buildsmith/
//! ├── spec.md            # What to build (edit before `buildsmith build`)
//! ├── rules.md           # Constraints every task must follow
//! ├── buildsmith.toml    # Provider and build settings
//! └── context/           # Raw generation responses, one per task
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{BuildsmithToml, STATE_DIR};

const SPEC_TEMPLATE: &str = "# Project: {name}

## What
[Describe what you're building in 1-2 sentences]

## Users
- [Who will use this?]

## Features
- [Feature 1]
- [Feature 2]
- [Feature 3]

## Vibe
[What should it feel like? Fast? Minimal? Fun?]
";

const RULES_TEMPLATE: &str = "# Build Rules

## Constraints
- Use free tiers only (no paid services)
- Single deployable unit (no microservices)
- No complex infrastructure (no Kubernetes, no Terraform)
- Prefer SQLite or managed free-tier databases

## Tech Preferences
- Pick boring, proven technology
- Minimize dependencies
- Prioritize simplicity over scalability
- Use environment variables for all secrets

## Code Style
- Clear over clever
- Small files, small functions
- Include basic error handling
";

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the `.buildsmith` directory
    pub state_dir: PathBuf,
    /// Whether the directory was newly created
    pub created: bool,
    /// Files written by this call (existing files are never overwritten)
    pub files_created: Vec<PathBuf>,
}

/// Create `.buildsmith/` with template inputs. Safe to run repeatedly.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let state_dir = project_dir.join(STATE_DIR);
    let created = !state_dir.exists();

    let context_dir = state_dir.join("context");
    std::fs::create_dir_all(&context_dir)
        .with_context(|| format!("Failed to create directory: {}", context_dir.display()))?;

    let name = project_name(project_dir);
    let mut files_created = Vec::new();

    let spec_file = state_dir.join("spec.md");
    if write_if_missing(&spec_file, &SPEC_TEMPLATE.replace("{name}", &name))? {
        files_created.push(spec_file);
    }
    let rules_file = state_dir.join("rules.md");
    if write_if_missing(&rules_file, RULES_TEMPLATE)? {
        files_created.push(rules_file);
    }
    let config_file = state_dir.join("buildsmith.toml");
    if !config_file.exists() {
        BuildsmithToml::default().save(&config_file)?;
        files_created.push(config_file);
    }

    Ok(InitResult {
        state_dir,
        created,
        files_created,
    })
}

fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(true)
}

fn project_name(project_dir: &Path) -> String {
    project_dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "my-project".to_string())
}

/// Check if a project has a `.buildsmith` directory.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(STATE_DIR).is_dir()
}

/// Check if `.buildsmith/spec.md` exists and has content.
pub fn has_spec(project_dir: &Path) -> bool {
    std::fs::read_to_string(project_dir.join(STATE_DIR).join("spec.md"))
        .map(|content| !content.trim().is_empty())
        .unwrap_or(false)
}
