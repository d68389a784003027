//! Configuration for buildsmith.
//!
//! Settings are read from `.buildsmith/buildsmith.toml`, then layered with
//! environment variables and finally CLI overrides:
//!
//! ```toml
//! [provider]
//! name = "anthropic"
//! model = "claude-sonnet-4-20250514"
//! max_tokens = 8192
//! max_retries = 3
//!
//! [build]
//! review = true
//! plan_context_tokens = 2000
//! task_context_tokens = 3000
//! ```
//!
//! The resolved [`Config`] is handed to each component constructor; nothing
//! in the library reads configuration from process-wide state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project bookkeeping directory.
pub const STATE_DIR: &str = ".buildsmith";

/// Provider names with a dedicated or preconfigured backend.
pub const KNOWN_PROVIDERS: &[&str] = &["anthropic", "openai", "together", "groq", "ollama"];

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Backend name (anthropic, openai, together, groq, ollama, or any OpenAI-compatible name)
    #[serde(default = "default_provider")]
    pub name: String,
    /// Model identifier; empty means the provider default
    #[serde(default)]
    pub model: String,
    /// Optional API base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key (defaults per provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Maximum tokens requested per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Attempts made for transient backend failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider(),
            model: String::new(),
            base_url: None,
            api_key_env: None,
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
        }
    }
}

impl ProviderSettings {
    /// Model to request, falling back to a sensible default for the provider.
    pub fn effective_model(&self) -> String {
        if !self.model.trim().is_empty() {
            return self.model.clone();
        }
        match self.name.to_lowercase().as_str() {
            "anthropic" => "claude-sonnet-4-20250514",
            "openai" => "gpt-4o",
            "together" => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
            "groq" => "llama-3.3-70b-versatile",
            "ollama" => "llama3.1",
            _ => "default",
        }
        .to_string()
    }

    /// Environment variable consulted for the API key.
    pub fn api_key_var(&self) -> Option<String> {
        if let Some(ref var) = self.api_key_env {
            return Some(var.clone());
        }
        match self.name.to_lowercase().as_str() {
            "anthropic" => Some("ANTHROPIC_API_KEY".to_string()),
            "ollama" => None,
            "openai" => Some("OPENAI_API_KEY".to_string()),
            other => Some(format!("{}_API_KEY", other.to_uppercase().replace('-', "_"))),
        }
    }

    /// Resolve the API key through `lookup` (normally `std::env::var`).
    pub fn api_key(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key_var()
            .and_then(|var| lookup(&var))
            .filter(|key| !key.trim().is_empty())
    }
}

/// Build pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Run the review phase after building
    #[serde(default = "default_review")]
    pub review: bool,
    /// Token budget for the project snapshot given to the planner
    #[serde(default = "default_plan_context_tokens")]
    pub plan_context_tokens: usize,
    /// Token budget for the project snapshot given to each generation call
    #[serde(default = "default_task_context_tokens")]
    pub task_context_tokens: usize,
}

fn default_review() -> bool {
    true
}

fn default_plan_context_tokens() -> usize {
    2000
}

fn default_task_context_tokens() -> usize {
    3000
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            review: default_review(),
            plan_context_tokens: default_plan_context_tokens(),
            task_context_tokens: default_task_context_tokens(),
        }
    }
}

/// The complete buildsmith.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildsmithToml {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub build: BuildSettings,
}

impl BuildsmithToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse buildsmith.toml")
    }

    /// Load `buildsmith.toml` from the state directory, or defaults when absent.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join("buildsmith.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize buildsmith.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Apply environment overrides. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("BUILDSMITH_PROVIDER").filter(|v| !v.is_empty()) {
            self.provider.name = name;
        }
        if let Some(model) = lookup("BUILDSMITH_MODEL").filter(|v| !v.is_empty()) {
            self.provider.model = model;
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let name = self.provider.name.to_lowercase();
        if !KNOWN_PROVIDERS.contains(&name.as_str()) && self.provider.base_url.is_none() {
            warnings.push(format!(
                "Provider '{}' is not built in; set provider.base_url for an OpenAI-compatible endpoint",
                self.provider.name
            ));
        }
        if self.provider.max_retries == 0 {
            warnings.push("provider.max_retries is 0; treated as 1 attempt".to_string());
        }
        if self.build.plan_context_tokens == 0 {
            warnings.push("build.plan_context_tokens is 0; the planner sees no project files".to_string());
        }
        if self.build.task_context_tokens == 0 {
            warnings.push("build.task_context_tokens is 0; generation sees no project files".to_string());
        }

        warnings
    }
}

/// Runtime configuration: resolved paths plus the layered settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub spec_file: PathBuf,
    pub rules_file: PathBuf,
    pub state_file: PathBuf,
    pub config_file: PathBuf,
    pub policy_file: PathBuf,
    pub audit_log: PathBuf,
    pub decisions_file: PathBuf,
    pub review_file: PathBuf,
    pub context_dir: PathBuf,
    pub verbose: bool,
    pub settings: BuildsmithToml,
}

impl Config {
    /// Resolve paths under `project_dir` and load layered settings
    /// (buildsmith.toml, then the process environment).
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let state_dir = project_dir.join(STATE_DIR);
        let mut settings = BuildsmithToml::load_or_default(&state_dir)?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(Self::with_settings(project_dir, settings, verbose))
    }

    /// Build a config from explicit settings without touching the environment.
    pub fn with_settings(project_dir: PathBuf, settings: BuildsmithToml, verbose: bool) -> Self {
        let state_dir = project_dir.join(STATE_DIR);
        Self {
            spec_file: state_dir.join("spec.md"),
            rules_file: state_dir.join("rules.md"),
            state_file: state_dir.join("build-state.yaml"),
            config_file: state_dir.join("buildsmith.toml"),
            policy_file: state_dir.join("firewall_policy.json"),
            audit_log: state_dir.join("firewall_audit.log"),
            decisions_file: state_dir.join("decisions.md"),
            review_file: state_dir.join("review.yaml"),
            context_dir: state_dir.join("context"),
            project_dir,
            state_dir,
            verbose,
            settings,
        }
    }

    /// Apply CLI overrides on top of file and environment settings.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        no_review: bool,
    ) -> Self {
        if let Some(name) = provider {
            self.settings.provider.name = name;
        }
        if let Some(model) = model {
            self.settings.provider.model = model;
        }
        if no_review {
            self.settings.build.review = false;
        }
        self
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).with_context(|| {
            format!("Failed to create state directory: {}", self.state_dir.display())
        })?;
        std::fs::create_dir_all(&self.context_dir).with_context(|| {
            format!(
                "Failed to create context directory: {}",
                self.context_dir.display()
            )
        })?;
        Ok(())
    }
}
