//! Firewall policy document and its compiled form.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::BuildError;

/// Project directories generated code may write into.
const DEFAULT_ALLOWED_PATHS: &[&str] = &[
    r"^src/",
    r"^app/",
    r"^apps/",
    r"^packages/",
    r"^services/",
    r"^lib/",
    r"^libs/",
    r"^components/",
    r"^tests?/",
    r"^docs/",
    r"^public/",
    r"^static/",
    r"^assets/",
    r"^templates/",
    r"^scripts/",
    r"^config/",
    r"^infra/",
    r"^ops/",
    r"^docker/",
    r"^\.github/",
    r"^README\.md$",
    r"^LICENSE",
    r"^pyproject\.toml$",
    r"^requirements\.txt$",
    r"^package\.json$",
    r"^package-lock\.json$",
    r"^pnpm-lock\.yaml$",
    r"^yarn\.lock$",
    r"^Cargo\.toml$",
    r"^go\.(mod|sum)$",
    r"^Makefile$",
    r"^Dockerfile$",
    r"^docker-compose\.ya?ml$",
];

/// Credential and system locations that are never writable.
const DEFAULT_BLOCKED_PATHS: &[&str] = &[
    r"(^|/)\.env(\.|$)",
    r"(^|/)\.ssh/",
    r"(^|/)\.aws/",
    r"(^|/)\.gnupg/",
    r"(^|/)\.kube/",
    r"(^|/)\.git/",
    r"(^|/)\.npmrc$",
    r"(^|/)\.pypirc$",
    r"^config/secrets\.json$",
    r"^config/credentials\.json$",
    r"(^|/)\.bash_history$",
    r"(^|/)\.\.(/|$)",
    r"^/etc/",
    r"^/var/",
    r"^/private/",
    r"^/System/",
];

/// Dynamic-execution constructs rejected in generated content.
const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    r"eval\(",
    r"exec\(",
    r"os\.system\(",
    r"subprocess\.run\(",
    r"__import__",
    r"getattr\(",
    r"setattr\(",
    r"importlib\.",
];

/// Firewall policy as stored in `firewall_policy.json`.
///
/// Every entry is a regular expression matched by unanchored search; use
/// `^`/`$` inside a pattern to anchor it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallPolicy {
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default)]
    pub blocked_paths: Vec<String>,
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
}

impl Default for FirewallPolicy {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|p| p.to_string()).collect();
        Self {
            allowed_paths: owned(DEFAULT_ALLOWED_PATHS),
            blocked_paths: owned(DEFAULT_BLOCKED_PATHS),
            blocked_patterns: owned(DEFAULT_BLOCKED_PATTERNS),
        }
    }
}

impl FirewallPolicy {
    /// Load the policy document at `path`, or the built-in default when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read firewall policy: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse firewall policy: {}", path.display()))
    }

    pub fn compile(&self) -> Result<CompiledPolicy, BuildError> {
        Ok(CompiledPolicy {
            allowed_paths: compile_all(&self.allowed_paths)?,
            blocked_paths: compile_all(&self.blocked_paths)?,
            blocked_patterns: compile_all(&self.blocked_patterns)?,
        })
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, BuildError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| BuildError::InvalidPolicy {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Policy with every pattern compiled; immutable for the life of a firewall.
#[derive(Debug)]
pub struct CompiledPolicy {
    allowed_paths: Vec<Regex>,
    blocked_paths: Vec<Regex>,
    blocked_patterns: Vec<Regex>,
}

impl CompiledPolicy {
    pub fn blocked_path(&self, path: &str) -> Option<&Regex> {
        self.blocked_paths.iter().find(|re| re.is_match(path))
    }

    pub fn is_allowed_path(&self, path: &str) -> bool {
        self.allowed_paths.iter().any(|re| re.is_match(path))
    }

    pub fn blocked_content(&self, content: &str) -> Option<&Regex> {
        self.blocked_patterns.iter().find(|re| re.is_match(content))
    }
}
