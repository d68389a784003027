//! Agentic firewall: default-deny policy enforcement over candidate file writes.
//!
//! Evaluation order, first match wins:
//!
//! 1. path matches a blocked-path pattern → `BLOCKED_PATH` (even if also allow-listed)
//! 2. path matches no allowed-path pattern → `PATH_NOT_IN_ALLOWLIST`
//! 3. content matches a blocked-content pattern → `MALICIOUS_CONTENT_PATTERN`
//! 4. otherwise permitted
//!
//! Every decision is appended to the audit log. The firewall holds no state
//! besides the compiled policy and the log handle, so one instance can vet
//! any number of candidates independently.

pub mod audit;
pub mod policy;

pub use audit::{AuditAction, AuditLog, AuditRecord};
pub use policy::{CompiledPolicy, FirewallPolicy};

use anyhow::Result;
use console::style;
use std::path::Path;

/// Why a candidate was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BlockedPath,
    PathNotInAllowlist,
    MaliciousContentPattern,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::BlockedPath => "BLOCKED_PATH",
            DenyReason::PathNotInAllowlist => "PATH_NOT_IN_ALLOWLIST",
            DenyReason::MaliciousContentPattern => "MALICIOUS_CONTENT_PATTERN",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of vetting one candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Permitted,
    Denied { reason: DenyReason, message: String },
}

impl Verdict {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Verdict::Permitted)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Verdict::Permitted => None,
            Verdict::Denied { reason, .. } => Some(*reason),
        }
    }
}

pub struct Firewall {
    policy: CompiledPolicy,
    audit: AuditLog,
}

impl Firewall {
    pub fn new(policy: &FirewallPolicy, audit: AuditLog) -> Result<Self> {
        Ok(Self {
            policy: policy.compile()?,
            audit,
        })
    }

    /// Build a firewall from the optional policy document, falling back to the
    /// built-in default policy.
    pub fn load(policy_file: &Path, audit: AuditLog) -> Result<Self> {
        let policy = FirewallPolicy::load_or_default(policy_file)?;
        Self::new(&policy, audit)
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Vet a candidate write. Errors only when the audit record cannot be written.
    pub fn validate(&self, path: &str, content: &str) -> Result<Verdict> {
        let verdict = self.evaluate(path, content);
        match &verdict {
            Verdict::Permitted => {
                tracing::debug!(path, "firewall permitted write");
                self.audit
                    .append(&AuditRecord::new(path, AuditAction::Permitted, ""))?;
            }
            Verdict::Denied { reason, message } => {
                eprintln!(
                    "{} {} on {}",
                    style("SECURITY VIOLATION:").red().bold(),
                    reason,
                    path
                );
                tracing::info!(path, reason = %reason, "firewall denied write");
                self.audit
                    .append(&AuditRecord::new(path, AuditAction::Denied, message.clone()))?;
            }
        }
        Ok(verdict)
    }

    fn evaluate(&self, path: &str, content: &str) -> Verdict {
        if let Some(pattern) = self.policy.blocked_path(path) {
            return Verdict::Denied {
                reason: DenyReason::BlockedPath,
                message: format!("{}: {}", DenyReason::BlockedPath, pattern.as_str()),
            };
        }
        if !self.policy.is_allowed_path(path) {
            return Verdict::Denied {
                reason: DenyReason::PathNotInAllowlist,
                message: DenyReason::PathNotInAllowlist.to_string(),
            };
        }
        if let Some(pattern) = self.policy.blocked_content(content) {
            return Verdict::Denied {
                reason: DenyReason::MaliciousContentPattern,
                message: format!(
                    "{}: {}",
                    DenyReason::MaliciousContentPattern,
                    pattern.as_str()
                ),
            };
        }
        Verdict::Permitted
    }
}
