//! Append-only firewall audit log, one JSON record per line.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Permitted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub target: String,
    pub action: AuditAction,
    #[serde(default)]
    pub detail: String,
}

impl AuditRecord {
    pub fn new(target: &str, action: AuditAction, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            target: target.to_string(),
            action,
            detail: detail.into(),
        }
    }
}

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; the file is opened per write so nothing is buffered
    /// across decisions.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize audit record")?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create audit log directory")?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?
            .write_all(line.as_bytes())
            .context("Failed to write audit record")?;
        Ok(())
    }

    /// Read every record; lines that fail to parse are skipped.
    pub fn records(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).context("Failed to read audit log")?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
