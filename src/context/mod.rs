//! Bounded project snapshots for generation prompts.
//!
//! [`ContextAssembler::snapshot`] walks the project tree and renders as many
//! files as fit in a character budget derived from a token budget. Manifests
//! (dependency lists, framework config) go first, then everything else from
//! smallest to largest, so one big file cannot crowd out the rest.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::util::truncate_at_char_boundary;

/// Fixed characters-per-token ratio used to turn token budgets into character budgets.
pub const CHARS_PER_TOKEN: usize = 4;

/// Returned when the tree has no eligible files.
pub const EMPTY_PROJECT: &str = "(No project files yet)";

const SKIP_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    "node_modules",
    "dist",
    "build",
    "target",
    ".next",
    ".cache",
];

const SKIP_EXTENSIONS: &[&str] = &[
    "pyc", "pyo", "so", "dylib", "dll", "exe", "png", "jpg", "jpeg", "gif", "ico", "svg", "woff",
    "woff2", "ttf", "eot", "zip", "tar", "gz", "bz2", "db", "sqlite", "sqlite3", "lock", "pem",
    "key", "crt", "cer", "p12", "pfx", "jks", "keystore",
];

/// Name fragments that mark a file as a likely secret.
const SENSITIVE_MARKERS: &[&str] = &[
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    "credential",
    "secret",
    "token",
    "apikey",
    "api_key",
    "password",
    "passwd",
    "private",
];

const MANIFEST_NAMES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "Cargo.toml",
    "go.mod",
    "manifest.json",
    "Dockerfile",
    "docker-compose.yml",
    "README.md",
];

/// A file eligible for inclusion in a snapshot.
#[derive(Debug, Clone)]
struct Candidate {
    rel_path: String,
    content: String,
    is_manifest: bool,
}

pub struct ContextAssembler {
    root: PathBuf,
}

impl ContextAssembler {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Render a snapshot no longer than `max_tokens * CHARS_PER_TOKEN` bytes.
    ///
    /// For each file in priority order: emit it whole if it fits, otherwise a
    /// truncated prefix annotated with the original size, otherwise (budget
    /// exhausted) a one-line name and size marker. Markers and annotations
    /// count against the budget like everything else.
    pub fn snapshot(&self, max_tokens: usize) -> Result<String> {
        let budget = max_tokens.saturating_mul(CHARS_PER_TOKEN);
        let mut candidates = self.gather()?;

        if candidates.is_empty() {
            return Ok(if EMPTY_PROJECT.len() <= budget {
                EMPTY_PROJECT.to_string()
            } else {
                String::new()
            });
        }

        candidates.sort_by(|a, b| {
            (!a.is_manifest, a.content.len(), &a.rel_path).cmp(&(
                !b.is_manifest,
                b.content.len(),
                &b.rel_path,
            ))
        });

        let mut out = String::with_capacity(budget.min(64 * 1024));
        for candidate in &candidates {
            let remaining = budget - out.len();
            render_file(candidate, remaining, &mut out);
        }

        debug_assert!(out.len() <= budget);
        Ok(out)
    }

    fn gather(&self) -> Result<Vec<Candidate>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_name(entry.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !is_eligible_file(path) {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            let name = entry.file_name().to_string_lossy();
            files.push(Candidate {
                rel_path: rel.to_string_lossy().replace('\\', "/"),
                content: String::from_utf8_lossy(&bytes).into_owned(),
                is_manifest: MANIFEST_NAMES.contains(&name.as_ref()),
            });
        }

        Ok(files)
    }
}

/// Directories and dotfiles pruned from the walk.
fn is_skipped_name(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) || name.ends_with(".egg-info")
}

fn is_eligible_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if SKIP_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker))
}

fn render_file(candidate: &Candidate, remaining: usize, out: &mut String) {
    let header = format!("### {}\n```\n", candidate.rel_path);
    let footer = "\n```\n\n";
    let overhead = header.len() + footer.len();
    let size = candidate.content.len();

    if overhead + size <= remaining {
        out.push_str(&header);
        out.push_str(&candidate.content);
        out.push_str(footer);
        return;
    }

    let annotation = format!("\n... (truncated, {} chars total)", size);
    let room = remaining.saturating_sub(overhead + annotation.len());
    let prefix = truncate_at_char_boundary(&candidate.content, room);
    if !prefix.is_empty() {
        out.push_str(&header);
        out.push_str(prefix);
        out.push_str(&annotation);
        out.push_str(footer);
        return;
    }

    let marker = format!("### {} ({} chars, skipped)\n", candidate.rel_path, size);
    if marker.len() <= remaining {
        out.push_str(&marker);
    }
}
