//! File access confined to the project root.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::errors::BuildError;

/// Normalize a collaborator-supplied relative path (`./src/a.py`, `/src/a.py` → `src/a.py`).
pub fn normalize_rel_path(path: &str) -> String {
    let mut rel = path.trim();
    loop {
        if let Some(rest) = rel.strip_prefix("./") {
            rel = rest;
        } else if let Some(rest) = rel.strip_prefix('/') {
            rel = rest;
        } else {
            break;
        }
    }
    rel.replace('\\', "/")
}

/// Resolve `rel` under `root`, refusing anything that could land outside it.
pub fn resolve_within(root: &Path, rel: &str) -> Result<PathBuf, BuildError> {
    let unsafe_path = || BuildError::UnsafePath {
        path: rel.to_string(),
    };
    let candidate = Path::new(rel);
    if rel.trim().is_empty() || candidate.is_absolute() {
        return Err(unsafe_path());
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }
    Ok(root.join(candidate))
}

/// Write `content` to `rel` under `root`, creating parent directories.
pub fn write_project_file(root: &Path, rel: &str, content: &str) -> Result<PathBuf> {
    let full = resolve_within(root, rel)?;
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory for {}", rel))?;
    }
    fs::write(&full, content).with_context(|| format!("Failed to write {}", rel))?;
    Ok(full)
}

/// Read an input document; a missing file reads as empty.
pub fn read_optional(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
