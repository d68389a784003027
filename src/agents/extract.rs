//! Recover candidate files from free-form generation output.
//!
//! Three dialects are tried in a fixed order; the first one that yields at
//! least one block wins and later dialects are not consulted:
//!
//! 1. path-marked fences: ```` ```file:src/app.py ````
//! 2. fences whose info string is itself a path: ```` ```src/app.py ```` (must contain `/`)
//! 3. plain text: a `--- src/app.py ---` line, content up to `--- end ---`,
//!    the next header, or the end of the text

use regex::Regex;
use std::sync::LazyLock;

static FILE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```file:([^\n`]+)\n(.*?)```").unwrap());

static PATH_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([A-Za-z0-9_\-./]+\.[A-Za-z0-9]+)\n(.*?)```").unwrap());

static PLAIN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---\s+(\S.*\.\w+)\s+---\s*$").unwrap());

static PLAIN_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^---\s+end\s+---\s*$").unwrap());

/// A (path, content) pair proposed by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlock {
    pub path: String,
    pub content: String,
}

impl FileBlock {
    fn new(raw_path: &str, raw_content: &str) -> Self {
        Self {
            path: raw_path.trim().trim_start_matches('/').to_string(),
            content: normalize_content(raw_content),
        }
    }
}

/// Trailing whitespace removed, then exactly one newline appended.
fn normalize_content(raw: &str) -> String {
    let mut content = raw.trim_end().to_string();
    content.push('\n');
    content
}

pub fn extract_files(response: &str) -> Vec<FileBlock> {
    let marked = fenced_blocks(&FILE_FENCE, response, |_| true);
    if !marked.is_empty() {
        return marked;
    }

    let path_fenced = fenced_blocks(&PATH_FENCE, response, |path| path.contains('/'));
    if !path_fenced.is_empty() {
        return path_fenced;
    }

    plain_blocks(response)
}

fn fenced_blocks(re: &Regex, text: &str, accept: impl Fn(&str) -> bool) -> Vec<FileBlock> {
    re.captures_iter(text)
        .filter(|caps| accept(caps[1].trim()))
        .map(|caps| FileBlock::new(&caps[1], &caps[2]))
        .filter(|block| !block.path.is_empty())
        .collect()
}

fn plain_blocks(text: &str) -> Vec<FileBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if PLAIN_END.is_match(line) {
            if let Some((path, body)) = current.take() {
                blocks.push(FileBlock::new(&path, &body.join("\n")));
            }
            continue;
        }
        if let Some(caps) = PLAIN_HEADER.captures(line) {
            if let Some((path, body)) = current.take() {
                blocks.push(FileBlock::new(&path, &body.join("\n")));
            }
            current = Some((caps[1].to_string(), Vec::new()));
            continue;
        }
        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((path, body)) = current {
        blocks.push(FileBlock::new(&path, &body.join("\n")));
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_marked_fences() {
        let response = "Here you go:\n\n```file:src/app.py\nimport os\n\nprint('hi')\n\n\n```\n\n```file:/requirements.txt\nflask\n```\n";
        let blocks = extract_files(response);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].path, "src/app.py");
        assert_eq!(blocks[0].content, "import os\n\nprint('hi')\n");
        assert_eq!(blocks[1].path, "requirements.txt");
        assert_eq!(blocks[1].content, "flask\n");
    }

    #[test]
    fn test_marked_dialect_shadows_path_fences() {
        let response = "```file:src/a.py\na = 1\n```\n```src/b.py\nb = 2\n```\n";
        let blocks = extract_files(response);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].path, "src/a.py");
    }

    #[test]
    fn test_path_fences_require_separator() {
        let response = "```main.py\nx = 1\n```\n```src/util/helpers.py\ndef f():\n    return 1\n```";
        let blocks = extract_files(response);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].path, "src/util/helpers.py");
        assert_eq!(blocks[0].content, "def f():\n    return 1\n");
    }

    #[test]
    fn test_language_fences_are_not_files() {
        let response = "```python\nprint('x')\n```";
        assert!(extract_files(response).is_empty());
    }

    #[test]
    fn test_plain_text_dialect() {
        let response = "\
--- src/models.py ---
class User:
    pass
--- end ---
Some commentary.
--- src/routes.py ---
def index():
    return 'ok'


--- README.md ---
# App";
        let blocks = extract_files(response);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].path, "src/models.py");
        assert_eq!(blocks[0].content, "class User:\n    pass\n");
        assert_eq!(blocks[1].path, "src/routes.py");
        assert_eq!(blocks[1].content, "def index():\n    return 'ok'\n");
        assert_eq!(blocks[2].path, "README.md");
        assert_eq!(blocks[2].content, "# App\n");
    }

    #[test]
    fn test_leading_indentation_preserved() {
        let response = "```file:src/x.py\n    indented = True\n```";
        assert_eq!(extract_files(response)[0].content, "    indented = True\n");
    }

    #[test]
    fn test_no_blocks() {
        assert!(extract_files("I could not complete this task.").is_empty());
    }
}
