//! Small text helpers shared by the response parsers and the orchestrator.

/// Extract the first balanced JSON object from text that may contain other content.
///
/// Braces inside JSON string literals are ignored, so `{"a": "}"}` is returned whole.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Remove a single markdown fence wrapping the whole text, if present.
///
/// A response of the form "```yaml\n...\n```" yields the inner lines. An opening
/// fence without a closing one drops just the first line.
pub fn strip_outer_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    let body_start = trimmed.find('\n')? + 1;
    let body = &trimmed[body_start..];
    match body.trim_end().strip_suffix("```") {
        Some(inner) => Some(inner),
        None => Some(body),
    }
}

/// Turn a free-form name into a short filesystem-safe stem.
pub fn sanitize_file_stem(name: &str, max_len: usize) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect()
}

/// Truncate `text` to at most `max_bytes` bytes without splitting a character.
pub fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
