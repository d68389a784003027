//! Advisory scan of build inputs for suspicious vocabulary.
//!
//! Hits produce warnings only; nothing here blocks a build.

use regex::Regex;
use std::sync::LazyLock;

static SUSPICIOUS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("exfiltration", r"(?i)\bexfiltrat(e|ion|ing)\b"),
        ("leak", r"(?i)\bleaks?\b"),
        ("secret", r"(?i)\bsecrets?\b"),
        ("token", r"(?i)\btokens?\b"),
        ("api key", r"(?i)\bapi[-_ ]?keys?\b"),
        ("password", r"(?i)\bpasswords?\b"),
        ("private key", r"(?i)\bprivate[-_ ]key"),
        ("ssh", r"(?i)\bssh\b"),
        ("credential", r"(?i)\bcredentials?\b"),
        ("upload", r"(?i)\buploads?\b"),
        ("post", r"(?i)\bpost\b"),
        ("transfer", r"(?i)\btransfers?\b"),
        ("send to", r"(?i)\bsend\s+to\b"),
        ("url", r"(?i)https?://"),
        ("curl", r"(?i)\bcurl\b"),
        ("wget", r"(?i)\bwget\b"),
        ("pastebin", r"(?i)pastebin"),
        ("gist", r"(?i)\bgist\b"),
        ("google drive", r"(?i)drive\.google"),
        ("dropbox", r"(?i)dropbox"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).unwrap()))
    .collect()
});

/// One suspicious marker found in an input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub source: String,
    pub marker: &'static str,
    pub excerpt: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} mentions {} ('{}'); check it was not injected",
            self.source, self.marker, self.excerpt
        )
    }
}

/// Scan `text` (named `source` in findings) for suspicious markers, one finding per marker.
pub fn scan(source: &str, text: &str) -> Vec<Finding> {
    SUSPICIOUS
        .iter()
        .filter_map(|(label, re)| {
            re.find(text).map(|m| Finding {
                source: source.to_string(),
                marker: *label,
                excerpt: m.as_str().to_string(),
            })
        })
        .collect()
}
