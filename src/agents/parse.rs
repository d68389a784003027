//! Structured-response recovery.
//!
//! Backends do not always return bare YAML. Each strategy below proposes one
//! candidate document; the first candidate that deserializes into the target
//! type wins. When every strategy fails the caller gets
//! [`BuildError::InvalidResponse`], never a default value.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

use super::{Plan, ReviewVerdict};
use crate::errors::BuildError;
use crate::util::{extract_json_object, strip_outer_fence};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:ya?ml|json)?[ \t]*\n(.*?)```").unwrap());

type Strategy = fn(&str) -> Option<&str>;

/// Recovery strategies in the order they are attempted.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("whole response", whole_response),
    ("outer fence stripped", strip_outer_fence),
    ("first fenced block", first_fenced_block),
    ("first JSON object", extract_json_object),
];

fn whole_response(text: &str) -> Option<&str> {
    Some(text)
}

fn first_fenced_block(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Run every strategy in order and return the first candidate that parses.
pub fn recover<T: DeserializeOwned>(response: &str, what: &'static str) -> Result<T, BuildError> {
    for (name, strategy) in STRATEGIES {
        let Some(candidate) = strategy(response) else {
            continue;
        };
        if candidate.trim().is_empty() {
            continue;
        }
        match serde_yaml::from_str::<T>(candidate) {
            Ok(value) => {
                tracing::debug!(what, strategy = name, "recovered structured response");
                return Ok(value);
            }
            Err(err) => {
                tracing::debug!(what, strategy = name, error = %err, "recovery strategy failed");
            }
        }
    }

    Err(BuildError::InvalidResponse {
        what,
        attempts: STRATEGIES.len(),
    })
}

pub fn parse_plan(response: &str) -> Result<Plan, BuildError> {
    recover(response, "plan")
}

pub fn parse_review(response: &str) -> Result<ReviewVerdict, BuildError> {
    recover(response, "review verdict")
}
