//! Pulls the plan body out of generator output.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const OPEN_TAG: &str = "<execute_plan>";
pub const CLOSE_TAG: &str = "</execute_plan>";

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<execute_plan>(.*?)</execute_plan>").expect("static regex is valid")
    })
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("generator output is empty")]
    EmptyInput,

    #[error("generator output contains {0} plan blocks, expected one")]
    MultipleBlocks(usize),
}

/// What to do when the output holds more than one plan block.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiBlockPolicy {
    /// Use the first block and log the rest as discarded.
    #[default]
    First,
    Reject,
}

impl core::str::FromStr for MultiBlockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown multi-block policy: {other}")),
        }
    }
}

/// Extract with [`MultiBlockPolicy::First`].
pub fn extract(raw: &str) -> Result<String, ExtractError> {
    extract_with(raw, MultiBlockPolicy::First)
}

/// Trimmed interior of the first `<execute_plan>` block, or the whole text
/// trimmed when there is no block.
pub fn extract_with(raw: &str, policy: MultiBlockPolicy) -> Result<String, ExtractError> {
    if raw.trim().is_empty() {
        return Err(ExtractError::EmptyInput);
    }

    let mut blocks = block_regex().captures_iter(raw);
    let Some(first) = blocks.next() else {
        return Ok(raw.trim().to_string());
    };
    let body = first.get(1).map_or("", |m| m.as_str()).trim().to_string();

    let extra = blocks.count();
    if extra > 0 {
        match policy {
            MultiBlockPolicy::First => {
                warn!(discarded = extra, "multiple plan blocks; using the first");
            }
            MultiBlockPolicy::Reject => return Err(ExtractError::MultipleBlocks(extra + 1)),
        }
    }
    Ok(body)
}
