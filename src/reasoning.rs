//! Model reasoning traces.
//!
//! Thoughts arrive either in the provider payload (`extra_content.google.thought`)
//! or inline as `<thought>…</thought>` blocks in the reply text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static THOUGHT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<thought>(.*?)</thought>").expect("thought pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReply {
    pub thoughts: Vec<String>,
    /// Reply text with every thought block removed.
    pub visible: String,
}

#[must_use]
pub fn split_inline_thoughts(content: &str) -> SplitReply {
    let thoughts = THOUGHT_BLOCK
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|body| body.as_str().trim().to_string())
        .collect();
    SplitReply {
        thoughts,
        visible: THOUGHT_BLOCK.replace_all(content, "").into_owned(),
    }
}

#[must_use]
pub fn payload_thought(extra_content: Option<&Value>) -> Option<&str> {
    extra_content?
        .get("google")?
        .get("thought")?
        .as_str()
        .filter(|thought| !thought.is_empty())
}
