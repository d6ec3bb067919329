//! Runtime result types and the upstream join rule.
//!
//! A [`NodeOutput`] is the per-node result held in the scheduler's output
//! map for the lifetime of one run; a [`RunResult`] is the single terminal
//! value handed back to the caller. Neither is persisted.

use serde::{Deserialize, Serialize};

/// Result of processing one node.
///
/// Exactly one of `payload`/`error` is meaningful. A node that errored
/// still counts as completed for scheduling: downstream nodes simply
/// receive no contribution from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Plain-text result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Human-readable failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Routing discriminator written by branch nodes ("true"/"false").
    /// Runtime-only: the scheduler reads it to decide which handled edges
    /// to follow; it never leaves the engine.
    #[serde(skip)]
    pub branch: Option<String>,
}

impl NodeOutput {
    /// Successful output with a payload.
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
            error: None,
            branch: None,
        }
    }

    /// Failed output with a reason. The node still counts as completed.
    pub fn err(reason: impl Into<String>) -> Self {
        Self {
            payload: None,
            error: Some(reason.into()),
            branch: None,
        }
    }

    /// Successful output that also selects an outgoing branch handle.
    pub fn routed(payload: impl Into<String>, branch: bool) -> Self {
        Self {
            payload: Some(payload.into()),
            error: None,
            branch: Some(if branch { "true" } else { "false" }.to_string()),
        }
    }

    /// The payload if this output succeeded with non-empty text.
    pub fn text(&self) -> Option<&str> {
        self.payload.as_deref().filter(|s| !s.is_empty())
    }
}

/// Terminal result of one flow run, returned synchronously to the caller.
///
/// The caller always receives exactly one of `payload`/`error`: either
/// the terminal node's result or a single human-readable run-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub payload: Option<String>,
    pub error: Option<String>,
}

impl RunResult {
    /// Fold the terminal node's output into the caller-facing result.
    pub fn from_output(output: NodeOutput) -> Self {
        Self {
            payload: output.payload,
            error: output.error,
        }
    }

    /// Fold a run-level error into the caller-facing result.
    pub fn from_error(error: crate::error::FlowError) -> Self {
        Self {
            payload: None,
            error: Some(error.to_string()),
        }
    }
}

/// Join upstream contributions into one prompt-ready text block.
///
/// A single contribution passes through verbatim. Several contributions
/// become `"<label>: <payload>"` lines joined by blank lines, in the order
/// the edges appear in the document. Document order, not a semantic
/// priority. Errored or empty upstream nodes contribute nothing.
pub fn join_upstream(parts: &[(&str, &str)]) -> String {
    match parts {
        [] => String::new(),
        [(_, only)] => (*only).to_string(),
        many => many
            .iter()
            .map(|(label, payload)| format!("{}: {}", label, payload))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}
