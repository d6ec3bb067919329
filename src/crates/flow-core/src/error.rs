//! Error types for flow execution.
//!
//! Node-level failures are *not* errors at this layer: a provider call that
//! fails becomes the node's [`NodeOutput::err`](crate::output::NodeOutput)
//! and the run continues. `FlowError` covers only run-level conditions that
//! make the whole run unproducible (malformed or un-runnable graph, global
//! deadline).

use thiserror::Error;

/// Convenience result type using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;

/// Run-level errors that abort a flow run entirely.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The document contains no input-family nodes, so there is nothing to
    /// seed the run with.
    #[error("flow has no input nodes")]
    NoInputNodes,

    /// One or more nodes can structurally never become ready: they sit on a
    /// cycle, or no path connects them to an input node. Detected before any
    /// node is executed.
    #[error("flow contains nodes that can never run (cycle or disconnected from input): {}", nodes.join(", "))]
    Unrunnable {
        /// Ids of the offending nodes, in document order.
        nodes: Vec<String>,
    },

    /// The drain finished but no output-family node completed.
    #[error("flow produced no terminal output")]
    NoOutputProduced,

    /// The whole run exceeded its wall-clock deadline.
    #[error("flow run exceeded deadline of {deadline_ms}ms")]
    DeadlineExceeded {
        /// Configured deadline in milliseconds.
        deadline_ms: u64,
    },

    /// The graph document could not be parsed.
    #[error("invalid flow document: {0}")]
    Document(#[from] serde_json::Error),
}
