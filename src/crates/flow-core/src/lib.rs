//! # flow-core - Node-Graph Flow Execution Engine
//!
//! **Run visually-authored agent flows** - take the node/edge document an
//! editor produces, resolve it into a dependency order, and drive each node
//! through its handler until a terminal output emerges.
//!
//! ## Overview
//!
//! `flow-core` is the engine underneath a no-code flow builder. It provides:
//!
//! - **Document model** - Typed view over the editor's JSON graph format
//! - **Topological scheduling** - In-degree driven drain, no busy polling
//! - **Pre-flight validation** - Cycles and unreachable nodes rejected
//!   before anything executes
//! - **Branch pruning** - Conditional nodes route by edge handle; the
//!   untaken branch is skipped, never run
//! - **Failure isolation** - A failed node is that node's problem, not the
//!   run's
//! - **Bounded runs** - Per-node timeouts and a whole-run deadline
//!
//! ## Core Concepts
//!
//! ### 1. FlowDocument - The Graph
//!
//! [`FlowDocument`] is the parsed editor document: nodes with a
//! [`NodeKind`] and a free-form configuration map, plus directed edges.
//! The engine treats it as read-only; one document serves any number of
//! concurrent runs.
//!
//! ### 2. Handlers - Node Behavior
//!
//! Every node kind maps to a [`NodeHandler`] in a [`HandlerRegistry`].
//! [`HandlerRegistry::with_builtins`] covers the input family, the
//! conditional, and the output sinks; provider-backed kinds (chat
//! completion, hosted inference, local inference, generic HTTP) are
//! registered by the `flow-providers` crate.
//!
//! ### 3. FlowRunner - One Run
//!
//! [`FlowRunner::run`] seeds the input nodes, drains the graph in
//! dependency order, and returns a [`RunResult`] carrying either the
//! terminal node's payload or a single run-level error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flow_core::{FlowDocument, FlowRunner, HandlerRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flow_core::FlowError> {
//!     let doc = FlowDocument::from_json(r#"{
//!         "nodes": [
//!             {"id": "in",  "type": "input",       "data": {"label": "Question"}},
//!             {"id": "out", "type": "text-output", "data": {}}
//!         ],
//!         "edges": [
//!             {"id": "e1", "source": "in", "target": "out"}
//!         ]
//!     }"#)?;
//!
//!     let runner = FlowRunner::new(HandlerRegistry::with_builtins());
//!     let result = runner.run(&doc, "Tell me about dogs").await;
//!     println!("{:?}", result.payload);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`document`] - [`FlowDocument`], [`FlowNode`], [`FlowEdge`], kind
//!   taxonomy, structural validation
//! - [`processor`] - [`NodeHandler`] trait, [`HandlerRegistry`], built-in
//!   handlers
//! - [`scheduler`] - [`FlowRunner`] and the drain loop
//! - [`output`] - [`NodeOutput`], [`RunResult`], the upstream join rule
//! - [`expr`] - The sandboxed condition language for branch nodes
//! - [`error`] - [`FlowError`], the run-level error taxonomy
//!
//! ## See Also
//!
//! - `flow-providers` - Provider adapters (chat completion, hosted
//!   community models, local inference, generic HTTP) and the fully-wired
//!   default registry

pub mod document;
pub mod error;
pub mod expr;
pub mod output;
pub mod processor;
pub mod scheduler;

pub use document::{FlowDocument, FlowEdge, FlowNode, NodeKind, Viewport};
pub use error::{FlowError, Result};
pub use expr::{evaluate, ExprError};
pub use output::{join_upstream, NodeOutput, RunResult};
pub use processor::{
    ConditionalHandler, HandlerRegistry, InputHandler, NodeContext, NodeHandler, SinkHandler,
};
pub use scheduler::{FlowRunner, RunOptions};
