//! Node dispatch: the handler trait, the per-kind registry, and the
//! built-in handlers.
//!
//! Each node type is one [`NodeHandler`] implementation registered in a
//! [`HandlerRegistry`] keyed by [`NodeKind`]. Handlers are infallible at
//! the type level: every failure path is encoded as
//! [`NodeOutput::err`](crate::output::NodeOutput::err), so the scheduler
//! can assume dispatch always yields a value. Provider-backed handlers
//! (chat completion, community inference, local inference, generic HTTP)
//! live in the `flow-providers` crate and plug into the same registry.

use crate::document::{FlowNode, NodeKind};
use crate::expr;
use crate::output::NodeOutput;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a handler may look at while processing one node: the node
/// itself and its resolved text input.
///
/// For input-family nodes `input` is the seeded value; for every other
/// kind it is the combined upstream payload produced by the join rule.
pub struct NodeContext<'a> {
    /// The node being processed.
    pub node: &'a FlowNode,
    /// Seeded value or combined upstream payload.
    pub input: String,
}

impl<'a> NodeContext<'a> {
    /// Create a context for one dispatch.
    pub fn new(node: &'a FlowNode, input: String) -> Self {
        Self { node, input }
    }

    /// String value from the node's configuration map.
    pub fn str_config(&self, key: &str) -> Option<&str> {
        self.node.data.get(key).and_then(|v| v.as_str())
    }

    /// Float value from the node's configuration map. Accepts both JSON
    /// numbers and numeric strings (the authoring UI serializes sliders
    /// either way depending on version).
    pub fn f32_config(&self, key: &str) -> Option<f32> {
        let value = self.node.data.get(key)?;
        value
            .as_f64()
            .map(|n| n as f32)
            .or_else(|| value.as_str()?.parse().ok())
    }

    /// Integer value from the node's configuration map.
    pub fn usize_config(&self, key: &str) -> Option<usize> {
        let value = self.node.data.get(key)?;
        value
            .as_u64()
            .map(|n| n as usize)
            .or_else(|| value.as_str()?.parse().ok())
    }
}

/// One node type's behavior.
///
/// Implementations must never panic past their own boundary and must not
/// return early through an error channel: the contract is that `handle`
/// always resolves to a [`NodeOutput`], with failures carried in its
/// `error` field.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Process one node and produce its output.
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput;

    /// Short name used in logs.
    fn kind_name(&self) -> &'static str;
}

/// Lookup table from node kind to handler.
///
/// This replaces tag-switch dispatch: adding a node type is a matter of
/// registering a new implementation.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Empty registry. Most callers want [`HandlerRegistry::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the engine's built-in behaviors:
    /// input-family pass-through, conditional branching, and the
    /// output-family sinks. Provider kinds stay unregistered until a
    /// provider crate fills them in.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let input: Arc<dyn NodeHandler> = Arc::new(InputHandler);
        for kind in [
            NodeKind::Input,
            NodeKind::FileInput,
            NodeKind::ImageInput,
            NodeKind::WebhookInput,
        ] {
            registry.register(kind, input.clone());
        }
        registry.register(NodeKind::Conditional, Arc::new(ConditionalHandler));
        let sink: Arc<dyn NodeHandler> = Arc::new(SinkHandler);
        for kind in [
            NodeKind::TextOutput,
            NodeKind::ImageOutput,
            NodeKind::EmailOutput,
            NodeKind::NotificationOutput,
        ] {
            registry.register(kind, sink.clone());
        }
        registry
    }

    /// Register (or replace) the handler for a node kind.
    pub fn register(&mut self, kind: NodeKind, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Handler for a node kind, if one is registered.
    pub fn get(&self, kind: NodeKind) -> Option<&Arc<dyn NodeHandler>> {
        self.handlers.get(&kind)
    }

    /// Dispatch one node through its registered handler. An unregistered
    /// kind is a configuration-class failure for that node, not a run
    /// abort.
    pub async fn dispatch(&self, ctx: NodeContext<'_>) -> NodeOutput {
        match self.get(ctx.node.kind) {
            Some(handler) => {
                tracing::debug!(node = %ctx.node.id, handler = handler.kind_name(), "dispatching node");
                handler.handle(ctx).await
            }
            None => NodeOutput::err(format!(
                "no handler registered for node type {:?}",
                ctx.node.kind
            )),
        }
    }
}

/// Input-family nodes return whatever was seeded for them; no computation.
pub struct InputHandler;

#[async_trait]
impl NodeHandler for InputHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        NodeOutput::ok(ctx.input)
    }

    fn kind_name(&self) -> &'static str {
        "input"
    }
}

/// Branch node: evaluates the configured `condition` against the combined
/// upstream payload and routes downstream edges by handle.
///
/// Evaluation failures are treated as `false`, never surfaced: a broken
/// condition should steer the flow down the false branch, not kill the
/// run. A *missing* condition is a configuration error and is surfaced.
pub struct ConditionalHandler;

#[async_trait]
impl NodeHandler for ConditionalHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        let Some(condition) = ctx.str_config("condition") else {
            return NodeOutput::err("conditional node has no 'condition' configured");
        };

        let result = match expr::evaluate(condition, &ctx.input) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(node = %ctx.node.id, error = %e, "condition failed to evaluate, treating as false");
                false
            }
        };

        NodeOutput::routed(ctx.input, result)
    }

    fn kind_name(&self) -> &'static str {
        "conditional"
    }
}

/// Output-family sinks simply forward the combined upstream payload.
pub struct SinkHandler;

#[async_trait]
impl NodeHandler for SinkHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        NodeOutput::ok(ctx.input)
    }

    fn kind_name(&self) -> &'static str {
        "sink"
    }
}
