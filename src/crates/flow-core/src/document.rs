//! The graph document: the static node/edge model a run executes.
//!
//! A [`FlowDocument`] is produced by the authoring UI and handed to the
//! engine as-is. It is read-only for the duration of one run. The document
//! is deliberately tolerant: edges whose endpoints do not name existing
//! nodes are ignored rather than rejected, because the authoring UI can
//! leave dangling edges behind while a flow is being edited.
//!
//! # Structure
//!
//! ```text
//! FlowDocument
//! ├── nodes: [ FlowNode { id, type, data } ]
//! ├── edges: [ FlowEdge { id, source, target, sourceHandle?, targetHandle? } ]
//! └── viewport (authoring-only, ignored by the engine)
//! ```
//!
//! # Example
//!
//! ```rust
//! use flow_core::document::FlowDocument;
//!
//! let doc = FlowDocument::from_json(r#"{
//!     "nodes": [
//!         {"id": "in", "type": "input", "data": {"label": "Question"}},
//!         {"id": "out", "type": "text-output", "data": {}}
//!     ],
//!     "edges": [
//!         {"id": "e1", "source": "in", "target": "out"}
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(doc.input_nodes().len(), 1);
//! assert!(doc.validate_runnable().is_ok());
//! ```

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Closed set of node type tags understood by the engine.
///
/// Dispatch is by this tag through a
/// [`HandlerRegistry`](crate::processor::HandlerRegistry); adding a node
/// type means registering a new handler, not extending a conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Plain text input, seeded with the caller's message.
    Input,
    /// File upload input; seeded like [`NodeKind::Input`].
    FileInput,
    /// Image upload input; seeded like [`NodeKind::Input`].
    ImageInput,
    /// Webhook-triggered input; seeded like [`NodeKind::Input`].
    WebhookInput,
    /// Chat-completion call against the primary hosted provider.
    LlmChat,
    /// Call against the community-hosted inference provider.
    CommunityInference,
    /// Call against an operator-run local inference server.
    LocalInference,
    /// Arbitrary HTTP request node.
    GenericHttp,
    /// Boolean branch on the combined upstream payload.
    Conditional,
    /// Terminal text sink.
    TextOutput,
    /// Terminal image sink (forwards upstream text).
    ImageOutput,
    /// Terminal email sink (forwards upstream text).
    EmailOutput,
    /// Terminal notification sink (forwards upstream text).
    NotificationOutput,
}

impl NodeKind {
    /// Whether this kind belongs to the input family (seeded, always ready).
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            NodeKind::Input | NodeKind::FileInput | NodeKind::ImageInput | NodeKind::WebhookInput
        )
    }

    /// Whether this kind is a terminal sink whose result can be returned to
    /// the caller.
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            NodeKind::TextOutput
                | NodeKind::ImageOutput
                | NodeKind::EmailOutput
                | NodeKind::NotificationOutput
        )
    }
}

/// One node of the graph document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    /// Unique id within the document.
    pub id: String,
    /// Type tag used for handler dispatch.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Free-form per-type configuration written by the authoring UI.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl FlowNode {
    /// Display label for the upstream join rule: the configured `label`
    /// falling back to the node id.
    pub fn label(&self) -> &str {
        self.data
            .get("label")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.id)
    }
}

/// A directed data-flow edge, optionally keyed by handle for nodes with
/// multiple outputs (a conditional node's `true`/`false` handles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Unique id within the document.
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Output handle on the source node, if it has more than one.
    #[serde(rename = "sourceHandle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input handle on the target node, if it has more than one.
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// Authoring-UI camera state. Carried through serialization, never read by
/// the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

/// The persisted node/edge graph describing one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    /// All nodes, in document order. Document order is load-bearing: it
    /// decides which input node receives the caller input and which output
    /// node is the terminal.
    pub nodes: Vec<FlowNode>,
    /// All edges, in document order. Edge order decides the upstream join
    /// order for nodes with several incoming edges.
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl FlowDocument {
    /// Parse a document from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges whose source and target both name existing nodes. Dangling
    /// edges are skipped; the scheduler logs them once per run.
    pub fn valid_edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges
            .iter()
            .filter(|e| self.node(&e.source).is_some() && self.node(&e.target).is_some())
    }

    /// Number of edges referencing a node id that does not exist.
    pub fn dangling_edge_count(&self) -> usize {
        self.edges.len() - self.valid_edges().count()
    }

    /// Valid edges into `id`, in document order.
    pub fn incoming(&self, id: &str) -> Vec<&FlowEdge> {
        self.valid_edges().filter(|e| e.target == id).collect()
    }

    /// Valid edges out of `id`, in document order.
    pub fn outgoing(&self, id: &str) -> Vec<&FlowEdge> {
        self.valid_edges().filter(|e| e.source == id).collect()
    }

    /// Input-family nodes in document order. The first one receives the
    /// caller input; any others receive their configured default.
    pub fn input_nodes(&self) -> Vec<&FlowNode> {
        self.nodes.iter().filter(|n| n.kind.is_input()).collect()
    }

    /// Pre-flight structural check: every node must be reachable from some
    /// input node, and no reachable node may sit on a cycle. Input nodes
    /// count as always ready, so their own incoming edges are ignored.
    ///
    /// Runs before any node executes, so a broken graph fails fast instead
    /// of spinning or leaving partial side effects.
    pub fn validate_runnable(&self) -> Result<()> {
        let inputs: Vec<&str> = self.input_nodes().iter().map(|n| n.id.as_str()).collect();
        if inputs.is_empty() {
            return Err(FlowError::NoInputNodes);
        }

        // Forward reachability from the inputs.
        let mut reachable: HashSet<&str> = inputs.iter().copied().collect();
        let mut frontier: VecDeque<&str> = inputs.iter().copied().collect();
        while let Some(id) = frontier.pop_front() {
            for edge in self.valid_edges().filter(|e| e.source == id) {
                if reachable.insert(edge.target.as_str()) {
                    frontier.push_back(edge.target.as_str());
                }
            }
        }

        // Kahn drain over the reachable subgraph. Edges into input nodes do
        // not count: seeded inputs never wait on a predecessor.
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        for edge in self.valid_edges() {
            let target = self.node(&edge.target).filter(|n| !n.kind.is_input());
            if let Some(target) = target {
                if reachable.contains(edge.source.as_str()) {
                    *indegree.entry(target.id.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = inputs.iter().copied().collect();
        let mut drained: HashSet<&str> = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !drained.insert(id) {
                continue;
            }
            for edge in self.valid_edges().filter(|e| e.source == id) {
                if let Some(count) = indegree.get_mut(edge.target.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(edge.target.as_str());
                    }
                }
            }
        }

        let stuck: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| !reachable.contains(n.id.as_str()) || (!drained.contains(n.id.as_str()) && !n.kind.is_input()))
            .map(|n| n.id.clone())
            .collect();

        if stuck.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Unrunnable { nodes: stuck })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> FlowDocument {
        FlowDocument::from_json(json).unwrap()
    }

    #[test]
    fn test_parse_minimal_document() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {"label": "Question"}},
                {"id": "llm", "type": "llm-chat", "data": {"model": "gpt-4"}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "llm"},
                {"id": "e2", "source": "llm", "target": "out"}
            ]
        }"#);

        assert_eq!(d.nodes.len(), 3);
        assert_eq!(d.nodes[0].kind, NodeKind::Input);
        assert_eq!(d.nodes[1].kind, NodeKind::LlmChat);
        assert_eq!(d.node("llm").unwrap().data["model"], "gpt-4");
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for (tag, kind) in [
            ("input", NodeKind::Input),
            ("file-input", NodeKind::FileInput),
            ("webhook-input", NodeKind::WebhookInput),
            ("llm-chat", NodeKind::LlmChat),
            ("community-inference", NodeKind::CommunityInference),
            ("local-inference", NodeKind::LocalInference),
            ("generic-http", NodeKind::GenericHttp),
            ("conditional", NodeKind::Conditional),
            ("text-output", NodeKind::TextOutput),
            ("notification-output", NodeKind::NotificationOutput),
        ] {
            let parsed: NodeKind = serde_json::from_value(serde_json::json!(tag)).unwrap();
            assert_eq!(parsed, kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), serde_json::json!(tag));
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = FlowDocument::from_json(
            r#"{"nodes": [{"id": "x", "type": "teleport", "data": {}}], "edges": []}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dangling_edges_ignored() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "out"},
                {"id": "e2", "source": "in", "target": "ghost"},
                {"id": "e3", "source": "phantom", "target": "out"}
            ]
        }"#);

        assert_eq!(d.valid_edges().count(), 1);
        assert_eq!(d.dangling_edge_count(), 2);
        assert_eq!(d.incoming("out").len(), 1);
        assert!(d.validate_runnable().is_ok());
    }

    #[test]
    fn test_label_falls_back_to_id() {
        let d = doc(r#"{
            "nodes": [
                {"id": "a", "type": "input", "data": {"label": "Topic"}},
                {"id": "b", "type": "input", "data": {"label": ""}},
                {"id": "c", "type": "input", "data": {}}
            ],
            "edges": []
        }"#);
        assert_eq!(d.nodes[0].label(), "Topic");
        assert_eq!(d.nodes[1].label(), "b");
        assert_eq!(d.nodes[2].label(), "c");
    }

    #[test]
    fn test_input_nodes_in_document_order() {
        let d = doc(r#"{
            "nodes": [
                {"id": "llm", "type": "llm-chat", "data": {}},
                {"id": "second", "type": "webhook-input", "data": {}},
                {"id": "first", "type": "input", "data": {}}
            ],
            "edges": []
        }"#);
        let inputs = d.input_nodes();
        assert_eq!(inputs.len(), 2);
        // Document order, not id order or kind order.
        assert_eq!(inputs[0].id, "second");
        assert_eq!(inputs[1].id, "first");
    }

    #[test]
    fn test_validate_runnable_detects_cycle() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "a", "type": "llm-chat", "data": {}},
                {"id": "b", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "a"},
                {"id": "e2", "source": "a", "target": "b"},
                {"id": "e3", "source": "b", "target": "a"},
                {"id": "e4", "source": "b", "target": "out"}
            ]
        }"#);

        match d.validate_runnable() {
            Err(FlowError::Unrunnable { nodes }) => {
                assert!(nodes.contains(&"a".to_string()));
                assert!(nodes.contains(&"b".to_string()));
                assert!(nodes.contains(&"out".to_string()));
            }
            other => panic!("expected Unrunnable, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_validate_runnable_detects_disconnected_node() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "out", "type": "text-output", "data": {}},
                {"id": "floating", "type": "llm-chat", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "out"}
            ]
        }"#);

        match d.validate_runnable() {
            Err(FlowError::Unrunnable { nodes }) => assert_eq!(nodes, vec!["floating"]),
            other => panic!("expected Unrunnable, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_validate_runnable_no_inputs() {
        let d = doc(r#"{
            "nodes": [{"id": "out", "type": "text-output", "data": {}}],
            "edges": []
        }"#);
        assert!(matches!(d.validate_runnable(), Err(FlowError::NoInputNodes)));
    }

    #[test]
    fn test_edge_into_input_does_not_block_it() {
        // Seeded inputs are always ready, even with an incoming edge.
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "hook", "type": "webhook-input", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "hook"},
                {"id": "e2", "source": "hook", "target": "out"}
            ]
        }"#);
        assert!(d.validate_runnable().is_ok());
    }
}
