//! The topological runner: owns one flow run end to end.
//!
//! A run seeds the input nodes, drains the graph in dependency order, and
//! hands the terminal node's result back to the caller. Readiness is
//! tracked with an in-degree table decremented as predecessors complete,
//! so a node enters the work queue exactly once, when its count reaches
//! zero. A broken graph can never spin: anything that could spin is
//! rejected up front by [`FlowDocument::validate_runnable`].
//!
//! # Execution model
//!
//! One run is one sequential drain on the calling task. Provider calls
//! suspend at `.await` rather than pinning a thread, but nodes are never
//! processed in parallel: a node's output becomes visible to its
//! successors only after it completes, and ties break in FIFO order.
//!
//! # Failure model
//!
//! Node-level failures are stored as that node's output and the drain
//! continues; downstream nodes simply receive no contribution from the
//! failed node. Only run-level conditions ([`FlowError`]) abort the run.
//!
//! # Example
//!
//! ```rust,no_run
//! use flow_core::{FlowDocument, FlowRunner, HandlerRegistry};
//!
//! # async fn example(doc: FlowDocument) {
//! let runner = FlowRunner::new(HandlerRegistry::with_builtins());
//! let result = runner.run(&doc, "Tell me about dogs").await;
//! match result.payload {
//!     Some(text) => println!("{}", text),
//!     None => eprintln!("run failed: {}", result.error.unwrap()),
//! }
//! # }
//! ```

use crate::document::{FlowDocument, FlowNode};
use crate::error::{FlowError, Result};
use crate::output::{join_upstream, NodeOutput, RunResult};
use crate::processor::{HandlerRegistry, NodeContext};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Timeouts governing one run.
///
/// Both limits exist because the original busy-loop design had neither: a
/// slow provider could hold a run open forever. The node timeout turns a
/// hung provider call into that node's error; the run deadline bounds the
/// whole drain.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wall-clock budget for the entire run.
    pub run_deadline: Duration,
    /// Budget for one handler invocation (one provider call).
    pub node_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_deadline: Duration::from_secs(120),
            node_timeout: Duration::from_secs(60),
        }
    }
}

impl RunOptions {
    /// Set the whole-run deadline.
    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = deadline;
        self
    }

    /// Set the per-node call timeout.
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }
}

/// Executes flow documents against a handler registry.
pub struct FlowRunner {
    registry: HandlerRegistry,
    options: RunOptions,
}

impl FlowRunner {
    /// Runner with default timeouts.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            options: RunOptions::default(),
        }
    }

    /// Override the run timeouts.
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute one run and assemble the caller-facing result.
    ///
    /// The caller always receives exactly one of payload/error; run-level
    /// failures are folded into the error side.
    #[tracing::instrument(skip_all, fields(run_id = %uuid::Uuid::new_v4(), node_count = doc.nodes.len()))]
    pub async fn run(&self, doc: &FlowDocument, caller_input: &str) -> RunResult {
        tracing::info!("starting flow run");
        match tokio::time::timeout(self.options.run_deadline, self.execute(doc, caller_input)).await
        {
            Ok(Ok(output)) => {
                tracing::info!("flow run completed");
                RunResult::from_output(output)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "flow run failed");
                RunResult::from_error(e)
            }
            Err(_) => {
                let e = FlowError::DeadlineExceeded {
                    deadline_ms: self.options.run_deadline.as_millis() as u64,
                };
                tracing::error!(error = %e, "flow run failed");
                RunResult::from_error(e)
            }
        }
    }

    /// The fallible core of one run: seed, drain, assemble.
    async fn execute(&self, doc: &FlowDocument, caller_input: &str) -> Result<NodeOutput> {
        let inputs = doc.input_nodes();
        if inputs.is_empty() {
            return Err(FlowError::NoInputNodes);
        }
        doc.validate_runnable()?;

        let dangling = doc.dangling_edge_count();
        if dangling > 0 {
            tracing::warn!(count = dangling, "ignoring edges referencing missing nodes");
        }

        // Positional seeding: the first input node (document order) gets
        // the caller input verbatim; any further input nodes get their
        // configured default or empty string. Deliberately positional, not
        // semantic, preserved for compatibility with authored flows.
        let mut seeds: HashMap<String, String> = HashMap::new();
        for (position, node) in inputs.iter().enumerate() {
            let value = if position == 0 {
                caller_input.to_string()
            } else {
                node.data
                    .get("default")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            seeds.insert(node.id.clone(), value);
        }

        // In-degree per non-input node. Seeded inputs are always ready, so
        // edges into them carry data but never gate readiness.
        let mut indegree: HashMap<String, usize> = HashMap::new();
        for edge in doc.valid_edges() {
            if let Some(target) = doc.node(&edge.target) {
                if !target.kind.is_input() {
                    *indegree.entry(target.id.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut queue: VecDeque<String> = inputs.iter().map(|n| n.id.clone()).collect();
        let mut completed: HashSet<String> = HashSet::new();
        let mut skipped: HashSet<String> = HashSet::new();
        let mut live: HashSet<String> = inputs.iter().map(|n| n.id.clone()).collect();
        let mut outputs: HashMap<String, NodeOutput> = HashMap::new();

        while let Some(id) = queue.pop_front() {
            if completed.contains(&id) || skipped.contains(&id) {
                continue;
            }
            let Some(node) = doc.node(&id) else {
                continue;
            };

            let input = if node.kind.is_input() {
                seeds.get(&id).cloned().unwrap_or_default()
            } else {
                joined_upstream(doc, node, &outputs)
            };

            let output = self.dispatch(node, input).await;
            if let Some(reason) = &output.error {
                tracing::warn!(node = %id, reason, "node completed with error");
            }
            let branch = output.branch.clone();
            completed.insert(id.clone());
            outputs.insert(id.clone(), output);

            release_successors(
                doc,
                &id,
                branch.as_deref(),
                &mut indegree,
                &mut live,
                &completed,
                &mut skipped,
                &mut queue,
            );
        }

        assemble(doc, &outputs)
    }

    /// One handler invocation under the per-node timeout. A timeout is the
    /// node's error, not the run's.
    async fn dispatch(&self, node: &FlowNode, input: String) -> NodeOutput {
        let ctx = NodeContext::new(node, input);
        match tokio::time::timeout(self.options.node_timeout, self.registry.dispatch(ctx)).await {
            Ok(output) => output,
            Err(_) => NodeOutput::err(format!(
                "node '{}' timed out after {}ms",
                node.id,
                self.options.node_timeout.as_millis()
            )),
        }
    }
}

/// Whether an edge is cut off by branch routing: the source selected a
/// branch and the edge's handle names a different one. Used both for
/// scheduling (liveness) and for the join rule, so a suppressed edge
/// neither wakes its target nor delivers a payload to it.
fn handle_mismatch(branch: Option<&str>, handle: Option<&str>) -> bool {
    matches!((branch, handle), (Some(chosen), Some(handle)) if handle != chosen)
}

/// Combined upstream text for one node: contributions from completed
/// predecessors with non-empty payloads, in incoming-edge document order.
/// Edges whose handle does not match the branch their source selected
/// carry nothing, even when the target is live via another path.
fn joined_upstream(
    doc: &FlowDocument,
    node: &FlowNode,
    outputs: &HashMap<String, NodeOutput>,
) -> String {
    let mut parts: Vec<(&str, &str)> = Vec::new();
    for edge in doc.incoming(&node.id) {
        let Some(upstream) = outputs.get(&edge.source) else {
            continue;
        };
        if handle_mismatch(upstream.branch.as_deref(), edge.source_handle.as_deref()) {
            continue;
        }
        let Some(text) = upstream.text() else {
            continue;
        };
        let label = doc
            .node(&edge.source)
            .map(|n| n.label())
            .unwrap_or(edge.source.as_str());
        parts.push((label, text));
    }
    join_upstream(&parts)
}

/// Propagate one completion (or skip) to its successors.
///
/// Every outgoing edge decrements its target's in-degree (the dependency
/// is resolved either way), but only a non-suppressed edge marks the
/// target *live*. An edge is suppressed when the completed node selected a
/// branch and the edge's source handle names a different one, or when the
/// source itself was skipped. A target whose in-degree reaches zero
/// without ever becoming live is skipped and propagates the same way, so
/// a pruned branch drains without executing.
#[allow(clippy::too_many_arguments)]
fn release_successors(
    doc: &FlowDocument,
    from: &str,
    branch: Option<&str>,
    indegree: &mut HashMap<String, usize>,
    live: &mut HashSet<String>,
    completed: &HashSet<String>,
    skipped: &mut HashSet<String>,
    queue: &mut VecDeque<String>,
) {
    let mut work: VecDeque<(String, Option<String>, bool)> =
        VecDeque::from([(from.to_string(), branch.map(str::to_string), true)]);

    while let Some((source, source_branch, source_live)) = work.pop_front() {
        for edge in doc.outgoing(&source) {
            let Some(target) = doc.node(&edge.target) else {
                continue;
            };
            if target.kind.is_input() {
                // Already queued at seed time; inputs never wait.
                continue;
            }

            let branch_mismatch =
                handle_mismatch(source_branch.as_deref(), edge.source_handle.as_deref());
            if source_live && !branch_mismatch {
                live.insert(target.id.clone());
            }

            let Some(count) = indegree.get_mut(&target.id) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && !completed.contains(&target.id) && !skipped.contains(&target.id) {
                if live.contains(&target.id) {
                    queue.push_back(target.id.clone());
                } else {
                    skipped.insert(target.id.clone());
                    work.push_back((target.id.clone(), None, false));
                }
            }
        }
    }
}

/// Locate the terminal result: the first output-family node in document
/// order that completed. Mirrors the positional input-seeding rule.
fn assemble(doc: &FlowDocument, outputs: &HashMap<String, NodeOutput>) -> Result<NodeOutput> {
    doc.nodes
        .iter()
        .filter(|n| n.kind.is_output())
        .find_map(|n| outputs.get(&n.id).cloned())
        .ok_or(FlowError::NoOutputProduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeKind;
    use crate::processor::NodeHandler;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Deterministic stand-in for a provider call.
    struct EchoHandler {
        reply: String,
    }

    #[async_trait]
    impl NodeHandler for EchoHandler {
        async fn handle(&self, _ctx: NodeContext<'_>) -> NodeOutput {
            NodeOutput::ok(self.reply.clone())
        }

        fn kind_name(&self) -> &'static str {
            "echo"
        }
    }

    /// Always fails, like a generic HTTP node with an unreachable endpoint.
    struct FailHandler;

    #[async_trait]
    impl NodeHandler for FailHandler {
        async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
            NodeOutput::err(format!("endpoint unreachable for '{}'", ctx.node.id))
        }

        fn kind_name(&self) -> &'static str {
            "fail"
        }
    }

    /// Records which nodes ran, echoing its input through.
    struct RecordingHandler {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NodeHandler for RecordingHandler {
        async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
            self.log.lock().unwrap().push(ctx.node.id.clone());
            NodeOutput::ok(ctx.input)
        }

        fn kind_name(&self) -> &'static str {
            "recording"
        }
    }

    /// Sleeps before answering; paired with a paused clock in tests.
    struct SlowHandler {
        delay: Duration,
    }

    #[async_trait]
    impl NodeHandler for SlowHandler {
        async fn handle(&self, _ctx: NodeContext<'_>) -> NodeOutput {
            tokio::time::sleep(self.delay).await;
            NodeOutput::ok("late")
        }

        fn kind_name(&self) -> &'static str {
            "slow"
        }
    }

    fn doc(json: &str) -> FlowDocument {
        FlowDocument::from_json(json).unwrap()
    }

    fn runner_with_llm(handler: Arc<dyn NodeHandler>) -> FlowRunner {
        let mut registry = HandlerRegistry::with_builtins();
        registry.register(NodeKind::LlmChat, handler);
        FlowRunner::new(registry)
    }

    #[tokio::test]
    async fn test_scenario_single_chain() {
        // [input] -> [llm-chat] -> [output], provider mocked to echo a summary.
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {"label": "Question"}},
                {"id": "llm", "type": "llm-chat", "data": {"systemPrompt": "Summarize in one sentence"}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "llm"},
                {"id": "e2", "source": "llm", "target": "out"}
            ]
        }"#);
        let runner = runner_with_llm(Arc::new(EchoHandler { reply: "DOGS SUMMARY".into() }));

        let result = runner.run(&d, "Tell me about dogs").await;
        assert_eq!(result.payload.as_deref(), Some("DOGS SUMMARY"));
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_input_seeding_is_positional() {
        // First input (document order) gets the caller input; the second
        // gets its configured default.
        let d = doc(r#"{
            "nodes": [
                {"id": "primary", "type": "input", "data": {"label": "Primary"}},
                {"id": "secondary", "type": "input", "data": {"label": "Secondary", "default": "fallback text"}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "primary", "target": "out"},
                {"id": "e2", "source": "secondary", "target": "out"}
            ]
        }"#);
        let runner = FlowRunner::new(HandlerRegistry::with_builtins());

        let result = runner.run(&d, "caller input").await;
        assert_eq!(
            result.payload.as_deref(),
            Some("Primary: caller input\n\nSecondary: fallback text")
        );
    }

    #[tokio::test]
    async fn test_secondary_input_without_default_is_empty() {
        let d = doc(r#"{
            "nodes": [
                {"id": "a", "type": "input", "data": {}},
                {"id": "b", "type": "input", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "out"},
                {"id": "e2", "source": "b", "target": "out"}
            ]
        }"#);
        let runner = FlowRunner::new(HandlerRegistry::with_builtins());

        // Empty second input contributes nothing to the join.
        let result = runner.run(&d, "hello").await;
        assert_eq!(result.payload.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_branch_false_prunes_true_chain() {
        // condition "input.length > 3" fed "hi" evaluates false: only the
        // false edge's chain executes.
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "cond", "type": "conditional", "data": {"condition": "input.length > 3"}},
                {"id": "long", "type": "llm-chat", "data": {}},
                {"id": "short", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "cond"},
                {"id": "e2", "source": "cond", "target": "long", "sourceHandle": "true"},
                {"id": "e3", "source": "cond", "target": "short", "sourceHandle": "false"},
                {"id": "e4", "source": "long", "target": "out"},
                {"id": "e5", "source": "short", "target": "out"}
            ]
        }"#);
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_llm(Arc::new(RecordingHandler { log: log.clone() }));

        let result = runner.run(&d, "hi").await;
        assert_eq!(result.payload.as_deref(), Some("hi"));

        let ran = log.lock().unwrap().clone();
        assert!(ran.contains(&"short".to_string()));
        assert!(!ran.contains(&"long".to_string()), "true branch must not run");
    }

    #[tokio::test]
    async fn test_branch_true_prunes_false_chain() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "cond", "type": "conditional", "data": {"condition": "input.length > 3"}},
                {"id": "long", "type": "llm-chat", "data": {}},
                {"id": "short", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "cond"},
                {"id": "e2", "source": "cond", "target": "long", "sourceHandle": "true"},
                {"id": "e3", "source": "cond", "target": "short", "sourceHandle": "false"},
                {"id": "e4", "source": "long", "target": "out"},
                {"id": "e5", "source": "short", "target": "out"}
            ]
        }"#);
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_llm(Arc::new(RecordingHandler { log: log.clone() }));

        let result = runner.run(&d, "hello there").await;
        assert_eq!(result.payload.as_deref(), Some("hello there"));

        let ran = log.lock().unwrap().clone();
        assert!(ran.contains(&"long".to_string()));
        assert!(!ran.contains(&"short".to_string()));
    }

    #[tokio::test]
    async fn test_untaken_branch_edge_carries_no_payload() {
        // The merge node stays live through the direct edge from the
        // input, but the conditional's false result means its true-handle
        // edge must deliver nothing: the merge sees only the input's
        // contribution, unlabeled because it is the sole one.
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "cond", "type": "conditional", "data": {"condition": "input.length > 3"}},
                {"id": "merge", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "cond"},
                {"id": "e2", "source": "cond", "target": "merge", "sourceHandle": "true"},
                {"id": "e3", "source": "in", "target": "merge"},
                {"id": "e4", "source": "merge", "target": "out"}
            ]
        }"#);
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_llm(Arc::new(RecordingHandler { log: log.clone() }));

        let result = runner.run(&d, "hi").await;
        assert_eq!(result.payload.as_deref(), Some("hi"));
        assert!(log.lock().unwrap().contains(&"merge".to_string()));
    }

    #[tokio::test]
    async fn test_taken_branch_edge_still_delivers() {
        // Same shape, long input: the true branch fires and the merge
        // joins both contributions in edge document order.
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {"label": "In"}},
                {"id": "cond", "type": "conditional", "data": {"label": "Cond", "condition": "input.length > 3"}},
                {"id": "merge", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "cond"},
                {"id": "e2", "source": "cond", "target": "merge", "sourceHandle": "true"},
                {"id": "e3", "source": "in", "target": "merge"},
                {"id": "e4", "source": "merge", "target": "out"}
            ]
        }"#);
        let runner = runner_with_llm(Arc::new(RecordingHandler {
            log: Arc::new(Mutex::new(Vec::new())),
        }));

        let result = runner.run(&d, "hello").await;
        assert_eq!(result.payload.as_deref(), Some("Cond: hello\n\nIn: hello"));
    }

    #[tokio::test]
    async fn test_failed_node_does_not_poison_siblings() {
        // One branch always fails; the sibling branch and the terminal
        // still complete with the sibling's contribution.
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "bad", "type": "generic-http", "data": {}},
                {"id": "good", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "bad"},
                {"id": "e2", "source": "in", "target": "good"},
                {"id": "e3", "source": "bad", "target": "out"},
                {"id": "e4", "source": "good", "target": "out"}
            ]
        }"#);
        let mut registry = HandlerRegistry::with_builtins();
        registry.register(NodeKind::GenericHttp, Arc::new(FailHandler));
        registry.register(NodeKind::LlmChat, Arc::new(EchoHandler { reply: "partial answer".into() }));
        let runner = FlowRunner::new(registry);

        let result = runner.run(&d, "question").await;
        assert_eq!(result.payload.as_deref(), Some("partial answer"));
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_same_input_same_output() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "llm", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "llm"},
                {"id": "e2", "source": "llm", "target": "out"}
            ]
        }"#);
        let runner = runner_with_llm(Arc::new(EchoHandler { reply: "stable".into() }));

        let first = runner.run(&d, "same input").await;
        let second = runner.run(&d, "same input").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_no_input_nodes_is_run_error() {
        let d = doc(r#"{
            "nodes": [{"id": "out", "type": "text-output", "data": {}}],
            "edges": []
        }"#);
        let runner = FlowRunner::new(HandlerRegistry::with_builtins());

        let result = runner.run(&d, "x").await;
        assert_eq!(result.payload, None);
        assert!(result.error.unwrap().contains("no input nodes"));
    }

    #[tokio::test]
    async fn test_cycle_fails_fast() {
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
                {"id": "e4", "source": "a", "target": "out"}
            ]
        }"#);
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_llm(Arc::new(RecordingHandler { log: log.clone() }));

        let result = runner.run(&d, "x").await;
        assert!(result.error.unwrap().contains("can never run"));
        // Fail-fast: no provider node executed.
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_terminal_node_is_run_error() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "llm", "type": "llm-chat", "data": {}}
            ],
            "edges": [{"id": "e1", "source": "in", "target": "llm"}]
        }"#);
        let runner = runner_with_llm(Arc::new(EchoHandler { reply: "x".into() }));

        let result = runner.run(&d, "x").await;
        assert!(result.error.unwrap().contains("no terminal output"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_timeout_becomes_node_error() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "llm", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "llm"},
                {"id": "e2", "source": "llm", "target": "out"}
            ]
        }"#);
        let mut registry = HandlerRegistry::with_builtins();
        registry.register(
            NodeKind::LlmChat,
            Arc::new(SlowHandler { delay: Duration::from_secs(30) }),
        );
        let runner = FlowRunner::new(registry).with_options(
            RunOptions::default()
                .with_node_timeout(Duration::from_secs(5))
                .with_run_deadline(Duration::from_secs(300)),
        );

        // The slow node times out, but the run still completes: the sink
        // just has no upstream contribution.
        let result = runner.run(&d, "x").await;
        assert_eq!(result.payload.as_deref(), Some(""));
        assert_eq!(result.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_aborts_run() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "llm", "type": "llm-chat", "data": {}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "llm"},
                {"id": "e2", "source": "llm", "target": "out"}
            ]
        }"#);
        let mut registry = HandlerRegistry::with_builtins();
        registry.register(
            NodeKind::LlmChat,
            Arc::new(SlowHandler { delay: Duration::from_secs(600) }),
        );
        let runner = FlowRunner::new(registry).with_options(
            RunOptions::default()
                .with_node_timeout(Duration::from_secs(3600))
                .with_run_deadline(Duration::from_secs(10)),
        );

        let result = runner.run(&d, "x").await;
        assert_eq!(result.payload, None);
        assert!(result.error.unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn test_multiple_outputs_first_in_document_order_wins() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "email", "type": "email-output", "data": {}},
                {"id": "text", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "email"},
                {"id": "e2", "source": "in", "target": "text"}
            ]
        }"#);
        let runner = FlowRunner::new(HandlerRegistry::with_builtins());

        let result = runner.run(&d, "ping").await;
        // Both sinks complete; the email sink comes first in the document.
        assert_eq!(result.payload.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_diamond_joins_in_edge_order() {
        let d = doc(r#"{
            "nodes": [
                {"id": "in", "type": "input", "data": {}},
                {"id": "left", "type": "llm-chat", "data": {"label": "Left"}},
                {"id": "right", "type": "generic-http", "data": {"label": "Right"}},
                {"id": "out", "type": "text-output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "in", "target": "left"},
                {"id": "e2", "source": "in", "target": "right"},
                {"id": "e3", "source": "right", "target": "out"},
                {"id": "e4", "source": "left", "target": "out"}
            ]
        }"#);
        let mut registry = HandlerRegistry::with_builtins();
        registry.register(NodeKind::LlmChat, Arc::new(EchoHandler { reply: "L".into() }));
        registry.register(NodeKind::GenericHttp, Arc::new(EchoHandler { reply: "R".into() }));
        let runner = FlowRunner::new(registry);

        // Join order follows edge document order (e3 before e4), not node
        // order or completion order.
        let result = runner.run(&d, "x").await;
        assert_eq!(result.payload.as_deref(), Some("Right: R\n\nLeft: L"));
    }
}
