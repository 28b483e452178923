//! Shader Graph Container
//!
//! [`ShaderGraph`] owns every node of a material in a generation-checked
//! arena. Connections refer to producers by [`NodeHandle`], so removing a
//! node invalidates its handle instead of leaving dangling references, and
//! the graph scrubs the removed node from every consumer's inputs.
//!
//! Editing requires `&mut ShaderGraph`; compiling only borrows it, so a
//! graph cannot change while it is being lowered.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SlotMap, new_key_type};

use matgraph_core::{GraphError, OutputPort, Result, Stage};

use crate::compiler::{ShaderCompiler, find_cycle, post_order};
use crate::manifest::CompiledShader;
use crate::node::{Connection, Node};
use crate::settings::CompilerSettings;
use crate::sink::{SINK_ID, SinkSlot, SinkStep};

new_key_type! {
    /// Stable handle to a node of a [`ShaderGraph`].
    pub struct NodeHandle;
}

/// A material graph: user nodes plus exactly one sink.
#[derive(Debug, Clone)]
pub struct ShaderGraph {
    nodes: SlotMap<NodeHandle, Node>,
    ids: FxHashMap<String, NodeHandle>,
    /// Insertion order of user nodes (the sink is not listed).
    order: Vec<NodeHandle>,
    sink: NodeHandle,
    settings: CompilerSettings,
}

impl Default for ShaderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGraph {
    /// Creates a graph holding only the sink node.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(CompilerSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: CompilerSettings) -> Self {
        let mut nodes = SlotMap::with_key();
        let sink = nodes.insert(Node::sink(SINK_ID));

        let mut ids = FxHashMap::default();
        ids.insert(SINK_ID.to_string(), sink);

        Self {
            nodes,
            ids,
            order: Vec::new(),
            sink,
            settings,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut CompilerSettings {
        &mut self.settings
    }

    // ------------------------------------------------------------------------
    // Node set
    // ------------------------------------------------------------------------

    /// Adds a node and returns its handle.
    ///
    /// Rejects malformed, reserved or duplicate identifiers and invalid
    /// kind/storage combinations. Inputs carried by `node` are discarded;
    /// wire them with [`connect`](Self::connect).
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeHandle> {
        node.validate()?;
        if self.ids.contains_key(node.id()) {
            return Err(GraphError::DuplicateIdentifier(node.id().to_string()));
        }

        node.clear_inputs();

        let id = node.id().to_string();
        let handle = self.nodes.insert(node);
        self.ids.insert(id, handle);
        self.order.push(handle);

        log::debug!("Added shader graph node {handle:?}");
        Ok(handle)
    }

    /// Removes a node, scrubbing every connection that read from it.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<Node> {
        if handle == self.sink {
            return Err(GraphError::SinkRemoval);
        }

        let node = self
            .nodes
            .remove(handle)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{handle:?}")))?;
        self.ids.remove(node.id());
        self.order.retain(|h| *h != handle);

        let scrubbed: usize = self.nodes.values_mut().map(|n| n.scrub(handle)).sum();
        log::debug!(
            "Removed shader graph node '{}' ({scrubbed} connections scrubbed)",
            node.id()
        );

        Ok(node)
    }

    #[inline]
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// Like [`node`](Self::node), but a stale handle is an error.
    pub fn get(&self, handle: NodeHandle) -> Result<&Node> {
        self.nodes
            .get(handle)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{handle:?}")))
    }

    /// Looks a node up by identifier. The sink answers to [`SINK_ID`].
    #[must_use]
    pub fn find(&self, id: &str) -> Option<NodeHandle> {
        self.ids.get(id).copied()
    }

    #[inline]
    #[must_use]
    pub fn sink(&self) -> NodeHandle {
        self.sink
    }

    /// User nodes in insertion order.
    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.order.iter().copied()
    }

    /// Number of user nodes (the sink is not counted).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Wires `connection` into `consumer`.
    ///
    /// The producer must expose `connection.output` and the consumer must
    /// have input slot `connection.input`. A connection already feeding
    /// that slot is replaced. Cycles are accepted here and reported by
    /// [`compile`](Self::compile) so an editor can keep the graph open.
    pub fn connect(&mut self, consumer: NodeHandle, connection: Connection) -> Result<()> {
        let producer = self.get(connection.producer)?;
        producer.output_type(connection.output)?;
        let producer_id = producer.id().to_string();

        let node = self
            .nodes
            .get_mut(consumer)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{consumer:?}")))?;

        let max = node.max_inputs();
        if connection.input >= max {
            return Err(GraphError::InvalidInputPort {
                node: node.id().to_string(),
                port: connection.input,
                max,
            });
        }

        if node.set_input(connection).is_some() {
            log::debug!(
                "Rewired input {} of '{}' to '{producer_id}'",
                connection.input,
                node.id()
            );
        } else {
            log::trace!(
                "Connected '{producer_id}' {:?} -> '{}' input {}",
                connection.output,
                node.id(),
                connection.input
            );
        }

        Ok(())
    }

    /// Shorthand for wiring `producer` into a sink slot.
    pub fn connect_sink(
        &mut self,
        slot: SinkSlot,
        producer: NodeHandle,
        output: OutputPort,
    ) -> Result<()> {
        self.connect(self.sink, Connection::new(producer, output, slot.index()))
    }

    /// Removes the connection feeding `input` of `consumer`, if any.
    pub fn disconnect(&mut self, consumer: NodeHandle, input: usize) -> Result<Option<Connection>> {
        let node = self
            .nodes
            .get_mut(consumer)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{consumer:?}")))?;
        Ok(node.remove_input(input))
    }

    // ------------------------------------------------------------------------
    // Analysis & compilation
    // ------------------------------------------------------------------------

    /// Nodes that feed the sink slots of `stage`, producers before consumers.
    pub fn reachable_nodes(&self, stage: Stage) -> Result<Vec<NodeHandle>> {
        find_cycle(self)?;

        let sink = self.get(self.sink)?;
        let mut visited = FxHashSet::default();
        let mut out = Vec::new();

        for slot in SinkStep::slots(stage) {
            if let Some(connection) = sink.input(slot.index()) {
                out.extend(post_order(self, connection.producer, &mut visited)?);
            }
        }
        Ok(out)
    }

    /// Runs the structural checks `compile` performs before emitting text.
    pub fn validate(&self) -> Result<()> {
        find_cycle(self)
    }

    /// Lowers the graph into vertex and fragment programs plus the uniform
    /// manifest. Always starts from fresh evaluation state.
    pub fn compile(&self) -> Result<CompiledShader> {
        let mut compiler = ShaderCompiler::new(self);
        compiler.check_cycles()?;

        let vertex = compiler.parse(Stage::Vertex)?;
        let fragment = compiler.parse(Stage::Fragment)?;
        let uniforms = compiler.into_manifest();

        log::debug!(
            "Compiled shader graph: {} nodes, {} uniforms",
            self.len(),
            uniforms.len()
        );

        Ok(CompiledShader {
            vertex,
            fragment,
            uniforms,
        })
    }

    /// Lowers a single stage.
    pub fn parse(&self, stage: Stage) -> Result<String> {
        ShaderCompiler::new(self).parse(stage)
    }

    pub(crate) fn nodes_in_order(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.order.iter().copied().chain(std::iter::once(self.sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matgraph_core::{ConstantValue, PrimitiveType};

    use crate::node::{BinaryOp, NodeKind, UnaryOp};

    #[test]
    fn test_new_graph_has_only_sink() {
        let graph = ShaderGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.find(SINK_ID), Some(graph.sink()));
        assert!(graph.node(graph.sink()).unwrap().is_sink());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = ShaderGraph::new();
        graph.add_node(Node::texture("albedo")).unwrap();
        let err = graph
            .add_node(Node::constant("albedo", ConstantValue::Float(1.0)))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateIdentifier("albedo".into()));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_sink_id_is_taken() {
        let mut graph = ShaderGraph::new();
        let err = graph.add_node(Node::texture(SINK_ID)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateIdentifier(SINK_ID.into()));
    }

    #[test]
    fn test_sink_kind_cannot_be_added() {
        let mut graph = ShaderGraph::new();
        let node = Node::new("other_sink", NodeKind::Sink, Default::default());
        assert!(matches!(
            graph.add_node(node),
            Err(GraphError::InvalidNode { .. })
        ));
    }

    #[test]
    fn test_sink_cannot_be_removed() {
        let mut graph = ShaderGraph::new();
        let sink = graph.sink();
        assert_eq!(graph.remove_node(sink), Err(GraphError::SinkRemoval));
    }

    #[test]
    fn test_remove_scrubs_consumers() {
        let mut graph = ShaderGraph::new();
        let k = graph
            .add_node(Node::constant("k", ConstantValue::Float(0.5)))
            .unwrap();
        let f = graph
            .add_node(Node::unary("f", UnaryOp::OneMinus, PrimitiveType::Float))
            .unwrap();
        graph
            .connect(f, Connection::new(k, OutputPort::Value, 0))
            .unwrap();
        graph
            .connect_sink(SinkSlot::Metallic, k, OutputPort::Value)
            .unwrap();

        let removed = graph.remove_node(k).unwrap();
        assert_eq!(removed.id(), "k");
        assert!(graph.node(f).unwrap().inputs().is_empty());
        assert!(graph.node(graph.sink()).unwrap().inputs().is_empty());
        assert!(graph.node(k).is_none());
        assert_eq!(graph.find("k"), None);

        // Stale handle stays stale even after the slot is reused.
        let k2 = graph
            .add_node(Node::constant("k", ConstantValue::Float(0.5)))
            .unwrap();
        assert_ne!(k, k2);
        assert!(graph.node(k).is_none());
    }

    #[test]
    fn test_connect_validates_ports() {
        let mut graph = ShaderGraph::new();
        let tex = graph.add_node(Node::texture("tex")).unwrap();
        let k = graph
            .add_node(Node::constant("k", ConstantValue::Float(1.0)))
            .unwrap();

        let err = graph
            .connect_sink(SinkSlot::Albedo, tex, OutputPort::Value)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownPort { .. }));

        let err = graph
            .connect(k, Connection::new(tex, OutputPort::R, 0))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::InvalidInputPort {
                node: "k".into(),
                port: 0,
                max: 0,
            }
        );

        let sink = graph.sink();
        let err = graph
            .connect(k, Connection::new(sink, OutputPort::Value, 0))
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownPort { .. }));
    }

    #[test]
    fn test_reconnect_replaces_slot() {
        let mut graph = ShaderGraph::new();
        let a = graph
            .add_node(Node::constant("a", ConstantValue::Float(1.0)))
            .unwrap();
        let b = graph
            .add_node(Node::constant("b", ConstantValue::Float(2.0)))
            .unwrap();
        let sum = graph
            .add_node(Node::binary("sum", BinaryOp::Add, PrimitiveType::Float))
            .unwrap();

        graph.connect(sum, Connection::new(a, OutputPort::Value, 0)).unwrap();
        graph.connect(sum, Connection::new(a, OutputPort::Value, 1)).unwrap();
        graph.connect(sum, Connection::new(b, OutputPort::Value, 1)).unwrap();

        let node = graph.node(sum).unwrap();
        assert_eq!(node.inputs().len(), 2);
        assert_eq!(node.input(1).unwrap().producer, b);

        let removed = graph.disconnect(sum, 0).unwrap();
        assert_eq!(removed.map(|c| c.producer), Some(a));
        assert_eq!(graph.disconnect(sum, 0).unwrap(), None);
    }

    #[test]
    fn test_reachable_nodes_are_post_ordered() {
        let mut graph = ShaderGraph::new();
        let dead = graph
            .add_node(Node::constant("dead", ConstantValue::Float(1.0)))
            .unwrap();
        let pan = graph
            .add_node(Node::panner("pan", glam::Vec2::new(0.1, 0.0)))
            .unwrap();
        let tex = graph.add_node(Node::texture("tex")).unwrap();
        graph.connect(tex, Connection::new(pan, OutputPort::Value, 0)).unwrap();
        graph
            .connect_sink(SinkSlot::Albedo, tex, OutputPort::Rgb)
            .unwrap();

        let reachable = graph.reachable_nodes(Stage::Fragment).unwrap();
        assert_eq!(reachable, vec![pan, tex]);
        assert!(!reachable.contains(&dead));
        assert!(graph.reachable_nodes(Stage::Vertex).unwrap().is_empty());
    }
}
