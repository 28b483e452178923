//! Shader Graph Compiler
//!
//! [`ShaderCompiler`] is one compile session over a borrowed
//! [`ShaderGraph`]. It owns every piece of derived state: the memo table of
//! evaluated nodes, the registered variable names, the collected
//! declarations, the uniform manifest and the texture unit counter.
//! Nothing is stored on the nodes themselves, so a graph can be compiled
//! any number of times with identical results.
//!
//! Per stage the session:
//! 1. walks every node reachable from the stage's sink slots and collects
//!    its declaration (producers first),
//! 2. evaluates the sink, which evaluates each producer exactly once,
//! 3. renders the stage template around both.

use rustc_hash::{FxHashMap, FxHashSet};

use matgraph_core::{
    GraphError, OutputPort, PrimitiveType, Result, Stage, StorageClass, promote,
};

use crate::graph::{NodeHandle, ShaderGraph};
use crate::manifest::{UniformManifest, UniformReference};
use crate::node::{Connection, Node, NodeKind};
use crate::sink::{
    FALLBACK_COMMENT, MATERIAL_COMPOSITE, NORMAL_DECODE, SINK_ID, SinkSlot, SinkStep,
};
use crate::template::{StageContext, render_stage};

/// A single compile of a graph.
pub struct ShaderCompiler<'g> {
    graph: &'g ShaderGraph,
    stage: Stage,
    acyclic: bool,

    // Per stage
    evaluated: FxHashSet<NodeHandle>,
    declared: FxHashSet<NodeHandle>,
    registered: FxHashMap<String, NodeHandle>,
    declarations: Vec<String>,

    // Per compile
    manifest: UniformManifest,
    bound_textures: u32,
}

impl<'g> ShaderCompiler<'g> {
    #[must_use]
    pub fn new(graph: &'g ShaderGraph) -> Self {
        Self {
            graph,
            stage: Stage::Vertex,
            acyclic: false,
            evaluated: FxHashSet::default(),
            declared: FxHashSet::default(),
            registered: FxHashMap::default(),
            declarations: Vec::new(),
            manifest: UniformManifest::new(),
            bound_textures: 0,
        }
    }

    /// Stage currently being assembled.
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Declarations collected for the current stage, in emission order.
    #[inline]
    #[must_use]
    pub fn declarations(&self) -> &[String] {
        &self.declarations
    }

    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &UniformManifest {
        &self.manifest
    }

    #[must_use]
    pub fn into_manifest(self) -> UniformManifest {
        self.manifest
    }

    /// Drops all derived state, including the manifest and texture units.
    pub fn reset(&mut self) {
        self.begin_stage(Stage::Vertex);
        self.manifest.clear();
        self.bound_textures = 0;
        self.acyclic = false;
    }

    /// Fails with [`GraphError::CyclicGraph`] if any connection path loops.
    pub fn check_cycles(&mut self) -> Result<()> {
        if !self.acyclic {
            find_cycle(self.graph)?;
            self.acyclic = true;
        }
        Ok(())
    }

    /// Produces the full program text of `stage`.
    ///
    /// Uniforms discovered here are appended to the session manifest;
    /// already listed uniforms keep their texture unit.
    pub fn parse(&mut self, stage: Stage) -> Result<String> {
        self.check_cycles()?;
        self.begin_stage(stage);

        let graph = self.graph;
        let sink = graph.get(graph.sink())?;
        for slot in SinkStep::slots(stage) {
            if let Some(connection) = sink.input(slot.index()) {
                self.declare(connection.producer)?;
            }
        }

        let body = self.evaluate(graph.sink())?;
        let body: Vec<String> = body.lines().map(str::to_string).collect();

        log::trace!(
            "{stage:?} stage: {} declarations, {} body lines",
            self.declarations.len(),
            body.len()
        );

        render_stage(
            stage,
            &StageContext {
                version: graph.settings().glsl_version,
                declarations: &self.declarations,
                body: &body,
            },
        )
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Returns the statements that compute `handle` and any producer not yet
    /// evaluated in this stage. Empty once the node has been evaluated.
    pub fn evaluate(&mut self, handle: NodeHandle) -> Result<String> {
        self.check_cycles()?;

        let graph = self.graph;
        let node = graph.get(handle)?;
        if node.is_sink() {
            if !self.evaluated.insert(handle) {
                return Ok(String::new());
            }
            return self.evaluate_sink(node);
        }

        let mut out = String::new();
        for producer in post_order(graph, handle, &mut self.evaluated)? {
            let node = graph.get(producer)?;
            let inputs = (0..node.max_inputs())
                .map(|input| self.input_expression(node, input))
                .collect::<Result<Vec<_>>>()?;

            let statement = node.statement(&inputs);
            if !statement.is_empty() {
                out.push_str(&statement);
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Identifier expression for an output facet. No side effects.
    pub fn evaluate_at_port(&self, handle: NodeHandle, port: OutputPort) -> Result<String> {
        self.graph.get(handle)?.evaluate_at_port(port)
    }

    /// Arity of an output facet.
    pub fn output_type(&self, handle: NodeHandle, port: OutputPort) -> Result<PrimitiveType> {
        self.graph.get(handle)?.output_type(port)
    }

    fn evaluate_sink(&mut self, sink: &Node) -> Result<String> {
        let annotate = self.graph.settings().annotate_slots;
        let mut lines: Vec<String> = Vec::new();

        for step in SinkStep::plan(self.stage) {
            let slot = match *step {
                SinkStep::Composite => {
                    lines.push(MATERIAL_COMPOSITE.to_string());
                    continue;
                }
                SinkStep::Slot(slot) => slot,
            };

            if annotate {
                lines.push(format!("// {}", slot.label()));
            }

            let Some(connection) = sink.input(slot.index()) else {
                log::trace!("Sink slot {} is unconnected", slot.label());
                lines.push(FALLBACK_COMMENT.to_string());
                continue;
            };

            let producer_body = self.evaluate(connection.producer)?;
            lines.extend(producer_body.lines().map(str::to_string));

            let consumer = format!("{SINK_ID}.{}", slot.label());
            let value = self.read_connection(&consumer, connection, slot.required_type())?;
            lines.push(format!("{} = {value};", slot.target()));

            if slot == SinkSlot::Normal {
                lines.extend(NORMAL_DECODE.iter().map(|line| (*line).to_string()));
            }
        }

        let mut out = String::new();
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    fn input_expression(&self, node: &Node, input: usize) -> Result<Option<String>> {
        let Some(connection) = node.input(input) else {
            return Ok(None);
        };
        let required = node
            .input_type(input)
            .ok_or_else(|| GraphError::InvalidInputPort {
                node: node.id().to_string(),
                port: input,
                max: node.max_inputs(),
            })?;
        self.read_connection(node.id(), connection, required)
            .map(Some)
    }

    /// Reads the producer of `connection` promoted to `required`.
    fn read_connection(
        &self,
        consumer: &str,
        connection: &Connection,
        required: PrimitiveType,
    ) -> Result<String> {
        let producer = self.graph.get(connection.producer)?;
        let expr = producer.evaluate_at_port(connection.output)?;
        let produced = producer.output_type(connection.output)?;
        promote(&expr, produced, required, consumer)
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn begin_stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.evaluated.clear();
        self.declared.clear();
        self.registered.clear();
        self.declarations.clear();
    }

    /// Collects the declaration of `handle` and its producers, producers first.
    fn declare(&mut self, handle: NodeHandle) -> Result<()> {
        let graph = self.graph;
        for producer in post_order(graph, handle, &mut self.declared)? {
            let node = graph.get(producer)?;

            self.register_name(node.id(), producer)?;
            let qualified = node.qualified_id();
            if qualified != node.id() {
                self.register_name(&qualified, producer)?;
            }

            if let Some(declaration) = node.declaration() {
                self.declarations.push(declaration);
            }
            if node.storage() == StorageClass::Uniform {
                self.register_uniform(node)?;
            }
        }
        Ok(())
    }

    fn register_name(&mut self, name: &str, owner: NodeHandle) -> Result<()> {
        match self.registered.get(name) {
            Some(existing) if *existing != owner => {
                Err(GraphError::DuplicateIdentifier(name.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.registered.insert(name.to_string(), owner);
                Ok(())
            }
        }
    }

    fn register_uniform(&mut self, node: &Node) -> Result<()> {
        if self.manifest.contains(node.id()) {
            return Ok(());
        }
        let Some(ty) = node.arity() else {
            return Ok(());
        };

        let (binding, default) = match node.kind() {
            NodeKind::TextureSample => {
                let unit = self
                    .graph
                    .settings()
                    .texture_unit_base
                    .checked_add(self.bound_textures)
                    .ok_or_else(|| GraphError::TextureUnitsExhausted {
                        node: node.id().to_string(),
                    })?;
                self.bound_textures += 1;
                (Some(unit), None)
            }
            NodeKind::Constant { value } => (None, Some(*value)),
            _ => (None, None),
        };

        self.manifest.register(UniformReference {
            name: node.id().to_string(),
            ty,
            binding,
            default,
        });
        Ok(())
    }
}

/// Post-order walk over `root` and its producers, inputs in slot order.
///
/// Nodes already in `visited` are skipped together with their producers;
/// every node returned is added to it. Uses an explicit stack, so graph
/// depth is bounded by memory rather than by the thread stack.
pub(crate) fn post_order(
    graph: &ShaderGraph,
    root: NodeHandle,
    visited: &mut FxHashSet<NodeHandle>,
) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    if !visited.insert(root) {
        return Ok(out);
    }

    let mut stack: Vec<(NodeHandle, usize)> = vec![(root, 0)];
    while let Some(frame) = stack.last_mut() {
        let (handle, next) = *frame;
        let node = graph.get(handle)?;

        if next < node.max_inputs() {
            frame.1 += 1;
            if let Some(connection) = node.input(next)
                && visited.insert(connection.producer)
            {
                stack.push((connection.producer, 0));
            }
        } else {
            stack.pop();
            out.push(handle);
        }
    }
    Ok(out)
}

/// Depth-first search over the whole graph with visiting/visited marks.
pub(crate) fn find_cycle(graph: &ShaderGraph) -> Result<()> {
    let mut visiting = FxHashSet::default();
    let mut visited = FxHashSet::default();
    let mut stack: Vec<(NodeHandle, usize)> = Vec::new();

    for start in graph.nodes_in_order() {
        if visited.contains(&start) {
            continue;
        }
        visiting.insert(start);
        stack.push((start, 0));

        while let Some(frame) = stack.last_mut() {
            let (handle, next) = *frame;
            let node = graph.get(handle)?;

            if next >= node.max_inputs() {
                stack.pop();
                visiting.remove(&handle);
                visited.insert(handle);
                continue;
            }

            frame.1 += 1;
            let Some(connection) = node.input(next) else {
                continue;
            };
            let producer = connection.producer;
            if visited.contains(&producer) {
                continue;
            }
            if !visiting.insert(producer) {
                return Err(GraphError::CyclicGraph {
                    node: graph.get(producer)?.id().to_string(),
                });
            }
            stack.push((producer, 0));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use matgraph_core::ConstantValue;

    use crate::node::{BinaryOp, UnaryOp};

    #[test]
    fn test_memoized_node_emits_once_per_stage() {
        let mut graph = ShaderGraph::new();
        let k = graph
            .add_node(Node::constant("k", ConstantValue::Float(0.5)))
            .unwrap();
        graph.connect_sink(SinkSlot::Metallic, k, OutputPort::Value).unwrap();
        graph.connect_sink(SinkSlot::Roughness, k, OutputPort::Value).unwrap();

        let mut compiler = ShaderCompiler::new(&graph);
        let first = compiler.evaluate(k).unwrap();
        assert_eq!(first, "k = 0.5;\n");
        assert_eq!(compiler.evaluate(k).unwrap(), "");
        assert_eq!(
            compiler.evaluate_at_port(k, OutputPort::Value).unwrap(),
            "k"
        );
    }

    #[test]
    fn test_producers_are_evaluated_first() {
        let mut graph = ShaderGraph::new();
        let a = graph
            .add_node(Node::constant("a", ConstantValue::Float(2.0)))
            .unwrap();
        let neg = graph
            .add_node(Node::unary("neg", UnaryOp::Negate, PrimitiveType::Float))
            .unwrap();
        let sum = graph
            .add_node(Node::binary("sum", BinaryOp::Add, PrimitiveType::Float))
            .unwrap();
        graph.connect(neg, Connection::new(a, OutputPort::Value, 0)).unwrap();
        graph.connect(sum, Connection::new(neg, OutputPort::Value, 1)).unwrap();
        graph.connect(sum, Connection::new(a, OutputPort::Value, 0)).unwrap();

        let mut compiler = ShaderCompiler::new(&graph);
        let body = compiler.evaluate(sum).unwrap();
        assert_eq!(body, "a = 2.0;\nneg = -a;\nsum = a + neg;\n");
    }

    #[test]
    fn test_declarations_follow_reachability() {
        let mut graph = ShaderGraph::new();
        let tint = graph
            .add_node(Node::uniform("tint", ConstantValue::Vec3(Vec3::ONE)))
            .unwrap();
        graph
            .add_node(Node::constant("unused", ConstantValue::Float(1.0)))
            .unwrap();
        graph.connect_sink(SinkSlot::Albedo, tint, OutputPort::Value).unwrap();

        let mut compiler = ShaderCompiler::new(&graph);
        compiler.parse(Stage::Fragment).unwrap();
        assert_eq!(compiler.declarations(), ["uniform vec3 tint;".to_string()]);

        let tint_ref = compiler.manifest().get("tint").unwrap();
        assert_eq!(tint_ref.binding, None);
        assert_eq!(tint_ref.default, Some(ConstantValue::Vec3(Vec3::ONE)));

        compiler.parse(Stage::Vertex).unwrap();
        assert!(compiler.declarations().is_empty());
        assert_eq!(compiler.manifest().len(), 1);
    }

    #[test]
    fn test_generated_name_collision() {
        let mut graph = ShaderGraph::new();
        let tex = graph.add_node(Node::texture("base")).unwrap();
        let k = graph
            .add_node(Node::constant("base_sample", ConstantValue::Float(1.0)))
            .unwrap();
        graph.connect_sink(SinkSlot::Albedo, tex, OutputPort::Rgb).unwrap();
        graph.connect_sink(SinkSlot::Metallic, k, OutputPort::Value).unwrap();

        let err = ShaderCompiler::new(&graph).parse(Stage::Fragment).unwrap_err();
        assert_eq!(err, GraphError::DuplicateIdentifier("base_sample".into()));
    }

    #[test]
    fn test_reset_restarts_texture_units() {
        let mut graph = ShaderGraph::new();
        let tex = graph.add_node(Node::texture("base")).unwrap();
        graph.connect_sink(SinkSlot::Albedo, tex, OutputPort::Rgb).unwrap();
        graph.settings_mut().texture_unit_base = 3;

        let mut compiler = ShaderCompiler::new(&graph);
        compiler.parse(Stage::Fragment).unwrap();
        assert_eq!(compiler.manifest().get("base").unwrap().binding, Some(3));

        compiler.reset();
        assert!(compiler.manifest().is_empty());
        compiler.parse(Stage::Fragment).unwrap();
        assert_eq!(compiler.manifest().get("base").unwrap().binding, Some(3));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = ShaderGraph::new();
        let f = graph
            .add_node(Node::unary("f", UnaryOp::Sin, PrimitiveType::Float))
            .unwrap();
        graph.connect(f, Connection::new(f, OutputPort::Value, 0)).unwrap();

        let mut compiler = ShaderCompiler::new(&graph);
        assert_eq!(
            compiler.evaluate(f),
            Err(GraphError::CyclicGraph { node: "f".into() })
        );
    }
}
