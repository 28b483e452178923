//! Shader Graph Nodes
//!
//! A [`Node`] is one unit of the material graph. Its behaviour is selected
//! by the closed [`NodeKind`] enum; everything the assembler needs from a
//! node (declaration, statement, port expressions and types) is answered
//! here by exhaustive `match`.
//!
//! Connections are stored on the *consuming* node only and point at their
//! producer through a generation-checked [`NodeHandle`].

use std::borrow::Cow;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use matgraph_core::{
    ConstantValue, GraphError, OutputPort, PrimitiveType, Result, StorageClass, float_literal,
};

use crate::graph::NodeHandle;
use crate::sink::SinkSlot;
use crate::template::{DEFAULT_UV, RESERVED_IDENTIFIERS, TIME_UNIFORM};

/// Keywords and reserved words of GLSL 3.30 core.
const SHADER_KEYWORDS: &[&str] = &[
    // Keywords
    "attribute", "const", "uniform", "varying", "layout", "centroid", "flat", "smooth",
    "noperspective", "break", "continue", "do", "for", "while", "switch", "case", "default",
    "if", "else", "in", "out", "inout", "float", "int", "void", "bool", "true", "false",
    "invariant", "discard", "return", "mat2", "mat3", "mat4", "mat2x2", "mat2x3", "mat2x4",
    "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4", "vec2", "vec3", "vec4",
    "ivec2", "ivec3", "ivec4", "bvec2", "bvec3", "bvec4", "uint", "uvec2", "uvec3", "uvec4",
    "lowp", "mediump", "highp", "precision", "struct",
    // Sampler types
    "sampler1D", "sampler2D", "sampler3D", "samplerCube", "sampler1DShadow",
    "sampler2DShadow", "samplerCubeShadow", "sampler1DArray", "sampler2DArray",
    "sampler1DArrayShadow", "sampler2DArrayShadow", "isampler1D", "isampler2D",
    "isampler3D", "isamplerCube", "isampler1DArray", "isampler2DArray", "usampler1D",
    "usampler2D", "usampler3D", "usamplerCube", "usampler1DArray", "usampler2DArray",
    "sampler2DRect", "sampler2DRectShadow", "isampler2DRect", "usampler2DRect",
    "samplerBuffer", "isamplerBuffer", "usamplerBuffer", "sampler2DMS", "isampler2DMS",
    "usampler2DMS", "sampler2DMSArray", "isampler2DMSArray", "usampler2DMSArray",
    // Reserved for future use
    "common", "partition", "active", "asm", "class", "union", "enum", "typedef", "template",
    "this", "packed", "goto", "inline", "noinline", "volatile", "public", "static", "extern",
    "external", "interface", "long", "short", "double", "half", "fixed", "unsigned", "superp",
    "input", "output", "hvec2", "hvec3", "hvec4", "dvec2", "dvec3", "dvec4", "fvec2",
    "fvec3", "fvec4", "sampler3DRect", "filter", "image1D", "image2D", "image3D",
    "imageCube", "iimage1D", "iimage2D", "iimage3D", "iimageCube", "uimage1D", "uimage2D",
    "uimage3D", "uimageCube", "image1DArray", "image2DArray", "iimage1DArray",
    "iimage2DArray", "uimage1DArray", "uimage2DArray", "image1DShadow", "image2DShadow",
    "image1DArrayShadow", "image2DArrayShadow", "imageBuffer", "iimageBuffer",
    "uimageBuffer", "sizeof", "cast", "namespace", "using", "row_major",
];

/// Built-in functions called by generated statements and the stage templates.
/// A global of the same name would hide them.
const EMITTED_FUNCTIONS: &[&str] = &[
    "abs", "sin", "cos", "fract", "clamp", "normalize", "sqrt", "floor", "min", "max", "pow",
    "step", "texture",
];

/// A directed edge: `producer`'s `output` facet feeds input slot `input`
/// of the node that stores the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub producer: NodeHandle,
    pub output: OutputPort,
    pub input: usize,
}

impl Connection {
    #[must_use]
    pub const fn new(producer: NodeHandle, output: OutputPort, input: usize) -> Self {
        Self {
            producer,
            output,
            input,
        }
    }
}

/// Single-input math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    OneMinus,
    Abs,
    Sin,
    Cos,
    Fract,
    Saturate,
    Normalize,
    Sqrt,
    Floor,
}

impl UnaryOp {
    #[must_use]
    pub fn apply(self, x: &str) -> String {
        match self {
            Self::Negate => format!("-{x}"),
            Self::OneMinus => format!("1.0 - {x}"),
            Self::Abs => format!("abs({x})"),
            Self::Sin => format!("sin({x})"),
            Self::Cos => format!("cos({x})"),
            Self::Fract => format!("fract({x})"),
            Self::Saturate => format!("clamp({x}, 0.0, 1.0)"),
            Self::Normalize => format!("normalize({x})"),
            Self::Sqrt => format!("sqrt({x})"),
            Self::Floor => format!("floor({x})"),
        }
    }
}

/// Two-input math functions. Both operands share the node's arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Min,
    Max,
    Pow,
    Step,
}

impl BinaryOp {
    #[must_use]
    pub fn apply(self, a: &str, b: &str) -> String {
        match self {
            Self::Add => format!("{a} + {b}"),
            Self::Subtract => format!("{a} - {b}"),
            Self::Multiply => format!("{a} * {b}"),
            Self::Divide => format!("{a} / {b}"),
            Self::Min => format!("min({a}, {b})"),
            Self::Max => format!("max({a}, {b})"),
            Self::Pow => format!("pow({a}, {b})"),
            Self::Step => format!("step({a}, {b})"),
        }
    }
}

/// The closed set of node variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    /// Literal value, either inlined (`Local`) or exposed as a uniform.
    Constant { value: ConstantValue },
    /// 2D texture sample. Input 0 is the UV (defaults to the mesh UV).
    TextureSample,
    /// Scrolling UV: `uv + speed * time`. Input 0 is the UV.
    Panner { speed: Vec2 },
    Unary { op: UnaryOp, arity: PrimitiveType },
    Binary { op: BinaryOp, arity: PrimitiveType },
    /// The material output contract. Exactly one per graph.
    Sink,
}

/// A node of the material graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: String,
    storage: StorageClass,
    kind: NodeKind,
    inputs: SmallVec<[Connection; 2]>,
}

impl Node {
    /// Creates a node of any kind. [`ShaderGraph::add_node`](crate::ShaderGraph::add_node)
    /// validates the combination.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeKind, storage: StorageClass) -> Self {
        Self {
            id: id.into(),
            storage,
            kind,
            inputs: SmallVec::new(),
        }
    }

    /// Literal computed inline in `main()`.
    #[must_use]
    pub fn constant(id: impl Into<String>, value: ConstantValue) -> Self {
        Self::new(id, NodeKind::Constant { value }, StorageClass::Local)
    }

    /// Value supplied by the renderer; `value` becomes the material default.
    #[must_use]
    pub fn uniform(id: impl Into<String>, value: ConstantValue) -> Self {
        Self::new(id, NodeKind::Constant { value }, StorageClass::Uniform)
    }

    #[must_use]
    pub fn texture(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::TextureSample, StorageClass::Uniform)
    }

    #[must_use]
    pub fn panner(id: impl Into<String>, speed: Vec2) -> Self {
        Self::new(id, NodeKind::Panner { speed }, StorageClass::Local)
    }

    #[must_use]
    pub fn unary(id: impl Into<String>, op: UnaryOp, arity: PrimitiveType) -> Self {
        Self::new(id, NodeKind::Unary { op, arity }, StorageClass::Local)
    }

    #[must_use]
    pub fn binary(id: impl Into<String>, op: BinaryOp, arity: PrimitiveType) -> Self {
        Self::new(id, NodeKind::Binary { op, arity }, StorageClass::Local)
    }

    pub(crate) fn sink(id: &str) -> Self {
        Self::new(id, NodeKind::Sink, StorageClass::Local)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn storage(&self) -> StorageClass {
        self.storage
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_sink(&self) -> bool {
        matches!(self.kind, NodeKind::Sink)
    }

    /// Input connections in the order they were made.
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[Connection] {
        &self.inputs
    }

    /// The connection wired into input slot `input`, if any.
    #[must_use]
    pub fn input(&self, input: usize) -> Option<&Connection> {
        self.inputs.iter().find(|c| c.input == input)
    }

    /// Declared output arity. `None` for the sink, which produces nothing.
    #[must_use]
    pub fn arity(&self) -> Option<PrimitiveType> {
        match &self.kind {
            NodeKind::Constant { value } => Some(value.primitive_type()),
            NodeKind::TextureSample => Some(PrimitiveType::Texture2D),
            NodeKind::Panner { .. } => Some(PrimitiveType::Vec2),
            NodeKind::Unary { arity, .. } | NodeKind::Binary { arity, .. } => Some(*arity),
            NodeKind::Sink => None,
        }
    }

    #[must_use]
    pub fn max_inputs(&self) -> usize {
        match &self.kind {
            NodeKind::Constant { .. } => 0,
            NodeKind::TextureSample | NodeKind::Panner { .. } | NodeKind::Unary { .. } => 1,
            NodeKind::Binary { .. } => 2,
            NodeKind::Sink => SinkSlot::COUNT,
        }
    }

    /// Arity an input slot expects from its producer.
    #[must_use]
    pub fn input_type(&self, input: usize) -> Option<PrimitiveType> {
        if input >= self.max_inputs() {
            return None;
        }
        match &self.kind {
            NodeKind::Constant { .. } => None,
            NodeKind::TextureSample | NodeKind::Panner { .. } => Some(PrimitiveType::Vec2),
            NodeKind::Unary { arity, .. } | NodeKind::Binary { arity, .. } => Some(*arity),
            NodeKind::Sink => SinkSlot::from_index(input).map(SinkSlot::required_type),
        }
    }

    // ------------------------------------------------------------------------
    // Port contract
    // ------------------------------------------------------------------------

    /// Arity of an output facet.
    pub fn output_type(&self, port: OutputPort) -> Result<PrimitiveType> {
        match (&self.kind, port) {
            (NodeKind::TextureSample, OutputPort::Rgb) => Ok(PrimitiveType::Vec3),
            (
                NodeKind::TextureSample,
                OutputPort::R | OutputPort::G | OutputPort::B | OutputPort::A,
            ) => Ok(PrimitiveType::Float),
            (NodeKind::TextureSample | NodeKind::Sink, _) => Err(self.unknown_port(port)),
            (_, OutputPort::Value) => self.arity().ok_or_else(|| self.unknown_port(port)),
            (_, _) => Err(self.unknown_port(port)),
        }
    }

    /// Identifier expression that reads an output facet. Has no side effects.
    pub fn evaluate_at_port(&self, port: OutputPort) -> Result<String> {
        match (&self.kind, port) {
            (NodeKind::Sink, _) => Err(self.unknown_port(port)),
            (NodeKind::TextureSample, _) => port
                .swizzle()
                .map(|s| format!("{}.{s}", self.qualified_id()))
                .ok_or_else(|| self.unknown_port(port)),
            (_, OutputPort::Value) => Ok(self.id.clone()),
            (_, _) => Err(self.unknown_port(port)),
        }
    }

    /// Name under which this node's computed value is read.
    ///
    /// Texture nodes use `<id>_sample` so the sampled colour does not
    /// clash with the sampler uniform.
    #[must_use]
    pub fn qualified_id(&self) -> Cow<'_, str> {
        match self.kind {
            NodeKind::TextureSample => Cow::Owned(format!("{}_sample", self.id)),
            _ => Cow::Borrowed(&self.id),
        }
    }

    /// Global-scope declaration line. Independent of evaluation state.
    #[must_use]
    pub fn declaration(&self) -> Option<String> {
        let ty = self.arity()?;
        let line = match self.storage {
            StorageClass::Uniform => format!("uniform {} {};", ty.glsl_name(), self.id),
            StorageClass::Local => format!("{} {};", ty.glsl_name(), self.id),
        };
        Some(line)
    }

    /// The node's own statement, given its already promoted input expressions
    /// (`None` for unwired inputs). Empty for nodes without a body.
    pub(crate) fn statement(&self, inputs: &[Option<String>]) -> String {
        let input = |i: usize| inputs.get(i).and_then(Option::as_deref);
        let id = &self.id;

        match &self.kind {
            NodeKind::Constant { value } => match self.storage {
                StorageClass::Local => format!("{id} = {};", value.glsl_literal()),
                StorageClass::Uniform => String::new(),
            },
            NodeKind::TextureSample => format!(
                "vec4 {} = texture({id}, {});",
                self.qualified_id(),
                input(0).unwrap_or(DEFAULT_UV)
            ),
            NodeKind::Panner { speed } => format!(
                "{id} = {} + vec2({}, {}) * {TIME_UNIFORM};",
                input(0).unwrap_or(DEFAULT_UV),
                float_literal(speed.x),
                float_literal(speed.y)
            ),
            NodeKind::Unary { op, arity } => {
                let x = self.operand(input(0), *arity, 0);
                format!("{id} = {};", op.apply(&x))
            }
            NodeKind::Binary { op, arity } => {
                let a = self.operand(input(0), *arity, 0);
                let b = self.operand(input(1), *arity, 1);
                format!("{id} = {};", op.apply(&a, &b))
            }
            NodeKind::Sink => String::new(),
        }
    }

    fn operand(&self, expr: Option<&str>, arity: PrimitiveType, slot: usize) -> String {
        match expr {
            Some(expr) => expr.to_string(),
            None => {
                log::warn!(
                    "Node '{}' has no input on port {slot}; substituting {}",
                    self.id,
                    arity.zero_literal()
                );
                arity.zero_literal().to_string()
            }
        }
    }

    fn unknown_port(&self, port: OutputPort) -> GraphError {
        GraphError::UnknownPort {
            node: self.id.clone(),
            port,
        }
    }

    // ------------------------------------------------------------------------
    // Editing (driven by the graph)
    // ------------------------------------------------------------------------

    /// Wires `connection`, replacing whatever fed the same input slot.
    pub(crate) fn set_input(&mut self, connection: Connection) -> Option<Connection> {
        if let Some(existing) = self.inputs.iter_mut().find(|c| c.input == connection.input) {
            return Some(std::mem::replace(existing, connection));
        }
        self.inputs.push(connection);
        None
    }

    pub(crate) fn remove_input(&mut self, input: usize) -> Option<Connection> {
        let index = self.inputs.iter().position(|c| c.input == input)?;
        Some(self.inputs.remove(index))
    }

    pub(crate) fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    /// Drops every connection fed by `producer`. Returns how many were removed.
    pub(crate) fn scrub(&mut self, producer: NodeHandle) -> usize {
        let before = self.inputs.len();
        self.inputs.retain(|c| c.producer != producer);
        before - self.inputs.len()
    }

    /// Checks the identifier and the kind/storage combination.
    pub(crate) fn validate(&self) -> Result<()> {
        validate_identifier(&self.id)?;

        let invalid = |reason: &str| GraphError::InvalidNode {
            node: self.id.clone(),
            reason: reason.to_string(),
        };

        match &self.kind {
            NodeKind::Constant { value } => {
                if !value.is_finite() {
                    return Err(invalid("constant value is not finite"));
                }
            }
            NodeKind::TextureSample => {
                if self.storage != StorageClass::Uniform {
                    return Err(invalid("texture samplers must be uniforms"));
                }
            }
            NodeKind::Panner { speed } => {
                if self.storage != StorageClass::Local {
                    return Err(invalid("panners are computed locally"));
                }
                if !speed.is_finite() {
                    return Err(invalid("panner speed is not finite"));
                }
            }
            NodeKind::Unary { arity, .. } | NodeKind::Binary { arity, .. } => {
                if self.storage != StorageClass::Local {
                    return Err(invalid("function nodes are computed locally"));
                }
                if !arity.is_float_vector() {
                    return Err(invalid("function nodes operate on float or vecN values"));
                }
            }
            NodeKind::Sink => return Err(invalid("the sink is created by the graph")),
        }

        Ok(())
    }
}

/// Checks that `id` can be used verbatim as a shader identifier.
pub fn validate_identifier(id: &str) -> Result<()> {
    let mut chars = id.chars();
    let well_formed = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !well_formed || id.starts_with("gl_") || id.contains("__") {
        return Err(GraphError::InvalidIdentifier(id.to_string()));
    }
    if RESERVED_IDENTIFIERS.contains(&id)
        || SHADER_KEYWORDS.contains(&id)
        || EMITTED_FUNCTIONS.contains(&id)
    {
        return Err(GraphError::ReservedIdentifier(id.to_string()));
    }
    Ok(())
}
