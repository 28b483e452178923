//! # Matgraph Compiler
//!
//! Material graph container and GLSL code generator.
//!
//! A [`ShaderGraph`] owns the nodes of one material and its single sink.
//! [`ShaderGraph::compile`] walks the graph from the sink, emits each
//! reachable node once per stage, and wraps the result in the embedded
//! vertex and fragment templates. The returned [`CompiledShader`] also
//! lists every uniform the renderer has to bind.

pub mod compiler;
pub mod description;
pub mod graph;
pub mod manifest;
pub mod node;
pub mod settings;
pub mod sink;
pub mod template;

pub use compiler::ShaderCompiler;
pub use description::{ConnectionDescription, GraphDescription, NodeDescription};
pub use graph::{NodeHandle, ShaderGraph};
pub use manifest::{CompiledShader, UniformManifest, UniformReference};
pub use node::{BinaryOp, Connection, Node, NodeKind, UnaryOp, validate_identifier};
pub use settings::CompilerSettings;
pub use sink::{FALLBACK_COMMENT, SINK_ID, SinkSlot, SinkStep};
pub use template::{DEFAULT_UV, RESERVED_IDENTIFIERS, TIME_UNIFORM};
