//! # Matgraph
//!
//! Node-based material graphs lowered to vertex and fragment programs.
//!
//! Build a [`ShaderGraph`], wire producers into the [`SinkSlot`]s of its
//! sink and call [`ShaderGraph::compile`]:
//!
//! ```
//! use matgraph::prelude::*;
//!
//! let mut graph = ShaderGraph::new();
//! let albedo = graph.add_node(Node::texture("albedoTex"))?;
//! graph.connect_sink(SinkSlot::Albedo, albedo, OutputPort::Rgb)?;
//!
//! let shader = graph.compile()?;
//! assert!(shader.fragment.contains("uniform sampler2D albedoTex;"));
//! assert_eq!(shader.uniforms.get("albedoTex").and_then(|u| u.binding), Some(0));
//! # Ok::<(), matgraph::GraphError>(())
//! ```
//!
//! Crates:
//! - `matgraph_core`: arities, ports, constants, promotion and errors
//! - `matgraph_compiler`: the graph container, evaluator and stage templates

pub use glam;

pub use matgraph_compiler;
pub use matgraph_core;

pub use matgraph_core::{
    ConstantValue, GraphError, OutputPort, PrimitiveType, Result, Stage, StorageClass, promote,
};

pub use matgraph_compiler::{
    BinaryOp, CompiledShader, CompilerSettings, Connection, ConnectionDescription,
    FALLBACK_COMMENT, GraphDescription, Node, NodeDescription, NodeHandle, NodeKind, SINK_ID,
    ShaderCompiler, ShaderGraph, SinkSlot, UnaryOp, UniformManifest, UniformReference,
    validate_identifier,
};

/// Everything needed to build and compile a graph.
pub mod prelude {
    pub use crate::{
        BinaryOp, CompiledShader, CompilerSettings, ConstantValue, GraphError, Node, NodeKind,
        OutputPort, PrimitiveType, ShaderGraph, SinkSlot, Stage, StorageClass, UnaryOp,
    };
    pub use glam::{Vec2, Vec3, Vec4};
}
