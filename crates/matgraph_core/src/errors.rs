//! Error Types
//!
//! This module defines the error type shared by every matgraph crate.
//!
//! # Overview
//!
//! [`GraphError`] covers the structural authoring errors a material graph
//! can contain:
//! - Identifier problems (duplicates, reserved or malformed names)
//! - Wiring problems (stale handles, unknown ports, out-of-range inputs)
//! - Compilation problems (unsupported coercions, cycles, template failures)
//!
//! A missing input on a sink slot is *not* an error: it degrades to a
//! fallback comment in the generated source.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, GraphError>`.
//!
//! ```rust,ignore
//! use matgraph_core::errors::{GraphError, Result};
//!
//! fn build() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::types::{OutputPort, PrimitiveType};

/// The main error type for graph editing and compilation.
///
/// Every variant is recoverable: the graph that produced it is left
/// untouched so an editor can show the message and let the author fix it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    // ========================================================================
    // Identifier Errors
    // ========================================================================
    /// Two nodes share an identifier, or two generated names collide.
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// The identifier shadows a name owned by the stage templates.
    #[error("Identifier is reserved by the shader templates: {0}")]
    ReservedIdentifier(String),

    /// The identifier is not a valid shader identifier.
    #[error("Invalid shader identifier: {0:?}")]
    InvalidIdentifier(String),

    // ========================================================================
    // Wiring Errors
    // ========================================================================
    /// A handle or identifier does not refer to a live node.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The sink node is owned by the graph and cannot be removed.
    #[error("The material sink node cannot be removed")]
    SinkRemoval,

    /// The producer does not expose the requested output facet.
    #[error("Node '{node}' has no output port {port:?}")]
    UnknownPort {
        /// Producer identifier
        node: String,
        /// Requested facet
        port: OutputPort,
    },

    /// The consumer does not have the requested input slot.
    #[error("Node '{node}' has no input port {port} (max {max})")]
    InvalidInputPort {
        /// Consumer identifier
        node: String,
        /// Requested input index
        port: usize,
        /// Number of inputs the consumer accepts
        max: usize,
    },

    /// The node's configuration cannot be lowered.
    #[error("Invalid node '{node}': {reason}")]
    InvalidNode {
        /// Node identifier
        node: String,
        /// Human readable reason
        reason: String,
    },

    // ========================================================================
    // Compilation Errors
    // ========================================================================
    /// No promotion rule converts the producer's arity to the required one.
    #[error("Cannot coerce {from:?} to {to:?} (input of '{node}')")]
    Coercion {
        /// Consumer identifier
        node: String,
        /// Producer arity
        from: PrimitiveType,
        /// Required arity
        to: PrimitiveType,
    },

    /// The connection graph contains a cycle through this node.
    #[error("Cycle detected in shader graph at node '{node}'")]
    CyclicGraph {
        /// First node found on the cycle
        node: String,
    },

    /// Texture units past `u32::MAX` would be needed for this sampler.
    #[error("No texture unit left for sampler '{node}'")]
    TextureUnitsExhausted {
        /// Sampler identifier
        node: String,
    },

    /// The stage template failed to load or render.
    #[error("Shader template error: {0}")]
    Template(String),

    /// A graph description could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(String),
}

/// Alias for `Result<T, GraphError>`.
pub type Result<T> = std::result::Result<T, GraphError>;
