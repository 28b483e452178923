//! Foundational types for the matgraph shader graph compiler.
//!
//! - [`types`]: arity, storage class, stage and port enumerations
//! - [`promotion`]: the coercion table between arities
//! - [`errors`]: the shared [`GraphError`] type

pub mod errors;
pub mod promotion;
pub mod types;

pub use errors::{GraphError, Result};
pub use promotion::promote;
pub use types::{ConstantValue, OutputPort, PrimitiveType, Stage, StorageClass, float_literal};
