//! Promotion Rule
//!
//! Fixed table used when a producer of one arity feeds an input slot of
//! another. Vec4 slots broadcast or pad, Float slots read the first
//! channel, same-arity vectors pass through. Everything else is rejected.

use crate::errors::{GraphError, Result};
use crate::types::PrimitiveType;

/// Returns the expression that reads `id` (of arity `produced`) as `required`.
///
/// `consumer` only feeds the error message.
pub fn promote(
    id: &str,
    produced: PrimitiveType,
    required: PrimitiveType,
    consumer: &str,
) -> Result<String> {
    use PrimitiveType::{Float, Vec2, Vec3, Vec4};

    let expr = match (required, produced) {
        (Vec4, Float) => format!("vec4({id}, {id}, {id}, 1.0)"),
        (Vec4, Vec2) => format!("vec4({id}, 1.0, 1.0)"),
        (Vec4, Vec3) => format!("vec4({id}, 1.0)"),
        (Vec4, Vec4) | (Float, Float) | (Vec2, Vec2) | (Vec3, Vec3) => id.to_string(),
        (Float, Vec2 | Vec3 | Vec4) => format!("{id}.r"),
        (to, from) => {
            return Err(GraphError::Coercion {
                node: consumer.to_string(),
                from,
                to,
            });
        }
    };

    Ok(expr)
}
