//! Shader Graph Type System
//!
//! Arity, storage class, stage and port enumerations shared by the node
//! model and the assembler, plus [`ConstantValue`] for literal nodes.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Value category produced by a node port or required by an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Integer,
    Mat4,
    Texture2D,
}

impl PrimitiveType {
    /// Type keyword used in generated declarations.
    #[must_use]
    pub const fn glsl_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Integer => "int",
            Self::Mat4 => "mat4",
            Self::Texture2D => "sampler2D",
        }
    }

    /// Number of float components, `None` for non-vector categories.
    #[must_use]
    pub const fn components(self) -> Option<u32> {
        match self {
            Self::Float => Some(1),
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            Self::Integer | Self::Mat4 | Self::Texture2D => None,
        }
    }

    /// Whether arithmetic function nodes may operate on this arity.
    #[inline]
    #[must_use]
    pub const fn is_float_vector(self) -> bool {
        self.components().is_some()
    }

    /// Zero literal of this arity, used when a function input is unwired.
    #[must_use]
    pub const fn zero_literal(self) -> &'static str {
        match self {
            Self::Float => "0.0",
            Self::Vec2 => "vec2(0.0)",
            Self::Vec3 => "vec3(0.0)",
            Self::Vec4 => "vec4(0.0)",
            Self::Integer => "0",
            Self::Mat4 => "mat4(0.0)",
            Self::Texture2D => "",
        }
    }
}

/// Where a node's value lives in the generated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageClass {
    /// Computed inline inside `main()`.
    #[default]
    Local,
    /// Supplied by the renderer per draw/material, declared at global scope.
    Uniform,
}

/// One of the two programs produced per compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    /// Both stages, in compile order.
    pub const ALL: [Stage; 2] = [Stage::Vertex, Stage::Fragment];

    /// Template name of the stage program.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Vertex => "material.vert",
            Self::Fragment => "material.frag",
        }
    }
}

/// Output facet of a producer node.
///
/// Texture samples expose the colour facets; every other node exposes a
/// single [`OutputPort::Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputPort {
    #[default]
    Value,
    Rgb,
    R,
    G,
    B,
    A,
}

impl OutputPort {
    /// Swizzle suffix for texture facets.
    #[must_use]
    pub const fn swizzle(self) -> Option<&'static str> {
        match self {
            Self::Value => None,
            Self::Rgb => Some("rgb"),
            Self::R => Some("r"),
            Self::G => Some("g"),
            Self::B => Some("b"),
            Self::A => Some("a"),
        }
    }
}

/// Literal value carried by a constant node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Integer(i32),
    Mat4(Mat4),
}

impl ConstantValue {
    #[must_use]
    pub const fn primitive_type(&self) -> PrimitiveType {
        match self {
            Self::Float(_) => PrimitiveType::Float,
            Self::Vec2(_) => PrimitiveType::Vec2,
            Self::Vec3(_) => PrimitiveType::Vec3,
            Self::Vec4(_) => PrimitiveType::Vec4,
            Self::Integer(_) => PrimitiveType::Integer,
            Self::Mat4(_) => PrimitiveType::Mat4,
        }
    }

    /// NaN and infinities have no literal spelling in the target language.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            Self::Vec2(v) => v.is_finite(),
            Self::Vec3(v) => v.is_finite(),
            Self::Vec4(v) => v.is_finite(),
            Self::Integer(_) => true,
            Self::Mat4(m) => m.is_finite(),
        }
    }

    /// Constructor expression for this value, e.g. `vec3(1.0, 0.5, 0.0)`.
    #[must_use]
    pub fn glsl_literal(&self) -> String {
        match self {
            Self::Float(v) => float_literal(*v),
            Self::Vec2(v) => constructor("vec2", &v.to_array()),
            Self::Vec3(v) => constructor("vec3", &v.to_array()),
            Self::Vec4(v) => constructor("vec4", &v.to_array()),
            Self::Integer(v) => v.to_string(),
            Self::Mat4(m) => constructor("mat4", &m.to_cols_array()),
        }
    }
}

/// Formats a float so the shader compiler always parses it as floating point.
#[must_use]
pub fn float_literal(v: f32) -> String {
    // Debug keeps the fractional part on whole numbers ("1.0", not "1").
    format!("{v:?}")
}

fn constructor(name: &str, values: &[f32]) -> String {
    let args: Vec<String> = values.iter().copied().map(float_literal).collect();
    format!("{name}({})", args.join(", "))
}
