//! Compiler Settings
//!
//! Knobs that shape the generated text without changing graph semantics.
//!
//! ```rust,ignore
//! use matgraph::{CompilerSettings, ShaderGraph};
//!
//! let graph = ShaderGraph::with_settings(CompilerSettings {
//!     glsl_version: 410,
//!     ..Default::default()
//! });
//! ```

use serde::{Deserialize, Serialize};

/// Configuration applied to every compile of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Value of the `#version` directive (`core` profile).
    pub glsl_version: u32,
    /// Binding unit handed to the first texture sampler of a compile.
    pub texture_unit_base: u32,
    /// Emit a `// <Slot>` comment before each sink slot.
    pub annotate_slots: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            glsl_version: 330,
            texture_unit_base: 0,
            annotate_slots: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: CompilerSettings =
            serde_json::from_str(r#"{ "texture_unit_base": 4 }"#).unwrap();
        assert_eq!(settings.glsl_version, 330);
        assert_eq!(settings.texture_unit_base, 4);
        assert!(!settings.annotate_slots);
    }
}
