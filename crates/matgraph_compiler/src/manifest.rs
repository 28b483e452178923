//! Uniform Manifest
//!
//! The ordered list of values a compiled program expects the renderer to
//! bind, and the [`CompiledShader`] bundle returned by a compile.

use serde::Serialize;
use xxhash_rust::xxh3::Xxh3;

use matgraph_core::{ConstantValue, PrimitiveType, Stage};

/// One externally bound value of a compiled program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformReference {
    pub name: String,
    pub ty: PrimitiveType,
    /// Texture unit for samplers; plain values are bound by name.
    pub binding: Option<u32>,
    /// Material default for value uniforms.
    pub default: Option<ConstantValue>,
}

/// Uniforms in first-reference order (vertex stage first).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UniformManifest {
    entries: Vec<UniformReference>,
}

impl UniformManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `uniform` unless one with the same name is already listed.
    pub(crate) fn register(&mut self, uniform: UniformReference) -> bool {
        if self.contains(&uniform.name) {
            return false;
        }
        self.entries.push(uniform);
        true
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformReference> {
        self.entries.iter().find(|u| u.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, UniformReference> {
        self.entries.iter()
    }

    /// Sampler uniforms only, in binding order.
    #[must_use]
    pub fn textures(&self) -> impl Iterator<Item = &UniformReference> {
        self.entries
            .iter()
            .filter(|u| u.ty == PrimitiveType::Texture2D)
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[UniformReference] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a UniformManifest {
    type Item = &'a UniformReference;
    type IntoIter = std::slice::Iter<'a, UniformReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Output of [`ShaderGraph::compile`](crate::ShaderGraph::compile).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: UniformManifest,
}

impl CompiledShader {
    #[must_use]
    pub fn source(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    /// xxh3-128 over both stages; stable key for program caches.
    #[must_use]
    pub fn source_hash(&self) -> u128 {
        let mut hasher = Xxh3::new();
        hasher.update(self.vertex.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.fragment.as_bytes());
        hasher.digest128()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(name: &str, slot: u32) -> UniformReference {
        UniformReference {
            name: name.into(),
            ty: PrimitiveType::Texture2D,
            binding: Some(slot),
            default: None,
        }
    }

    #[test]
    fn test_register_keeps_first_entry() {
        let mut manifest = UniformManifest::new();
        assert!(manifest.register(sampler("albedo", 0)));
        assert!(!manifest.register(sampler("albedo", 5)));
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("albedo").unwrap().binding, Some(0));
    }

    #[test]
    fn test_textures_filter() {
        let mut manifest = UniformManifest::new();
        manifest.register(sampler("a", 0));
        manifest.register(UniformReference {
            name: "tint".into(),
            ty: PrimitiveType::Float,
            binding: None,
            default: Some(ConstantValue::Float(1.0)),
        });
        manifest.register(sampler("b", 1));

        let names: Vec<_> = manifest.textures().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_source_hash_separates_stages() {
        let a = CompiledShader {
            vertex: "ab".into(),
            fragment: "c".into(),
            uniforms: UniformManifest::new(),
        };
        let b = CompiledShader {
            vertex: "a".into(),
            fragment: "bc".into(),
            uniforms: UniformManifest::new(),
        };
        assert_ne!(a.source_hash(), b.source_hash());
        assert_eq!(a.source_hash(), a.clone().source_hash());
    }
}
