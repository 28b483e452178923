//! Material Sink Contract
//!
//! The sink node is the single evaluation entry point of a graph. Its input
//! slots map one-to-one onto variables owned by the stage templates, and
//! each stage visits its slots in a fixed order.

use matgraph_core::{PrimitiveType, Stage};

/// Reserved identifier of the sink node.
pub const SINK_ID: &str = "MaterialOutput";

/// Emitted in place of an assignment when a slot has no connection.
pub const FALLBACK_COMMENT: &str = "//No valid input found!";

/// Packs the scalar channels into the material G-buffer target.
pub const MATERIAL_COMPOSITE: &str =
    "MaterialOut = vec4(Metallic, Roughness, AmbientOcclusion, 1.0);";

/// Appended after the Normal assignment: unpack [0,1] to [-1,1], then move
/// from tangent space using the template's `TBN`.
pub const NORMAL_DECODE: [&str; 2] = [
    "NormalOut.rgb = NormalOut.rgb * 2.0 - 1.0;",
    "NormalOut.rgb = normalize(TBN * NormalOut.rgb);",
];

/// Input slots of the sink node. The discriminant is the input port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkSlot {
    Albedo = 0,
    Normal = 1,
    Metallic = 2,
    Roughness = 3,
    AmbientOcclusion = 4,
    Emissive = 5,
    VertexOffset = 6,
}

impl SinkSlot {
    pub const COUNT: usize = 7;

    pub const ALL: [SinkSlot; Self::COUNT] = [
        SinkSlot::Albedo,
        SinkSlot::Normal,
        SinkSlot::Metallic,
        SinkSlot::Roughness,
        SinkSlot::AmbientOcclusion,
        SinkSlot::Emissive,
        SinkSlot::VertexOffset,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub const fn required_type(self) -> PrimitiveType {
        match self {
            Self::Metallic | Self::Roughness | Self::AmbientOcclusion => PrimitiveType::Float,
            Self::Albedo | Self::Normal | Self::Emissive | Self::VertexOffset => {
                PrimitiveType::Vec4
            }
        }
    }

    /// Template variable the slot assigns to.
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::Albedo => "AlbedoOut",
            Self::Normal => "NormalOut",
            Self::Metallic => "Metallic",
            Self::Roughness => "Roughness",
            Self::AmbientOcclusion => "AmbientOcclusion",
            Self::Emissive => "EmissiveOut",
            Self::VertexOffset => "VertexOffset",
        }
    }

    #[must_use]
    pub const fn stage(self) -> Stage {
        match self {
            Self::VertexOffset => Stage::Vertex,
            _ => Stage::Fragment,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Albedo => "Albedo",
            Self::Normal => "Normal",
            Self::Metallic => "Metallic",
            Self::Roughness => "Roughness",
            Self::AmbientOcclusion => "AO",
            Self::Emissive => "Emissive",
            Self::VertexOffset => "Vertex Offset",
        }
    }
}

/// One state of the sink's per-stage emission sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStep {
    Slot(SinkSlot),
    /// The `MaterialOut` write, after all scalar channels are known.
    Composite,
}

const VERTEX_PLAN: &[SinkStep] = &[SinkStep::Slot(SinkSlot::VertexOffset)];

const FRAGMENT_PLAN: &[SinkStep] = &[
    SinkStep::Slot(SinkSlot::Metallic),
    SinkStep::Slot(SinkSlot::Roughness),
    SinkStep::Slot(SinkSlot::AmbientOcclusion),
    SinkStep::Composite,
    SinkStep::Slot(SinkSlot::Albedo),
    SinkStep::Slot(SinkSlot::Emissive),
    SinkStep::Slot(SinkSlot::Normal),
];

impl SinkStep {
    /// Emission order for `stage`.
    #[must_use]
    pub const fn plan(stage: Stage) -> &'static [SinkStep] {
        match stage {
            Stage::Vertex => VERTEX_PLAN,
            Stage::Fragment => FRAGMENT_PLAN,
        }
    }

    /// Slots visited by `stage`, in emission order.
    pub fn slots(stage: Stage) -> impl Iterator<Item = SinkSlot> {
        Self::plan(stage).iter().filter_map(|step| match step {
            SinkStep::Slot(slot) => Some(*slot),
            SinkStep::Composite => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for slot in SinkSlot::ALL {
            assert_eq!(SinkSlot::from_index(slot.index()), Some(slot));
        }
        assert_eq!(SinkSlot::from_index(SinkSlot::COUNT), None);
    }

    #[test]
    fn test_every_slot_is_planned_once() {
        let seen: Vec<SinkSlot> = Stage::ALL.into_iter().flat_map(SinkStep::slots).collect();
        assert_eq!(seen.len(), SinkSlot::COUNT);
        for slot in &seen {
            assert_eq!(seen.iter().filter(|s| *s == slot).count(), 1);
        }
        for slot in SinkSlot::ALL {
            assert!(SinkStep::slots(slot.stage()).any(|s| s == slot));
        }
    }

    #[test]
    fn test_fragment_order() {
        let order: Vec<_> = SinkStep::slots(Stage::Fragment).collect();
        assert_eq!(
            order,
            [
                SinkSlot::Metallic,
                SinkSlot::Roughness,
                SinkSlot::AmbientOcclusion,
                SinkSlot::Albedo,
                SinkSlot::Emissive,
                SinkSlot::Normal,
            ]
        );
        assert_eq!(SinkStep::plan(Stage::Fragment)[3], SinkStep::Composite);
    }
}
