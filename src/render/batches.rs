use crate::scene::{
    Primitive, PrimitiveId, NORMAL_ATTRIBUTE, POSITION_ATTRIBUTE, TANGENT_ATTRIBUTE, UV_ATTRIBUTE,
};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributeSignature: u8 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const UV = 1 << 2;
        const TANGENT = 1 << 3;
    }
}

impl AttributeSignature {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .fold(AttributeSignature::empty(), |mask, name| {
                mask | match name {
                    POSITION_ATTRIBUTE => AttributeSignature::POSITION,
                    NORMAL_ATTRIBUTE => AttributeSignature::NORMAL,
                    UV_ATTRIBUTE => AttributeSignature::UV,
                    TANGENT_ATTRIBUTE => AttributeSignature::TANGENT,
                    _ => AttributeSignature::empty(),
                }
            })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("primitive {primitive:?} has unsupported vertex attributes {signature:?}")]
pub struct ClassifyError {
    pub primitive: PrimitiveId,
    pub signature: AttributeSignature,
}

/// The three supported vertex layouts, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    PosNormalUv = 0,
    PosNormalUvTangent = 1,
    Pos = 2,
}

impl BatchKind {
    pub const ALL: [BatchKind; 3] = [
        BatchKind::PosNormalUv,
        BatchKind::PosNormalUvTangent,
        BatchKind::Pos,
    ];

    pub fn from_signature(signature: AttributeSignature) -> Option<BatchKind> {
        let standard =
            AttributeSignature::POSITION | AttributeSignature::NORMAL | AttributeSignature::UV;
        if signature == standard | AttributeSignature::TANGENT {
            Some(BatchKind::PosNormalUvTangent)
        } else if signature == standard {
            Some(BatchKind::PosNormalUv)
        } else if signature == AttributeSignature::POSITION {
            Some(BatchKind::Pos)
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Vertex streams in shader location order.
    pub fn attribute_names(self) -> &'static [&'static str] {
        match self {
            BatchKind::PosNormalUv => &[POSITION_ATTRIBUTE, NORMAL_ATTRIBUTE, UV_ATTRIBUTE],
            BatchKind::PosNormalUvTangent => &[
                POSITION_ATTRIBUTE,
                NORMAL_ATTRIBUTE,
                UV_ATTRIBUTE,
                TANGENT_ATTRIBUTE,
            ],
            BatchKind::Pos => &[POSITION_ATTRIBUTE],
        }
    }
}

/// Primitive ids grouped by the pipeline that draws them.
#[derive(Debug, Default, Clone)]
pub struct DrawBatches {
    batches: [Vec<PrimitiveId>; 3],
}

impl DrawBatches {
    /// Replaces every batch. On error the previous batches stay untouched.
    pub fn classify(&mut self, primitives: &[Primitive]) -> Result<(), ClassifyError> {
        let mut batches: [Vec<PrimitiveId>; 3] = Default::default();

        for (index, primitive) in primitives.iter().enumerate() {
            let id = PrimitiveId(index as u32);
            let signature = AttributeSignature::from_names(primitive.attribute_names());
            let kind = BatchKind::from_signature(signature).ok_or(ClassifyError {
                primitive: id,
                signature,
            })?;
            batches[kind.index()].push(id);
        }

        self.batches = batches;
        Ok(())
    }

    pub fn batch(&self, kind: BatchKind) -> &[PrimitiveId] {
        &self.batches[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (BatchKind, &[PrimitiveId])> {
        BatchKind::ALL
            .into_iter()
            .map(|kind| (kind, self.batch(kind)))
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
