mod texture;
mod vertex;

pub use texture::*;
pub use vertex::*;

pub use crate::render::shader_types::{Light, Material};

use std::sync::Arc;

use ultraviolet::Mat4;

bitflags::bitflags! {
    /// What changed in the scene since the previous frame.
    ///
    /// Produced and cleared by the scene owner. The renderer only reads it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u32 {
        const CAMERA_VIEW = 1 << 0;
        const CAMERA_PROJ = 1 << 1;
        const LIGHTS = 1 << 2;
        const TRANSFORMS = 1 << 3;
        const MATERIALS = 1 << 4;
        const TEXTURES = 1 << 5;
        const PRIMS = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialId(pub u32);

/// Texture slot in the bound texture array. Slot 0 means "no texture".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

pub struct Primitive {
    pub geometry: Arc<Geometry>,
    pub material: MaterialId,
    pub transform: Mat4,
}

impl Primitive {
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.geometry.attributes.iter().map(|a| a.name.as_str())
    }
}

/// Read-only view of everything the renderer draws.
pub trait Scene {
    fn dirty(&self) -> DirtyFlags;

    /// The index into this slice is the primitive's id.
    fn primitives(&self) -> &[Primitive];

    fn materials(&self) -> &[Material];

    fn lights(&self) -> &[Light];

    fn light_count(&self) -> u32 {
        self.lights().len() as u32
    }

    /// Number of real textures. Valid ids are `1..=texture_count()`.
    fn texture_count(&self) -> u32;

    fn texture(&self, id: TextureId) -> &Texture;

    fn camera_view(&self) -> Mat4;

    fn camera_projection(&self) -> Mat4;

    /// World transform of the camera, the inverse of the view matrix.
    fn camera_transform(&self) -> Mat4;
}
