use bytemuck::{Pod, Zeroable};
use ultraviolet::Mat4;

/// Width of the shadow visibility mask, one bit per light.
pub const MAX_LIGHTS: usize = 16;
pub const MAX_MATERIALS: usize = 10;
/// Size of the texture array. Slot 0 stays unused.
pub const MAX_TEXTURES: usize = 10;
pub const MAX_TRANSFORMS: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Camera {
    pub view: Mat4,
    pub proj: Mat4,
    pub camera: Mat4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Light {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub kind: u32,
}

impl Light {
    pub const POINT: u32 = 0;
    pub const DIRECTIONAL: u32 = 1;
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightArray {
    pub lights: [Light; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Material {
    pub color: [f32; 3],
    pub roughness: f32,
    pub texture_albedo: u32,
    pub texture_roughness: u32,
    pub texture_normal: u32,
    pub _padding: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MaterialArray {
    pub materials: [Material; MAX_MATERIALS],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct TransformArray {
    pub transforms: [Mat4; MAX_TRANSFORMS],
}

/// Vertex stage push constants, one block per drawn primitive.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PrimitiveConstants {
    pub transform: Mat4,
    pub primitive_id: u32,
    pub material_id: u32,
}

/// Offset of the light count, right after [`PrimitiveConstants`].
pub const LIGHT_COUNT_OFFSET: u32 = std::mem::size_of::<PrimitiveConstants>() as u32;
