use ash::vk;

use crate::device::{DescriptorBinding, Device};

use super::shader_types::{PrimitiveConstants, LIGHT_COUNT_OFFSET, MAX_TEXTURES};

pub const MAIN_SET: u32 = 0;
pub const DEFERRED_SET: u32 = 1;

pub mod main_bindings {
    pub const CAMERA: u32 = 0;
    pub const TRANSFORMS: u32 = 1;
    pub const LIGHTS: u32 = 2;
    pub const TEXTURES: u32 = 3;
    pub const MATERIALS: u32 = 4;
}

pub mod deferred_bindings {
    pub const POSITION: u32 = 0;
    pub const NORMAL: u32 = 1;
    pub const ALBEDO: u32 = 2;
    pub const SHADOW: u32 = 3;
    pub const ROUGHNESS: u32 = 4;
    pub const TOP_LEVEL_AS: u32 = 5;
}

/// Descriptor set layouts and the one pipeline layout shared by every pass.
pub struct RenderLayouts {
    pub main: vk::DescriptorSetLayout,
    pub deferred: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    pub main_bindings: Vec<DescriptorBinding>,
    pub deferred_bindings: Vec<DescriptorBinding>,
}

impl RenderLayouts {
    pub fn new<D: Device + ?Sized>(device: &D) -> Self {
        let main_bindings = main_set_bindings();
        let deferred_bindings = deferred_set_bindings();

        let main = device
            .create_descriptor_set_layout(&main_bindings)
            .expect("Could not create main descriptor set layout");
        let deferred = device
            .create_descriptor_set_layout(&deferred_bindings)
            .expect("Could not create deferred descriptor set layout");

        let pipeline_layout = device
            .create_pipeline_layout(&[main, deferred], &push_constant_ranges())
            .expect("Could not create pipeline layout");

        Self {
            main,
            deferred,
            pipeline_layout,
            main_bindings,
            deferred_bindings,
        }
    }

    pub fn set_layouts(&self) -> [vk::DescriptorSetLayout; 2] {
        [self.main, self.deferred]
    }

    pub fn destroy<D: Device + ?Sized>(&self, device: &D) {
        device.destroy_pipeline_layout(self.pipeline_layout);
        device.destroy_descriptor_set_layout(self.main);
        device.destroy_descriptor_set_layout(self.deferred);
    }
}

pub fn push_constant_ranges() -> [vk::PushConstantRange; 2] {
    [
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: std::mem::size_of::<PrimitiveConstants>() as u32,
        },
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::RAYGEN_KHR,
            offset: LIGHT_COUNT_OFFSET,
            size: std::mem::size_of::<u32>() as u32,
        },
    ]
}

fn main_set_bindings() -> Vec<DescriptorBinding> {
    let uniform = vk::DescriptorType::UNIFORM_BUFFER;
    vec![
        DescriptorBinding::new(
            main_bindings::CAMERA,
            uniform,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        ),
        DescriptorBinding::new(
            main_bindings::TRANSFORMS,
            uniform,
            vk::ShaderStageFlags::VERTEX,
        ),
        DescriptorBinding::new(
            main_bindings::LIGHTS,
            uniform,
            vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::RAYGEN_KHR,
        ),
        DescriptorBinding {
            count: MAX_TEXTURES as u32,
            partially_bound: true,
            ..DescriptorBinding::new(
                main_bindings::TEXTURES,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            )
        },
        DescriptorBinding::new(
            main_bindings::MATERIALS,
            uniform,
            vk::ShaderStageFlags::FRAGMENT,
        ),
    ]
}

fn deferred_set_bindings() -> Vec<DescriptorBinding> {
    let storage = vk::DescriptorType::STORAGE_IMAGE;
    let traced = vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::RAYGEN_KHR;
    vec![
        DescriptorBinding::new(deferred_bindings::POSITION, storage, traced),
        DescriptorBinding::new(deferred_bindings::NORMAL, storage, traced),
        DescriptorBinding::new(
            deferred_bindings::ALBEDO,
            storage,
            vk::ShaderStageFlags::FRAGMENT,
        ),
        DescriptorBinding::new(deferred_bindings::SHADOW, storage, traced),
        DescriptorBinding::new(
            deferred_bindings::ROUGHNESS,
            storage,
            vk::ShaderStageFlags::FRAGMENT,
        ),
        DescriptorBinding::new(
            deferred_bindings::TOP_LEVEL_AS,
            vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
            vk::ShaderStageFlags::RAYGEN_KHR,
        ),
    ]
}
