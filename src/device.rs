//! The graphics device as seen by the renderer.
//!
//! Everything the renderer needs from the GPU goes through [`Device`]. Handles
//! are plain `ash::vk` handles, so the renderer can hand them straight to
//! descriptor writes and recorded commands.

use std::path::PathBuf;

use ash::vk;
use ultraviolet::Mat4;

use crate::render::commands::CommandList;
use crate::scene::Geometry;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
    #[error("allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),
    #[error("could not load shader {path:?}: {source}")]
    Shader {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("geometry has no {0:?} attribute")]
    MissingAttribute(&'static str),
    #[error("unknown resource {0}")]
    UnknownResource(&'static str),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// An image together with its default view and a nearest sampler.
#[derive(Debug, Clone, Copy)]
pub struct GpuImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub layout: vk::ImageLayout,
}

/// A host-visible buffer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRegion {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachmentDesc {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

impl AttachmentDesc {
    pub fn cleared(format: vk::Format, final_layout: vk::ImageLayout) -> Self {
        Self {
            format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout,
        }
    }
}

/// A single-subpass render pass.
#[derive(Debug, Clone)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
    pub dependencies: Vec<vk::SubpassDependency>,
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
    pub partially_bound: bool,
}

impl DescriptorBinding {
    pub fn new(binding: u32, ty: vk::DescriptorType, stages: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            ty,
            count: 1,
            stages,
            partially_bound: false,
        }
    }
}

/// Descriptor sets allocated from a pool that only they use.
#[derive(Debug, Clone)]
pub struct DescriptorSets {
    pub pool: vk::DescriptorPool,
    pub sets: Vec<vk::DescriptorSet>,
}

#[derive(Debug, Clone, Copy)]
pub enum DescriptorInfo {
    UniformBuffer(BufferRegion),
    CombinedImageSampler {
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    },
    StorageImage {
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    AccelerationStructure(vk::AccelerationStructureKHR),
}

impl DescriptorInfo {
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            DescriptorInfo::UniformBuffer(_) => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorInfo::CombinedImageSampler { .. } => {
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            }
            DescriptorInfo::StorageImage { .. } => vk::DescriptorType::STORAGE_IMAGE,
            DescriptorInfo::AccelerationStructure(_) => {
                vk::DescriptorType::ACCELERATION_STRUCTURE_KHR
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorWrite {
    pub set: vk::DescriptorSet,
    pub binding: u32,
    pub array_element: u32,
    pub info: DescriptorInfo,
}

impl DescriptorWrite {
    pub fn new(set: vk::DescriptorSet, binding: u32, info: DescriptorInfo) -> Self {
        Self {
            set,
            binding,
            array_element: 0,
            info,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// One vertex binding per entry, at the location of its index.
    pub vertex_attributes: Vec<vk::Format>,
    pub color_attachment_count: u32,
    pub depth_test: bool,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    /// Fragment shader specialization constant 0.
    pub fragment_specialization: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct RayTracingPipelineDesc {
    pub layout: vk::PipelineLayout,
    pub raygen_shader: PathBuf,
    pub miss_shader: PathBuf,
    pub closest_hit_shader: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct ShaderBindingTable {
    pub buffer: vk::Buffer,
    pub raygen: vk::StridedDeviceAddressRegionKHR,
    pub miss: vk::StridedDeviceAddressRegionKHR,
    pub hit: vk::StridedDeviceAddressRegionKHR,
    pub callable: vk::StridedDeviceAddressRegionKHR,
}

#[derive(Debug, Clone, Copy)]
pub struct AccelerationStructure {
    pub handle: vk::AccelerationStructureKHR,
    pub buffer: vk::Buffer,
    pub size: vk::DeviceSize,
    pub device_address: vk::DeviceAddress,
}

#[derive(Debug, Clone, Copy)]
pub struct BlasInstance {
    pub blas: vk::DeviceAddress,
    pub transform: Mat4,
    pub custom_index: u32,
}

pub trait Device {
    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<GpuImage>;
    fn transition_image_layout(
        &self,
        image: &mut GpuImage,
        layout: vk::ImageLayout,
    ) -> DeviceResult<()>;
    fn destroy_image(&self, image: GpuImage);

    /// Host-visible memory usable as a uniform buffer.
    fn request_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> DeviceResult<BufferRegion>;
    fn write_buffer(
        &self,
        region: &BufferRegion,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> DeviceResult<()>;
    fn free_buffer(&self, region: BufferRegion);

    fn create_render_pass(&self, desc: &RenderPassDesc) -> DeviceResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> DeviceResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> DeviceResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Allocates one set per layout, in order.
    fn allocate_descriptor_sets(
        &self,
        layouts: &[vk::DescriptorSetLayout],
        bindings: &[&[DescriptorBinding]],
    ) -> DeviceResult<DescriptorSets>;
    fn free_descriptor_sets(&self, sets: DescriptorSets);
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> DeviceResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> DeviceResult<vk::Pipeline>;
    fn create_ray_tracing_pipeline(
        &self,
        desc: &RayTracingPipelineDesc,
    ) -> DeviceResult<(vk::Pipeline, ShaderBindingTable)>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);
    fn destroy_shader_binding_table(&self, table: ShaderBindingTable);

    fn build_bottom_level(&self, geometry: &Geometry) -> DeviceResult<AccelerationStructure>;
    fn build_top_level(&self, instances: &[BlasInstance]) -> DeviceResult<AccelerationStructure>;
    fn destroy_acceleration_structure(&self, acceleration_structure: AccelerationStructure);

    fn wait_idle(&self);

    /// Replays `commands` into `command_buffer`, which is already in the
    /// recording state.
    fn record_commands(&self, command_buffer: vk::CommandBuffer, commands: &CommandList);
}
