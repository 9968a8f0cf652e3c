//! Shared test fixtures: a recording [`Device`] and a plain-struct [`Scene`].

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk::{self, Handle};
use ultraviolet::Mat4;

use shadow_cat::device::{
    AccelerationStructure, BlasInstance, BufferRegion, DescriptorBinding, DescriptorSets,
    DescriptorWrite, Device, DeviceError, DeviceResult, GpuImage, GraphicsPipelineDesc, ImageDesc,
    RayTracingPipelineDesc, RenderPassDesc, ShaderBindingTable,
};
use shadow_cat::render::commands::CommandList;
use shadow_cat::render::{OutputFormat, PerFrame};
use shadow_cat::scene::{
    Geometry, Light, Material, MaterialId, Primitive, Texture, TextureId, VertexAttribute,
    POSITION_ATTRIBUTE,
};
use shadow_cat::{DirtyFlags, FrameIndex, FrameTarget, Renderer, RendererConfig, Scene};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Mock device
// ============================================================================

#[derive(Default)]
pub struct MockState {
    next_handle: u64,
    /// Every object created and not yet destroyed, by kind.
    pub live: HashSet<(&'static str, u64)>,
    pub buffers: HashMap<u64, Vec<u8>>,
    pub images: Vec<ImageDesc>,
    pub destroyed_images: usize,
    pub descriptor_writes: Vec<DescriptorWrite>,
    pub graphics_pipelines: Vec<GraphicsPipelineDesc>,
    pub ray_tracing_pipelines: Vec<RayTracingPipelineDesc>,
    pub recorded: Vec<CommandList>,
    pub bottom_level_builds: usize,
    pub top_level_builds: Vec<Vec<BlasInstance>>,
    pub wait_idle_calls: usize,
}

impl MockState {
    fn create(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        self.live.insert((kind, self.next_handle));
        self.next_handle
    }

    fn destroy(&mut self, kind: &'static str, raw: u64) {
        assert!(
            self.live.remove(&(kind, raw)),
            "destroyed {kind} {raw} which is not alive"
        );
    }

    pub fn live_count(&self, kind: &str) -> usize {
        self.live.iter().filter(|(k, _)| *k == kind).count()
    }
}

#[derive(Default)]
pub struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn buffer_bytes(&self, region: &BufferRegion) -> Vec<u8> {
        self.state().buffers[&region.buffer.as_raw()].clone()
    }

    /// Descriptor writes issued since `start`.
    pub fn writes_since(&self, start: usize) -> Vec<DescriptorWrite> {
        self.state().descriptor_writes[start..].to_vec()
    }

    pub fn write_count(&self) -> usize {
        self.state().descriptor_writes.len()
    }
}

impl Device for MockDevice {
    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<GpuImage> {
        let mut state = self.state();
        state.images.push(*desc);
        Ok(GpuImage {
            image: vk::Image::from_raw(state.create("image")),
            view: vk::ImageView::from_raw(state.create("image view")),
            sampler: vk::Sampler::from_raw(state.create("sampler")),
            format: desc.format,
            extent: desc.extent,
            layout: vk::ImageLayout::UNDEFINED,
        })
    }

    fn transition_image_layout(
        &self,
        image: &mut GpuImage,
        layout: vk::ImageLayout,
    ) -> DeviceResult<()> {
        image.layout = layout;
        Ok(())
    }

    fn destroy_image(&self, image: GpuImage) {
        let mut state = self.state();
        state.destroy("sampler", image.sampler.as_raw());
        state.destroy("image view", image.view.as_raw());
        state.destroy("image", image.image.as_raw());
        state.destroyed_images += 1;
    }

    fn request_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
    ) -> DeviceResult<BufferRegion> {
        let mut state = self.state();
        let raw = state.create("buffer");
        state.buffers.insert(raw, vec![0xcd; size as usize]);
        Ok(BufferRegion {
            buffer: vk::Buffer::from_raw(raw),
            offset: 0,
            size,
        })
    }

    fn write_buffer(
        &self,
        region: &BufferRegion,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> DeviceResult<()> {
        let mut state = self.state();
        let bytes = state
            .buffers
            .get_mut(&region.buffer.as_raw())
            .ok_or(DeviceError::UnknownResource("buffer"))?;
        let start = (region.offset + offset) as usize;
        bytes
            .get_mut(start..start + data.len())
            .ok_or(DeviceError::UnknownResource("buffer range"))?
            .copy_from_slice(data);
        Ok(())
    }

    fn free_buffer(&self, region: BufferRegion) {
        let mut state = self.state();
        state.destroy("buffer", region.buffer.as_raw());
        state.buffers.remove(&region.buffer.as_raw());
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc) -> DeviceResult<vk::RenderPass> {
        Ok(vk::RenderPass::from_raw(self.state().create("render pass")))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state().destroy("render pass", render_pass.as_raw());
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> DeviceResult<vk::Framebuffer> {
        Ok(vk::Framebuffer::from_raw(self.state().create("framebuffer")))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state().destroy("framebuffer", framebuffer.as_raw());
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[DescriptorBinding],
    ) -> DeviceResult<vk::DescriptorSetLayout> {
        Ok(vk::DescriptorSetLayout::from_raw(
            self.state().create("set layout"),
        ))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state().destroy("set layout", layout.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        layouts: &[vk::DescriptorSetLayout],
        _bindings: &[&[DescriptorBinding]],
    ) -> DeviceResult<DescriptorSets> {
        let mut state = self.state();
        let pool = vk::DescriptorPool::from_raw(state.create("descriptor pool"));
        let sets = layouts
            .iter()
            .map(|_| {
                state.next_handle += 1;
                vk::DescriptorSet::from_raw(state.next_handle)
            })
            .collect();
        Ok(DescriptorSets { pool, sets })
    }

    fn free_descriptor_sets(&self, sets: DescriptorSets) {
        self.state().destroy("descriptor pool", sets.pool.as_raw());
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        self.state().descriptor_writes.extend_from_slice(writes);
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
        _push_constant_ranges: &[vk::PushConstantRange],
    ) -> DeviceResult<vk::PipelineLayout> {
        Ok(vk::PipelineLayout::from_raw(
            self.state().create("pipeline layout"),
        ))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state().destroy("pipeline layout", layout.as_raw());
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> DeviceResult<vk::Pipeline> {
        let mut state = self.state();
        state.graphics_pipelines.push(desc.clone());
        Ok(vk::Pipeline::from_raw(state.create("pipeline")))
    }

    fn create_ray_tracing_pipeline(
        &self,
        desc: &RayTracingPipelineDesc,
    ) -> DeviceResult<(vk::Pipeline, ShaderBindingTable)> {
        let mut state = self.state();
        state.ray_tracing_pipelines.push(desc.clone());
        let pipeline = vk::Pipeline::from_raw(state.create("pipeline"));
        let buffer = vk::Buffer::from_raw(state.create("shader binding table"));
        let region = |group: u64| vk::StridedDeviceAddressRegionKHR {
            device_address: 0x1000 + group * 64,
            stride: 32,
            size: 32,
        };
        Ok((
            pipeline,
            ShaderBindingTable {
                buffer,
                raygen: region(0),
                miss: region(1),
                hit: region(2),
                callable: vk::StridedDeviceAddressRegionKHR::default(),
            },
        ))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state().destroy("pipeline", pipeline.as_raw());
    }

    fn destroy_shader_binding_table(&self, table: ShaderBindingTable) {
        self.state()
            .destroy("shader binding table", table.buffer.as_raw());
    }

    fn build_bottom_level(&self, geometry: &Geometry) -> DeviceResult<AccelerationStructure> {
        geometry
            .attribute(POSITION_ATTRIBUTE)
            .ok_or(DeviceError::MissingAttribute(POSITION_ATTRIBUTE))?;

        let mut state = self.state();
        state.bottom_level_builds += 1;
        let handle = state.create("acceleration structure");
        Ok(AccelerationStructure {
            handle: vk::AccelerationStructureKHR::from_raw(handle),
            buffer: vk::Buffer::from_raw(state.create("acceleration structure buffer")),
            size: 1024,
            device_address: 0x10_0000 + handle,
        })
    }

    fn build_top_level(&self, instances: &[BlasInstance]) -> DeviceResult<AccelerationStructure> {
        let mut state = self.state();
        state.top_level_builds.push(instances.to_vec());
        let handle = state.create("acceleration structure");
        Ok(AccelerationStructure {
            handle: vk::AccelerationStructureKHR::from_raw(handle),
            buffer: vk::Buffer::from_raw(state.create("acceleration structure buffer")),
            size: 64 * instances.len() as vk::DeviceSize,
            device_address: 0x10_0000 + handle,
        })
    }

    fn destroy_acceleration_structure(&self, acceleration_structure: AccelerationStructure) {
        let mut state = self.state();
        state.destroy(
            "acceleration structure",
            acceleration_structure.handle.as_raw(),
        );
        state.destroy(
            "acceleration structure buffer",
            acceleration_structure.buffer.as_raw(),
        );
    }

    fn wait_idle(&self) {
        self.state().wait_idle_calls += 1;
    }

    fn record_commands(&self, _command_buffer: vk::CommandBuffer, commands: &CommandList) {
        self.state().recorded.push(commands.clone());
    }
}

// ============================================================================
// Test scene
// ============================================================================

pub struct TestScene {
    pub dirty: DirtyFlags,
    pub primitives: Vec<Primitive>,
    pub materials: Vec<Material>,
    pub lights: Vec<Light>,
    pub textures: Vec<Texture>,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for TestScene {
    fn default() -> Self {
        Self {
            dirty: DirtyFlags::empty(),
            primitives: vec![],
            materials: vec![material([1.0, 1.0, 1.0])],
            lights: vec![point_light([0.0, 5.0, 0.0])],
            textures: vec![],
            view: Mat4::identity(),
            projection: Mat4::identity(),
        }
    }
}

impl Scene for TestScene {
    fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    fn materials(&self) -> &[Material] {
        &self.materials
    }

    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn texture_count(&self) -> u32 {
        self.textures.len() as u32
    }

    fn texture(&self, id: TextureId) -> &Texture {
        &self.textures[id.0 as usize - 1]
    }

    fn camera_view(&self) -> Mat4 {
        self.view
    }

    fn camera_projection(&self) -> Mat4 {
        self.projection
    }

    fn camera_transform(&self) -> Mat4 {
        self.view.inversed()
    }
}

/// Handles for objects the scene owns. Far away from the mock's counter.
fn scene_handle(index: u64) -> u64 {
    0xff00_0000 + index
}

pub fn geometry(names: &[&str]) -> Arc<Geometry> {
    let buffer = vk::Buffer::from_raw(scene_handle(1));
    Arc::new(Geometry {
        attributes: names
            .iter()
            .enumerate()
            .map(|(index, name)| VertexAttribute::new(name, buffer, index as u64 * 1024))
            .collect(),
        vertex_count: 3,
        index_buffer: vk::Buffer::from_raw(scene_handle(2)),
        index_offset: 0,
        index_count: 3,
    })
}

pub fn primitive(names: &[&str]) -> Primitive {
    Primitive {
        geometry: geometry(names),
        material: MaterialId(0),
        transform: Mat4::identity(),
    }
}

pub fn material(color: [f32; 3]) -> Material {
    Material {
        color,
        roughness: 0.5,
        texture_albedo: 0,
        texture_roughness: 0,
        texture_normal: 0,
        _padding: 0,
    }
}

pub fn point_light(position: [f32; 3]) -> Light {
    Light {
        position,
        intensity: 10.0,
        color: [1.0, 1.0, 1.0],
        kind: Light::POINT,
    }
}

pub fn texture(index: u64) -> Texture {
    Texture::new(
        vk::ImageView::from_raw(scene_handle(100 + index)),
        vk::Sampler::from_raw(scene_handle(200 + index)),
    )
}

// ============================================================================
// Renderer setup
// ============================================================================

pub const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

pub fn output_format() -> OutputFormat {
    OutputFormat {
        color: vk::Format::B8G8R8A8_SRGB,
        depth: vk::Format::D32_SFLOAT,
        final_color_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        final_depth_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    }
}

/// A swapchain image of `extent`. Different generations get different views.
pub fn target(index: usize, extent: vk::Extent2D, generation: u64) -> FrameTarget {
    FrameTarget {
        index: FrameIndex::new(index),
        color: vk::ImageView::from_raw(scene_handle(1000 + generation * 10 + index as u64)),
        depth: vk::ImageView::from_raw(scene_handle(2000 + generation * 10 + index as u64)),
        extent,
        resized: false,
    }
}

pub fn renderer_with(device: &Arc<MockDevice>, config: RendererConfig) -> Renderer<MockDevice> {
    init_logging();
    let targets = PerFrame::from_fn(|index| target(index.get(), EXTENT, 0));
    Renderer::new(device.clone(), config, output_format(), &targets)
}

pub fn renderer(device: &Arc<MockDevice>) -> Renderer<MockDevice> {
    renderer_with(device, RendererConfig::default())
}

/// Renders `count` frames, alternating slots starting at `first`, and
/// clears the scene's dirty flags after the first one.
pub fn render_frames(
    renderer: &mut Renderer<MockDevice>,
    scene: &mut TestScene,
    first: usize,
    count: usize,
) -> Vec<bool> {
    (0..count)
        .map(|frame| {
            let target = target((first + frame) % 2, EXTENT, 0);
            let recorded = renderer.render(&*scene, &target, vk::CommandBuffer::null());
            scene.dirty = DirtyFlags::empty();
            recorded
        })
        .collect()
}
