//! [`Device`] on top of `ash` and `gpu-allocator`.

pub mod acceleration_structure;
pub mod buffer;
pub mod command_buffer;
pub mod context;
pub mod descriptor_set;
pub mod image;
pub mod pipeline;
pub mod shader_create_info;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator};

use crate::device::{
    AccelerationStructure, BlasInstance, BufferRegion, DescriptorBinding, DescriptorSets,
    DescriptorWrite, Device, DeviceResult, GpuImage, GraphicsPipelineDesc, ImageDesc,
    RayTracingPipelineDesc, RenderPassDesc, ShaderBindingTable,
};
use crate::render::commands::CommandList;
use crate::scene::Geometry;

use self::context::Context;

pub struct VulkanDevice {
    context: Context,
    allocator: Arc<Mutex<Allocator>>,
    command_pool: Mutex<vk::CommandPool>,
    buffers: Mutex<HashMap<vk::Buffer, Allocation>>,
    images: Mutex<HashMap<vk::Image, Allocation>>,
}

impl VulkanDevice {
    /// The allocator must have been created with `buffer_device_address`
    /// enabled.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue_family_index: u32,
        allocator: Arc<Mutex<Allocator>>,
    ) -> DeviceResult<Self> {
        let context = Context::new(instance, physical_device, device, queue_family_index);

        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .flags(
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                    | vk::CommandPoolCreateFlags::TRANSIENT,
            );
        let command_pool = unsafe { context.device.create_command_pool(&create_info, None) }?;

        Ok(Self {
            context,
            allocator,
            command_pool: Mutex::new(command_pool),
            buffers: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().expect("Allocator lock poisoned")
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe { device.device_wait_idle() }.ok();

        let mut allocator = self.allocator.lock().expect("Allocator lock poisoned");
        for (buffer, allocation) in self.buffers.get_mut().expect("Lock poisoned").drain() {
            allocator.free(allocation).ok();
            unsafe { device.destroy_buffer(buffer, None) };
        }
        for (image, allocation) in self.images.get_mut().expect("Lock poisoned").drain() {
            allocator.free(allocation).ok();
            unsafe { device.destroy_image(image, None) };
        }
        drop(allocator);

        let command_pool = *self.command_pool.get_mut().expect("Lock poisoned");
        unsafe { device.destroy_command_pool(command_pool, None) };
    }
}

impl Device for VulkanDevice {
    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<GpuImage> {
        image::create_image(self, desc)
    }

    fn transition_image_layout(
        &self,
        image: &mut GpuImage,
        layout: vk::ImageLayout,
    ) -> DeviceResult<()> {
        image::transition_layout(self, image, layout)
    }

    fn destroy_image(&self, image: GpuImage) {
        image::destroy_image(self, image)
    }

    fn request_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> DeviceResult<BufferRegion> {
        let buffer = self.allocate_buffer(
            size,
            usage,
            gpu_allocator::MemoryLocation::CpuToGpu,
            "host visible buffer",
        )?;
        Ok(BufferRegion {
            buffer,
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
        self.write_mapped(region.buffer, region.offset + offset, data)
    }

    fn free_buffer(&self, region: BufferRegion) {
        self.release_buffer(region.buffer)
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> DeviceResult<vk::RenderPass> {
        pipeline::create_render_pass(&self.context.device, desc)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.context.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> DeviceResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        Ok(unsafe { self.context.device.create_framebuffer(&create_info, None) }?)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.context.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> DeviceResult<vk::DescriptorSetLayout> {
        descriptor_set::create_set_layout(&self.context.device, bindings)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe {
            self.context
                .device
                .destroy_descriptor_set_layout(layout, None)
        };
    }

    fn allocate_descriptor_sets(
        &self,
        layouts: &[vk::DescriptorSetLayout],
        bindings: &[&[DescriptorBinding]],
    ) -> DeviceResult<DescriptorSets> {
        descriptor_set::allocate_sets(&self.context.device, layouts, bindings)
    }

    fn free_descriptor_sets(&self, sets: DescriptorSets) {
        // Destroying the pool frees its sets.
        unsafe {
            self.context
                .device
                .destroy_descriptor_pool(sets.pool, None)
        };
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        descriptor_set::update_sets(&self.context.device, writes)
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> DeviceResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        Ok(unsafe {
            self.context
                .device
                .create_pipeline_layout(&create_info, None)
        }?)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.context.device.destroy_pipeline_layout(layout, None) };
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> DeviceResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(&self.context.device, desc)
    }

    fn create_ray_tracing_pipeline(
        &self,
        desc: &RayTracingPipelineDesc,
    ) -> DeviceResult<(vk::Pipeline, ShaderBindingTable)> {
        pipeline::create_ray_tracing_pipeline(self, desc)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.context.device.destroy_pipeline(pipeline, None) };
    }

    fn destroy_shader_binding_table(&self, table: ShaderBindingTable) {
        self.release_buffer(table.buffer)
    }

    fn build_bottom_level(&self, geometry: &Geometry) -> DeviceResult<AccelerationStructure> {
        acceleration_structure::build_bottom_level(self, geometry)
    }

    fn build_top_level(&self, instances: &[BlasInstance]) -> DeviceResult<AccelerationStructure> {
        acceleration_structure::build_top_level(self, instances)
    }

    fn destroy_acceleration_structure(&self, acceleration_structure: AccelerationStructure) {
        unsafe {
            self.context
                .context_raytracing
                .acceleration_structure
                .destroy_acceleration_structure(acceleration_structure.handle, None)
        };
        self.release_buffer(acceleration_structure.buffer)
    }

    fn wait_idle(&self) {
        if let Err(err) = unsafe { self.context.device.device_wait_idle() } {
            log::error!("Waiting for the device failed: {err}");
        }
    }

    fn record_commands(&self, command_buffer: vk::CommandBuffer, commands: &CommandList) {
        command_buffer::replay(&self.context, command_buffer, commands)
    }
}
