pub mod geometry;
pub mod lighting;
pub mod shadow;

use ash::vk;

use crate::config::RendererConfig;
use crate::device::{AttachmentDesc, Device, RenderPassDesc, ShaderBindingTable};
use crate::scene::Scene;

use super::batches::DrawBatches;
use super::commands::{Cmd, CommandList, PassDependency};
use super::framebuffers::FrameFramebuffers;
use super::gbuffer::GBuffer;
use super::pipelines::Pipelines;
use super::shader_types::LIGHT_COUNT_OFFSET;

/// The three render passes. Only the geometry and composite passes are
/// recorded every frame, the presentation pass is there for overlays drawn
/// by the application on top of the composite.
pub struct RenderPasses {
    pub present: vk::RenderPass,
    pub gbuffer: vk::RenderPass,
    pub composite: vk::RenderPass,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputFormat {
    pub color: vk::Format,
    pub depth: vk::Format,
    pub final_color_layout: vk::ImageLayout,
    pub final_depth_layout: vk::ImageLayout,
}

impl RenderPasses {
    pub fn new<D: Device + ?Sized>(device: &D, output: OutputFormat) -> Self {
        let present = device
            .create_render_pass(&RenderPassDesc {
                color_attachments: vec![AttachmentDesc::cleared(
                    output.color,
                    output.final_color_layout,
                )],
                depth_attachment: Some(AttachmentDesc::cleared(
                    output.depth,
                    output.final_depth_layout,
                )),
                dependencies: vec![],
            })
            .expect("Could not create presentation render pass");

        let gbuffer = device
            .create_render_pass(&geometry::render_pass_desc())
            .expect("Could not create gbuffer render pass");

        let composite = device
            .create_render_pass(&lighting::render_pass_desc(output))
            .expect("Could not create composite render pass");

        Self {
            present,
            gbuffer,
            composite,
        }
    }

    pub fn destroy<D: Device + ?Sized>(&self, device: &D) {
        device.destroy_render_pass(self.present);
        device.destroy_render_pass(self.gbuffer);
        device.destroy_render_pass(self.composite);
    }
}

/// Everything one frame's command sequence is recorded from.
pub struct FrameRecording<'a> {
    pub scene: &'a dyn Scene,
    pub config: &'a RendererConfig,
    pub batches: &'a DrawBatches,
    pub passes: &'a RenderPasses,
    pub framebuffers: &'a FrameFramebuffers,
    pub pipelines: &'a Pipelines,
    pub shader_binding_table: &'a ShaderBindingTable,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub extent: vk::Extent2D,
    pub light_count: u32,
    /// Whether a populated top level acceleration structure is bound.
    pub has_top_level: bool,
}

impl FrameRecording<'_> {
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    pub fn viewport(&self) -> vk::Viewport {
        let width = self.extent.width as f32;
        let height = self.extent.height as f32;
        if self.config.flip_viewport {
            vk::Viewport {
                x: 0.0,
                y: height,
                width,
                height: -height,
                min_depth: 0.0,
                max_depth: 1.0,
            }
        } else {
            vk::Viewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                min_depth: 0.0,
                max_depth: 1.0,
            }
        }
    }

    pub fn bind_descriptor_sets(&self, commands: &mut CommandList, bind_point: vk::PipelineBindPoint) {
        commands.add_cmd(Cmd::BindDescriptorSets {
            bind_point,
            layout: self.pipeline_layout,
            first_set: 0,
            sets: self.descriptor_sets.clone(),
        });
    }
}

/// Records geometry, shadow and composite passes with their barriers.
pub fn record_frame(frame: &FrameRecording) -> CommandList {
    let mut commands = CommandList::new();

    frame.bind_descriptor_sets(&mut commands, vk::PipelineBindPoint::GRAPHICS);
    commands.add_cmd(Cmd::SetViewport(frame.viewport()));
    commands.add_cmd(Cmd::SetScissor(frame.render_area()));
    commands.add_cmd(Cmd::PushConstants {
        layout: frame.pipeline_layout,
        stages: vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::RAYGEN_KHR,
        offset: LIGHT_COUNT_OFFSET,
        bytes: bytemuck::bytes_of(&frame.light_count).to_vec(),
    });

    geometry::record(frame, &mut commands);

    commands.add_cmd(Cmd::Barrier(PassDependency::GBUFFER_TO_SHADOW));

    shadow::record(frame, &mut commands);

    commands.add_cmd(Cmd::Barrier(PassDependency::SHADOW_TO_COMPOSITE));

    lighting::record(frame, &mut commands);

    commands
}

pub(crate) fn gbuffer_clear_color(config: &RendererConfig) -> super::commands::ClearValue {
    super::commands::ClearValue::Color(config.clear_color)
}

pub(crate) fn gbuffer_formats() -> [vk::Format; 4] {
    [
        GBuffer::POSITION_FORMAT,
        GBuffer::NORMAL_FORMAT,
        GBuffer::ALBEDO_FORMAT,
        GBuffer::ROUGHNESS_FORMAT,
    ]
}
