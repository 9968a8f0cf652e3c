use ash::vk;

use crate::device::{AttachmentDesc, RenderPassDesc};
use crate::render::commands::{ClearValue, Cmd, CommandList, DrawGeometry};
use crate::render::gbuffer::GBuffer;
use crate::render::shader_types::PrimitiveConstants;

use super::{gbuffer_clear_color, gbuffer_formats, FrameRecording};

pub fn render_pass_desc() -> RenderPassDesc {
    let color_attachments = gbuffer_formats()
        .into_iter()
        .map(|format| AttachmentDesc::cleared(format, vk::ImageLayout::GENERAL))
        .collect();

    let depth_attachment = AttachmentDesc {
        store_op: vk::AttachmentStoreOp::DONT_CARE,
        ..AttachmentDesc::cleared(
            GBuffer::DEPTH_FORMAT,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
    };

    // The previous frame's shadow and composite passes read these attachments.
    let dependencies = vec![
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::FRAGMENT_SHADER
                    | vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR,
            )
            .src_access_mask(vk::AccessFlags::SHADER_READ)
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build(),
        vk::SubpassDependency::builder()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .build(),
    ];

    RenderPassDesc {
        color_attachments,
        depth_attachment: Some(depth_attachment),
        dependencies,
    }
}

pub fn clear_values(frame: &FrameRecording) -> Vec<ClearValue> {
    let color = gbuffer_clear_color(frame.config);
    vec![
        color,
        color,
        color,
        ClearValue::Color([0.0, 0.0, 0.0, 0.0]),
        ClearValue::DepthStencil {
            depth: 1.0,
            stencil: 0,
        },
    ]
}

pub fn record(frame: &FrameRecording, commands: &mut CommandList) {
    commands.add_cmd(Cmd::BeginRenderPass {
        render_pass: frame.passes.gbuffer,
        framebuffer: frame.framebuffers.gbuffer,
        render_area: frame.render_area(),
        clear_values: clear_values(frame),
    });

    let primitives = frame.scene.primitives();

    for (kind, batch) in frame.batches.iter() {
        commands.add_cmd(Cmd::BindPipeline {
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            pipeline: frame.pipelines.gbuffer(kind),
        });

        for &id in batch {
            let primitive = &primitives[id.0 as usize];
            let constants = PrimitiveConstants {
                transform: primitive.transform,
                primitive_id: id.0,
                material_id: primitive.material.0,
            };

            commands.add_cmd(Cmd::PushConstants {
                layout: frame.pipeline_layout,
                stages: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                bytes: bytemuck::bytes_of(&constants).to_vec(),
            });

            let geometry = &primitive.geometry;
            let streams: Vec<_> = kind
                .attribute_names()
                .iter()
                .filter_map(|name| geometry.attribute(name))
                .collect();
            commands.add_cmd(Cmd::DrawGeometry(DrawGeometry {
                primitive: id,
                vertex_buffers: streams.iter().map(|a| a.buffer).collect(),
                vertex_offsets: streams.iter().map(|a| a.offset).collect(),
                index_buffer: geometry.index_buffer,
                index_offset: geometry.index_offset,
                index_count: geometry.index_count,
            }));
        }
    }

    commands.add_cmd(Cmd::EndRenderPass);
}
