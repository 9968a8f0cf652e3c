use ash::vk;

use crate::device::{AttachmentDesc, RenderPassDesc};
use crate::render::commands::{Cmd, CommandList};

use super::{gbuffer_clear_color, FrameRecording, OutputFormat};

/// Deferred composite into the application's color target.
pub fn render_pass_desc(output: OutputFormat) -> RenderPassDesc {
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    RenderPassDesc {
        color_attachments: vec![AttachmentDesc::cleared(
            output.color,
            output.final_color_layout,
        )],
        depth_attachment: None,
        dependencies: vec![dependency],
    }
}

pub fn record(frame: &FrameRecording, commands: &mut CommandList) {
    frame.bind_descriptor_sets(commands, vk::PipelineBindPoint::GRAPHICS);

    commands.add_cmd(Cmd::BeginRenderPass {
        render_pass: frame.passes.composite,
        framebuffer: frame.framebuffers.composite,
        render_area: frame.render_area(),
        clear_values: vec![gbuffer_clear_color(frame.config)],
    });

    commands.add_cmd(Cmd::BindPipeline {
        bind_point: vk::PipelineBindPoint::GRAPHICS,
        pipeline: frame.pipelines.composite,
    });

    // Full screen triangle, positions come from the vertex index.
    commands.add_cmd(Cmd::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    });

    commands.add_cmd(Cmd::EndRenderPass);
}
