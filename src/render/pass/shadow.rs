use ash::vk;

use crate::render::commands::{Cmd, CommandList};

use super::FrameRecording;

/// One ray per pixel and light. Skipped while the scene has no geometry, so
/// an empty top level structure is never traced against.
pub fn record(frame: &FrameRecording, commands: &mut CommandList) {
    frame.bind_descriptor_sets(commands, vk::PipelineBindPoint::RAY_TRACING_KHR);

    commands.add_cmd(Cmd::BindPipeline {
        bind_point: vk::PipelineBindPoint::RAY_TRACING_KHR,
        pipeline: frame.pipelines.ray_tracing,
    });

    if !frame.has_top_level {
        return;
    }

    let table = frame.shader_binding_table;
    commands.add_cmd(Cmd::TraceRays {
        raygen: table.raygen,
        miss: table.miss,
        hit: table.hit,
        callable: table.callable,
        width: frame.extent.width,
        height: frame.extent.height,
        depth: 1,
    });
}
