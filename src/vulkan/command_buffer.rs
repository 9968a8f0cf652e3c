use ash::vk;

use crate::device::DeviceResult;
use crate::render::commands::{Cmd, CommandList};

use super::context::Context;
use super::VulkanDevice;

impl VulkanDevice {
    /// Records `record` into a fresh command buffer, submits it and waits for
    /// the queue to finish.
    pub(super) fn submit_one_time(
        &self,
        record: impl FnOnce(vk::CommandBuffer),
    ) -> DeviceResult<()> {
        let device = &self.context.device;
        let command_pool = self.command_pool.lock().expect("Command pool lock poisoned");

        let command_buffer = {
            let allocate_info = vk::CommandBufferAllocateInfo::builder()
                .command_buffer_count(1)
                .command_pool(*command_pool)
                .level(vk::CommandBufferLevel::PRIMARY);

            unsafe { device.allocate_command_buffers(&allocate_info) }?[0]
        };

        let result = (|| -> DeviceResult<()> {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe { device.begin_command_buffer(command_buffer, &begin_info) }?;

            record(command_buffer);

            unsafe { device.end_command_buffer(command_buffer) }?;

            let submit_info = vk::SubmitInfo::builder()
                .command_buffers(std::slice::from_ref(&command_buffer));
            unsafe {
                device.queue_submit(
                    self.context.queue,
                    std::slice::from_ref(&submit_info),
                    vk::Fence::null(),
                )
            }?;
            unsafe { device.queue_wait_idle(self.context.queue) }?;
            Ok(())
        })();

        unsafe { device.free_command_buffers(*command_pool, std::slice::from_ref(&command_buffer)) };
        result
    }
}

/// Translates recorded commands into calls on `command_buffer`.
pub fn replay(context: &Context, command_buffer: vk::CommandBuffer, commands: &CommandList) {
    let device = &context.device;

    for cmd in commands {
        match cmd {
            Cmd::BindDescriptorSets {
                bind_point,
                layout,
                first_set,
                sets,
            } => unsafe {
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    *bind_point,
                    *layout,
                    *first_set,
                    sets,
                    &[],
                )
            },
            Cmd::SetViewport(viewport) => unsafe {
                device.cmd_set_viewport(command_buffer, 0, std::slice::from_ref(viewport))
            },
            Cmd::SetScissor(scissor) => unsafe {
                device.cmd_set_scissor(command_buffer, 0, std::slice::from_ref(scissor))
            },
            Cmd::PushConstants {
                layout,
                stages,
                offset,
                bytes,
            } => unsafe {
                device.cmd_push_constants(command_buffer, *layout, *stages, *offset, bytes)
            },
            Cmd::BeginRenderPass {
                render_pass,
                framebuffer,
                render_area,
                clear_values,
            } => {
                let clear_values: Vec<vk::ClearValue> =
                    clear_values.iter().map(|value| value.to_vk()).collect();
                let begin_info = vk::RenderPassBeginInfo::builder()
                    .render_pass(*render_pass)
                    .framebuffer(*framebuffer)
                    .render_area(*render_area)
                    .clear_values(&clear_values);
                unsafe {
                    device.cmd_begin_render_pass(
                        command_buffer,
                        &begin_info,
                        vk::SubpassContents::INLINE,
                    )
                }
            }
            Cmd::BindPipeline {
                bind_point,
                pipeline,
            } => unsafe { device.cmd_bind_pipeline(command_buffer, *bind_point, *pipeline) },
            Cmd::DrawGeometry(draw) => unsafe {
                device.cmd_bind_vertex_buffers(
                    command_buffer,
                    0,
                    &draw.vertex_buffers,
                    &draw.vertex_offsets,
                );
                device.cmd_bind_index_buffer(
                    command_buffer,
                    draw.index_buffer,
                    draw.index_offset,
                    vk::IndexType::UINT32,
                );
                device.cmd_draw_indexed(command_buffer, draw.index_count, 1, 0, 0, 0);
            },
            Cmd::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => unsafe {
                device.cmd_draw(
                    command_buffer,
                    *vertex_count,
                    *instance_count,
                    *first_vertex,
                    *first_instance,
                )
            },
            Cmd::EndRenderPass => unsafe { device.cmd_end_render_pass(command_buffer) },
            Cmd::Barrier(dependency) => {
                let memory_barrier = vk::MemoryBarrier2::builder()
                    .src_stage_mask(dependency.src_stage)
                    .src_access_mask(dependency.src_access)
                    .dst_stage_mask(dependency.dst_stage)
                    .dst_access_mask(dependency.dst_access)
                    .build();
                let dependency_info = vk::DependencyInfo::builder()
                    .memory_barriers(std::slice::from_ref(&memory_barrier));
                unsafe {
                    context
                        .synchronisation2_loader
                        .cmd_pipeline_barrier2(command_buffer, &dependency_info)
                }
            }
            Cmd::TraceRays {
                raygen,
                miss,
                hit,
                callable,
                width,
                height,
                depth,
            } => unsafe {
                context
                    .context_raytracing
                    .ray_tracing_pipeline
                    .cmd_trace_rays(
                        command_buffer,
                        raygen,
                        miss,
                        hit,
                        callable,
                        *width,
                        *height,
                        *depth,
                    )
            },
        }
    }
}
