//! Recorded GPU commands.
//!
//! Passes append [`Cmd`]s to a [`CommandList`] instead of talking to a command
//! buffer directly. The device replays the list, and tests can read it back.

use ash::vk;

use crate::scene::PrimitiveId;

/// Which part of the frame a dependency connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    GBuffer,
    Shadow,
    Composite,
}

/// An execution and memory dependency between two passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDependency {
    pub producer: PassKind,
    pub consumer: PassKind,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

impl PassDependency {
    /// G-buffer attachments are read by the shadow rays.
    pub const GBUFFER_TO_SHADOW: PassDependency = PassDependency {
        producer: PassKind::GBuffer,
        consumer: PassKind::Shadow,
        src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        dst_stage: vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
        dst_access: vk::AccessFlags2::SHADER_READ,
    };

    /// The shadow mask is read by the composite.
    pub const SHADOW_TO_COMPOSITE: PassDependency = PassDependency {
        producer: PassKind::Shadow,
        consumer: PassKind::Composite,
        src_stage: vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
        src_access: vk::AccessFlags2::SHADER_WRITE,
        dst_stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        dst_access: vk::AccessFlags2::SHADER_READ,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn to_vk(self) -> vk::ClearValue {
        match self {
            ClearValue::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            },
            ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawGeometry {
    pub primitive: PrimitiveId,
    pub vertex_buffers: Vec<vk::Buffer>,
    pub vertex_offsets: Vec<vk::DeviceSize>,
    pub index_buffer: vk::Buffer,
    pub index_offset: vk::DeviceSize,
    pub index_count: u32,
}

#[derive(Debug, Clone)]
pub enum Cmd {
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    SetViewport(vk::Viewport),
    SetScissor(vk::Rect2D),
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        bytes: Vec<u8>,
    },
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: Vec<ClearValue>,
    },
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    DrawGeometry(DrawGeometry),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    EndRenderPass,
    Barrier(PassDependency),
    TraceRays {
        raygen: vk::StridedDeviceAddressRegionKHR,
        miss: vk::StridedDeviceAddressRegionKHR,
        hit: vk::StridedDeviceAddressRegionKHR,
        callable: vk::StridedDeviceAddressRegionKHR,
        width: u32,
        height: u32,
        depth: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<Cmd>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cmd(&mut self, cmd: Cmd) {
        self.commands.push(cmd);
    }

    pub fn commands(&self) -> &[Cmd] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cmd> {
        self.commands.iter()
    }

    /// Position of the first command matching `predicate`.
    pub fn position(&self, predicate: impl FnMut(&Cmd) -> bool) -> Option<usize> {
        self.commands.iter().position(predicate)
    }

    pub fn barrier_position(&self, dependency: PassDependency) -> Option<usize> {
        self.position(|cmd| matches!(cmd, Cmd::Barrier(d) if *d == dependency))
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Cmd;
    type IntoIter = std::slice::Iter<'a, Cmd>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
