use ash::vk;

use crate::config::RendererConfig;
use crate::device::{
    Device, GraphicsPipelineDesc, RayTracingPipelineDesc, ShaderBindingTable,
};
use crate::scene::attribute_format;

use super::batches::BatchKind;
use super::pass::RenderPasses;

pub struct Pipelines {
    gbuffer: [vk::Pipeline; 3],
    pub composite: vk::Pipeline,
    pub ray_tracing: vk::Pipeline,
}

fn gbuffer_shaders(kind: BatchKind) -> (&'static str, &'static str) {
    match kind {
        BatchKind::PosNormalUv => ("regular.vert", "gbuffer.frag"),
        BatchKind::PosNormalUvTangent => ("tangent.vert", "gbuffertan.frag"),
        BatchKind::Pos => ("pos.vert", "gbufferpos.frag"),
    }
}

impl Pipelines {
    pub fn new<D: Device + ?Sized>(
        device: &D,
        config: &RendererConfig,
        passes: &RenderPasses,
        layout: vk::PipelineLayout,
    ) -> (Self, ShaderBindingTable) {
        let gbuffer = BatchKind::ALL.map(|kind| {
            let (vertex, fragment) = gbuffer_shaders(kind);
            let desc = GraphicsPipelineDesc {
                render_pass: passes.gbuffer,
                layout,
                vertex_shader: config.shader_path(vertex),
                fragment_shader: config.shader_path(fragment),
                vertex_attributes: kind
                    .attribute_names()
                    .iter()
                    .map(|name| attribute_format(name))
                    .collect(),
                color_attachment_count: 4,
                depth_test: true,
                cull_mode: vk::CullModeFlags::BACK,
                front_face: vk::FrontFace::CLOCKWISE,
                fragment_specialization: (kind == BatchKind::Pos)
                    .then(|| config.position_only_sign()),
            };
            device
                .create_graphics_pipeline(&desc)
                .expect("Could not create gbuffer pipeline")
        });

        let composite = device
            .create_graphics_pipeline(&GraphicsPipelineDesc {
                render_pass: passes.composite,
                layout,
                vertex_shader: config.shader_path("fullscreen.vert"),
                fragment_shader: config.shader_path("deferred.frag"),
                vertex_attributes: vec![],
                color_attachment_count: 1,
                depth_test: false,
                cull_mode: vk::CullModeFlags::NONE,
                front_face: vk::FrontFace::CLOCKWISE,
                fragment_specialization: None,
            })
            .expect("Could not create composite pipeline");

        let (ray_tracing, shader_binding_table) = device
            .create_ray_tracing_pipeline(&RayTracingPipelineDesc {
                layout,
                raygen_shader: config.shader_path("shadow.rgen"),
                miss_shader: config.shader_path("shadow.rmiss"),
                closest_hit_shader: config.shader_path("shadow.rchit"),
            })
            .expect("Could not create ray tracing pipeline");

        log::info!("Created pipelines from {:?}", config.shader_directory);

        (
            Self {
                gbuffer,
                composite,
                ray_tracing,
            },
            shader_binding_table,
        )
    }

    pub fn gbuffer(&self, kind: BatchKind) -> vk::Pipeline {
        self.gbuffer[kind.index()]
    }

    pub fn destroy<D: Device + ?Sized>(&self, device: &D) {
        for pipeline in self.gbuffer {
            device.destroy_pipeline(pipeline);
        }
        device.destroy_pipeline(self.composite);
        device.destroy_pipeline(self.ray_tracing);
    }
}
