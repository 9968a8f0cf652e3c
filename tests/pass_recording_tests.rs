//! Frame recording tests
//!
//! Tests for:
//! - Pass order and the barriers between them
//! - Pipelines bound per batch
//! - Position-only primitives end to end
//! - Viewport convention

mod common;

use ash::vk;
use common::*;
use shadow_cat::render::batches::BatchKind;
use shadow_cat::render::commands::{Cmd, CommandList, PassDependency};
use shadow_cat::render::shader_types::PrimitiveConstants;
use shadow_cat::{FrameIndex, RendererConfig};

fn render_pass_positions(commands: &CommandList) -> Vec<usize> {
    commands
        .iter()
        .enumerate()
        .filter(|(_, cmd)| matches!(cmd, Cmd::BeginRenderPass { .. }))
        .map(|(index, _)| index)
        .collect()
}

fn recorded_frame(scene: &mut TestScene) -> CommandList {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    render_frames(&mut renderer, scene, 0, 1);
    let commands = renderer.recorded_commands(FrameIndex::new(0)).unwrap().clone();
    commands
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn barriers_separate_the_passes() {
    let mut scene = TestScene {
        primitives: vec![primitive(&["pos", "N", "uv"])],
        ..Default::default()
    };
    let commands = recorded_frame(&mut scene);

    let passes = render_pass_positions(&commands);
    assert_eq!(passes.len(), 2);

    let end_gbuffer = commands
        .position(|cmd| matches!(cmd, Cmd::EndRenderPass))
        .unwrap();
    let to_shadow = commands
        .barrier_position(PassDependency::GBUFFER_TO_SHADOW)
        .unwrap();
    let trace = commands
        .position(|cmd| matches!(cmd, Cmd::TraceRays { .. }))
        .unwrap();
    let to_composite = commands
        .barrier_position(PassDependency::SHADOW_TO_COMPOSITE)
        .unwrap();

    assert!(passes[0] < end_gbuffer);
    assert!(end_gbuffer < to_shadow);
    assert!(to_shadow < trace);
    assert!(trace < to_composite);
    assert!(to_composite < passes[1]);
}

#[test]
fn barrier_stages_match_producer_and_consumer() {
    let to_shadow = PassDependency::GBUFFER_TO_SHADOW;
    assert_eq!(
        to_shadow.src_stage,
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
    );
    assert_eq!(
        to_shadow.dst_stage,
        vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR
    );

    let to_composite = PassDependency::SHADOW_TO_COMPOSITE;
    assert_eq!(to_composite.src_access, vk::AccessFlags2::SHADER_WRITE);
    assert_eq!(
        to_composite.dst_stage,
        vk::PipelineStageFlags2::FRAGMENT_SHADER
    );
}

#[test]
fn composite_draws_a_fullscreen_triangle() {
    let mut scene = TestScene::default();
    let commands = recorded_frame(&mut scene);

    let composite = *render_pass_positions(&commands).last().unwrap();
    let draw = commands.commands()[composite..]
        .iter()
        .find(|cmd| matches!(cmd, Cmd::Draw { .. }))
        .unwrap();
    assert!(matches!(
        draw,
        Cmd::Draw {
            vertex_count: 3,
            instance_count: 1,
            ..
        }
    ));
    assert!(matches!(commands.commands().last(), Some(Cmd::EndRenderPass)));
}

// ============================================================================
// Geometry pass
// ============================================================================

#[test]
fn each_batch_binds_its_pipeline_before_drawing() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene {
        primitives: vec![
            primitive(&["pos"]),
            primitive(&["pos", "N", "uv", "tan"]),
            primitive(&["pos", "N", "uv"]),
        ],
        ..Default::default()
    };
    render_frames(&mut renderer, &mut scene, 0, 1);
    let commands = renderer.recorded_commands(FrameIndex::new(0)).unwrap();

    let mut bound = None;
    let mut drawn = vec![];
    for cmd in commands {
        match cmd {
            Cmd::BindPipeline {
                bind_point: vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            } => bound = Some(*pipeline),
            Cmd::DrawGeometry(draw) => drawn.push((draw.primitive.0, bound.unwrap())),
            _ => {}
        }
    }

    let pipelines = renderer.pipelines();
    assert_eq!(
        drawn,
        vec![
            (2, pipelines.gbuffer(BatchKind::PosNormalUv)),
            (1, pipelines.gbuffer(BatchKind::PosNormalUvTangent)),
            (0, pipelines.gbuffer(BatchKind::Pos)),
        ]
    );
}

#[test]
fn position_only_primitive_end_to_end() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene {
        primitives: vec![primitive(&["pos"])],
        ..Default::default()
    };
    render_frames(&mut renderer, &mut scene, 0, 1);

    assert_eq!(renderer.batches().batch(BatchKind::Pos).len(), 1);
    assert_eq!(renderer.raytracing_scene().bottom_level_count(), 1);

    let commands = renderer.recorded_commands(FrameIndex::new(0)).unwrap();
    let constants = commands
        .iter()
        .find_map(|cmd| match cmd {
            Cmd::PushConstants {
                stages, bytes, ..
            } if *stages == vk::ShaderStageFlags::VERTEX => Some(bytes.clone()),
            _ => None,
        })
        .unwrap();
    let constants: PrimitiveConstants = bytemuck::pod_read_unaligned(&constants);
    assert_eq!(constants.primitive_id, 0);
    assert_eq!(constants.material_id, 0);

    let draw = commands
        .iter()
        .find_map(|cmd| match cmd {
            Cmd::DrawGeometry(draw) => Some(draw),
            _ => None,
        })
        .unwrap();
    assert_eq!(draw.vertex_buffers.len(), 1);
    assert!(commands
        .position(|cmd| matches!(cmd, Cmd::TraceRays { .. }))
        .is_some());
}

#[test]
fn position_only_pipeline_is_specialized() {
    let device = MockDevice::new();
    let config = RendererConfig {
        opengl_style: true,
        ..Default::default()
    };
    let _renderer = renderer_with(&device, config);

    let state = device.state();
    let specialized: Vec<_> = state
        .graphics_pipelines
        .iter()
        .filter_map(|desc| desc.fragment_specialization)
        .collect();
    assert_eq!(specialized, vec![-1]);

    let position_only = state
        .graphics_pipelines
        .iter()
        .find(|desc| desc.fragment_specialization.is_some())
        .unwrap();
    assert_eq!(position_only.vertex_attributes, vec![vk::Format::R32G32B32_SFLOAT]);
    assert!(position_only
        .fragment_shader
        .ends_with("gbufferpos.frag.spv"));
}

// ============================================================================
// Viewport
// ============================================================================

#[test]
fn flipped_viewport_has_negative_height() {
    let device = MockDevice::new();
    let config = RendererConfig {
        flip_viewport: true,
        ..Default::default()
    };
    let mut renderer = renderer_with(&device, config);
    let mut scene = TestScene::default();
    render_frames(&mut renderer, &mut scene, 0, 1);

    let commands = renderer.recorded_commands(FrameIndex::new(0)).unwrap();
    let viewport = commands
        .iter()
        .find_map(|cmd| match cmd {
            Cmd::SetViewport(viewport) => Some(*viewport),
            _ => None,
        })
        .unwrap();
    assert_eq!(viewport.y, EXTENT.height as f32);
    assert_eq!(viewport.height, -(EXTENT.height as f32));
}
