//! Renderer lifecycle tests
//!
//! Tests for:
//! - Objects created at startup
//! - Resize recreating the resolution dependent resources
//! - Lazy framebuffer rebuilds per frame slot
//! - Teardown releasing everything

mod common;

use ash::vk;
use common::*;
use shadow_cat::device::DescriptorInfo;
use shadow_cat::render::gbuffer::GBuffer;
use shadow_cat::render::layout::deferred_bindings;
use shadow_cat::{DirtyFlags, FrameIndex};

const RESIZED: vk::Extent2D = vk::Extent2D {
    width: 1280,
    height: 720,
};

#[test]
fn startup_creates_pipelines_and_attachments() {
    let device = MockDevice::new();
    let renderer = renderer(&device);

    let state = device.state();
    assert_eq!(state.graphics_pipelines.len(), 4);
    assert_eq!(state.ray_tracing_pipelines.len(), 1);
    assert_eq!(state.images.len(), 6);
    assert_eq!(state.live_count("render pass"), 3);
    assert_eq!(state.live_count("framebuffer"), 6);
    assert_eq!(state.live_count("descriptor pool"), 2);
    assert_eq!(renderer.gbuffer().shadow.layout, vk::ImageLayout::GENERAL);
    assert_eq!(renderer.gbuffer().extent, EXTENT);

    let shaders = &state.ray_tracing_pipelines[0];
    assert!(shaders.raygen_shader.ends_with("shadow.rgen.spv"));
    assert!(shaders.miss_shader.ends_with("shadow.rmiss.spv"));
    assert!(shaders.closest_hit_shader.ends_with("shadow.rchit.spv"));
}

#[test]
fn gbuffer_attachments_use_their_formats() {
    let device = MockDevice::new();
    let _renderer = renderer(&device);

    let formats: Vec<vk::Format> = device.state().images.iter().map(|i| i.format).collect();
    for format in [
        GBuffer::POSITION_FORMAT,
        GBuffer::NORMAL_FORMAT,
        GBuffer::ALBEDO_FORMAT,
        GBuffer::ROUGHNESS_FORMAT,
        GBuffer::SHADOW_FORMAT,
        GBuffer::DEPTH_FORMAT,
    ] {
        assert!(formats.contains(&format), "{format:?}");
    }
}

#[test]
fn resize_recreates_the_gbuffer() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene {
        primitives: vec![primitive(&["pos"])],
        ..Default::default()
    };
    render_frames(&mut renderer, &mut scene, 0, 4);
    let old_shadow = renderer.gbuffer().shadow.view;
    let start = device.write_count();

    let target = shadow_cat::FrameTarget {
        resized: true,
        ..target(0, RESIZED, 1)
    };
    let recorded = renderer.render(&scene, &target, vk::CommandBuffer::null());

    assert!(recorded);
    assert_eq!(renderer.gbuffer().extent, RESIZED);
    assert_ne!(renderer.gbuffer().shadow.view, old_shadow);

    let state = device.state();
    assert!(state.wait_idle_calls >= 1);
    assert_eq!(state.destroyed_images, 6);
    assert_eq!(state.live_count("image"), 6);
    assert!(state
        .images
        .iter()
        .rev()
        .take(6)
        .all(|image| image.extent == RESIZED));

    let new_shadow = renderer.gbuffer().shadow.view;
    let shadow_writes = state.descriptor_writes[start..]
        .iter()
        .filter(|write| write.binding == deferred_bindings::SHADOW)
        .filter(|write| {
            matches!(write.info, DescriptorInfo::StorageImage { view, .. } if view == new_shadow)
        })
        .count();
    assert_eq!(shadow_writes, 2);
}

#[test]
fn resize_does_not_touch_scene_resources() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene {
        primitives: vec![primitive(&["pos", "N", "uv"])],
        ..Default::default()
    };
    render_frames(&mut renderer, &mut scene, 0, 2);
    let builds = device.state().bottom_level_builds;
    let batches = renderer.batches().len();

    let target = shadow_cat::FrameTarget {
        resized: true,
        ..target(0, RESIZED, 1)
    };
    renderer.render(&scene, &target, vk::CommandBuffer::null());

    assert_eq!(device.state().bottom_level_builds, builds);
    assert_eq!(renderer.batches().len(), batches);
}

#[test]
fn other_slot_rebuilds_framebuffers_on_its_turn() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene::default();
    render_frames(&mut renderer, &mut scene, 0, 2);

    let resized = shadow_cat::FrameTarget {
        resized: true,
        ..target(0, RESIZED, 1)
    };
    renderer.render(&scene, &resized, vk::CommandBuffer::null());
    let live_after_resize = device.state().live_count("framebuffer");
    assert_eq!(live_after_resize, 3);

    let recorded = renderer.render(&scene, &target(1, RESIZED, 1), vk::CommandBuffer::null());

    assert!(recorded);
    assert_eq!(device.state().live_count("framebuffer"), 6);
    assert_eq!(renderer.gbuffer().extent, RESIZED);
    assert_eq!(device.state().destroyed_images, 6);
}

#[test]
fn extent_mismatch_without_flag_still_resizes() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let scene = TestScene::default();

    renderer.render(&scene, &target(0, RESIZED, 1), vk::CommandBuffer::null());

    assert_eq!(renderer.gbuffer().extent, RESIZED);
}

#[test]
fn resize_records_both_frames_again() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene::default();
    render_frames(&mut renderer, &mut scene, 0, 4);

    let resized = shadow_cat::FrameTarget {
        resized: true,
        ..target(0, RESIZED, 1)
    };
    let first = renderer.render(&scene, &resized, vk::CommandBuffer::null());
    let second = renderer.render(&scene, &target(1, RESIZED, 1), vk::CommandBuffer::null());
    let third = renderer.render(&scene, &target(0, RESIZED, 1), vk::CommandBuffer::null());

    assert!(first && second);
    assert!(!third);
}

#[test]
fn teardown_releases_everything() {
    let device = MockDevice::new();
    {
        let mut renderer = renderer(&device);
        let mut scene = TestScene {
            primitives: vec![primitive(&["pos"]), primitive(&["pos", "N", "uv", "tan"])],
            textures: vec![texture(1)],
            ..Default::default()
        };
        render_frames(&mut renderer, &mut scene, 0, 3);

        let resized = shadow_cat::FrameTarget {
            resized: true,
            ..target(1, RESIZED, 1)
        };
        renderer.render(&scene, &resized, vk::CommandBuffer::null());
        scene.dirty = DirtyFlags::PRIMS;
        renderer.render(&scene, &target(0, RESIZED, 1), vk::CommandBuffer::null());

        assert!(!device.state().live.is_empty());
    }

    let state = device.state();
    assert!(state.live.is_empty(), "leaked {:?}", state.live);
    assert!(state.buffers.is_empty());
}

#[test]
fn recorded_commands_are_kept_per_slot() {
    let device = MockDevice::new();
    let mut renderer = renderer(&device);
    let mut scene = TestScene::default();
    render_frames(&mut renderer, &mut scene, 0, 2);

    for index in FrameIndex::all() {
        assert!(renderer.recorded_commands(index).is_some());
    }
}
