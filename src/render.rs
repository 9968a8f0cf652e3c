pub mod batches;
pub mod commands;
pub mod frame_resources;
pub mod frame_sync;
pub mod framebuffers;
pub mod gbuffer;
pub mod layout;
pub mod pass;
pub mod per_frame;
pub mod pipelines;
pub mod raytracing_scene;
pub mod shader_types;

pub use pass::OutputFormat;
pub use per_frame::{FrameIndex, PerFrame, FRAMES_IN_FLIGHT};

use std::sync::Arc;

use ash::vk;

use crate::config::RendererConfig;
use crate::device::{Device, ShaderBindingTable};
use crate::scene::{DirtyFlags, Scene};

use self::{
    batches::DrawBatches,
    commands::CommandList,
    frame_resources::FrameResources,
    frame_sync::PendingUpdates,
    framebuffers::FrameFramebuffers,
    gbuffer::GBuffer,
    layout::RenderLayouts,
    pass::{FrameRecording, RenderPasses},
    pipelines::Pipelines,
    raytracing_scene::RaytracingScene,
};

/// The output the application wants the current frame drawn into.
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
    pub index: FrameIndex,
    pub color: vk::ImageView,
    pub depth: vk::ImageView,
    pub extent: vk::Extent2D,
    /// Set by the application for the first frame after its swapchain
    /// changed size.
    pub resized: bool,
}

/// Deferred renderer with ray traced shadows.
///
/// Owns every GPU object it creates. Scene data is read through [`Scene`]
/// once per frame and mirrored into the per-frame buffers over the next
/// [`FRAMES_IN_FLIGHT`] frames.
pub struct Renderer<D: Device> {
    device: Arc<D>,
    config: RendererConfig,

    gbuffer: GBuffer,
    passes: RenderPasses,
    framebuffers: PerFrame<Option<FrameFramebuffers>>,
    layouts: RenderLayouts,
    frames: PerFrame<FrameResources>,
    pipelines: Pipelines,
    shader_binding_table: ShaderBindingTable,

    batches: DrawBatches,
    raytracing_scene: RaytracingScene,
    pending: PendingUpdates,
    primitives_synced: bool,
    recorded: PerFrame<Option<CommandList>>,
}

impl<D: Device> Renderer<D> {
    pub fn new(
        device: Arc<D>,
        config: RendererConfig,
        output: OutputFormat,
        targets: &PerFrame<FrameTarget>,
    ) -> Self {
        let extent = targets[FrameIndex::new(0)].extent;
        let gbuffer = GBuffer::new(&*device, extent);

        let passes = RenderPasses::new(&*device, output);
        log::info!("Created render passes");

        let framebuffers = PerFrame::from_fn(|index| {
            Some(FrameFramebuffers::new(
                &*device,
                &passes,
                &gbuffer,
                &targets[index],
            ))
        });

        let layouts = RenderLayouts::new(&*device);
        log::info!("Created descriptor set layouts");

        let frames = frame_resources::create_frame_resources(&*device, &layouts, &gbuffer);
        log::info!("Created per frame resources");

        let (pipelines, shader_binding_table) =
            Pipelines::new(&*device, &config, &passes, layouts.pipeline_layout);

        Self {
            device,
            config,
            gbuffer,
            passes,
            framebuffers,
            layouts,
            frames,
            pipelines,
            shader_binding_table,
            batches: DrawBatches::default(),
            raytracing_scene: RaytracingScene::new(),
            pending: PendingUpdates::new(),
            primitives_synced: false,
            recorded: PerFrame::from_fn(|_| None),
        }
    }

    /// Brings the frame's resources up to date and, when the frame contents
    /// changed, records the frame into `command_buffer`.
    ///
    /// Returns whether commands were recorded. Otherwise the commands
    /// recorded earlier for this frame are still valid.
    pub fn render(
        &mut self,
        scene: &dyn Scene,
        target: &FrameTarget,
        command_buffer: vk::CommandBuffer,
    ) -> bool {
        let dirty = scene.dirty();
        self.pending.apply(dirty);

        if dirty.contains(DirtyFlags::PRIMS) || !self.primitives_synced {
            self.sync_primitives(scene);
        }

        if target.resized || target.extent != self.gbuffer.extent {
            if !target.resized {
                log::warn!(
                    "Frame target is {}x{} but the gbuffer is {}x{}, recreating",
                    target.extent.width,
                    target.extent.height,
                    self.gbuffer.extent.width,
                    self.gbuffer.extent.height
                );
            }
            self.resize(target.extent);
        }

        self.ensure_framebuffers(target);

        let device = &*self.device;
        let frame = &self.frames[target.index];

        if self.pending.camera.consume() {
            frame_resources::update_camera(device, frame, scene);
        }
        if self.pending.lights.consume() {
            frame_resources::update_lights(device, frame, scene);
        }
        if self.pending.materials.consume() {
            frame_resources::update_materials(device, frame, scene);
        }
        if self.pending.textures.consume() {
            frame_resources::update_textures(device, frame, scene);
        }

        if !self.pending.frame_contents.consume() {
            return false;
        }

        let commands = self.record(scene, target);
        self.device.record_commands(command_buffer, &commands);
        log::debug!(
            "Recorded {} commands for frame {}",
            commands.len(),
            target.index.get()
        );
        self.recorded[target.index] = Some(commands);
        true
    }

    fn sync_primitives(&mut self, scene: &dyn Scene) {
        let primitives = scene.primitives();

        self.batches
            .classify(primitives)
            .expect("Could not classify primitives");

        self.raytracing_scene.rebuild(&*self.device, primitives);
        if let Some(top_level) = self.raytracing_scene.top_level() {
            frame_resources::write_top_level_binding(&*self.device, &self.frames, top_level);
        }

        self.pending.frame_contents.mark();
        self.primitives_synced = true;
    }

    /// Recreates everything that depends on the output resolution. The
    /// current frame's framebuffers are rebuilt right after, the others the
    /// next time their target comes around.
    fn resize(&mut self, extent: vk::Extent2D) {
        let device = &*self.device;
        device.wait_idle();

        for framebuffers in self.framebuffers.iter_mut() {
            if let Some(framebuffers) = framebuffers.take() {
                framebuffers.destroy(device);
            }
        }
        self.gbuffer.destroy(device);

        self.gbuffer = GBuffer::new(device, extent);
        frame_resources::write_gbuffer_bindings(device, &self.frames, &self.gbuffer);

        self.pending.frame_contents.mark();
    }

    fn ensure_framebuffers(&mut self, target: &FrameTarget) {
        let slot = &mut self.framebuffers[target.index];
        if slot.as_ref().is_some_and(|fb| fb.matches(target)) {
            return;
        }

        if let Some(stale) = slot.take() {
            stale.destroy(&*self.device);
        }
        *slot = Some(FrameFramebuffers::new(
            &*self.device,
            &self.passes,
            &self.gbuffer,
            target,
        ));
        // Commands recorded against the old framebuffers are stale.
        if !self.pending.frame_contents.is_pending() {
            self.pending.frame_contents.mark();
        }
    }

    fn record(&self, scene: &dyn Scene, target: &FrameTarget) -> CommandList {
        let framebuffers = self.framebuffers[target.index]
            .as_ref()
            .expect("Framebuffers are created before recording");

        let recording = FrameRecording {
            scene,
            config: &self.config,
            batches: &self.batches,
            passes: &self.passes,
            framebuffers,
            pipelines: &self.pipelines,
            shader_binding_table: &self.shader_binding_table,
            pipeline_layout: self.layouts.pipeline_layout,
            descriptor_sets: self.frames[target.index].sets(),
            extent: target.extent,
            light_count: frame_resources::light_count(scene),
            has_top_level: self.raytracing_scene.top_level().is_some(),
        };

        pass::record_frame(&recording)
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn batches(&self) -> &DrawBatches {
        &self.batches
    }

    pub fn raytracing_scene(&self) -> &RaytracingScene {
        &self.raytracing_scene
    }

    pub fn pending_updates(&self) -> &PendingUpdates {
        &self.pending
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    pub fn frame_resources(&self, index: FrameIndex) -> &FrameResources {
        &self.frames[index]
    }

    /// The command sequence last recorded for `index`.
    pub fn recorded_commands(&self, index: FrameIndex) -> Option<&CommandList> {
        self.recorded[index].as_ref()
    }
}

impl<D: Device> Drop for Renderer<D> {
    fn drop(&mut self) {
        let device = &*self.device;
        device.wait_idle();

        self.raytracing_scene.destroy(device);
        self.pipelines.destroy(device);
        device.destroy_shader_binding_table(self.shader_binding_table);
        frame_resources::destroy_frame_resources(device, &self.frames);
        self.layouts.destroy(device);
        for framebuffers in self.framebuffers.iter_mut() {
            if let Some(framebuffers) = framebuffers.take() {
                framebuffers.destroy(device);
            }
        }
        self.passes.destroy(device);
        self.gbuffer.destroy(device);

        log::info!("Destroyed renderer");
    }
}
