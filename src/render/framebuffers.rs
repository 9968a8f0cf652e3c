use ash::vk;

use crate::device::Device;

use super::gbuffer::GBuffer;
use super::pass::RenderPasses;
use super::FrameTarget;

/// Framebuffers of one frame in flight, plus the output views they wrap.
pub struct FrameFramebuffers {
    pub present: vk::Framebuffer,
    pub gbuffer: vk::Framebuffer,
    pub composite: vk::Framebuffer,
    color: vk::ImageView,
    depth: vk::ImageView,
    extent: vk::Extent2D,
}

impl FrameFramebuffers {
    pub fn new<D: Device + ?Sized>(
        device: &D,
        passes: &RenderPasses,
        gbuffer: &GBuffer,
        target: &FrameTarget,
    ) -> Self {
        let extent = target.extent;

        let present = device
            .create_framebuffer(passes.present, &[target.color, target.depth], extent)
            .expect("Could not create presentation framebuffer");

        let gbuffer_views = {
            let mut views = gbuffer.color_views().to_vec();
            views.push(gbuffer.depth.view);
            views
        };
        let gbuffer = device
            .create_framebuffer(passes.gbuffer, &gbuffer_views, extent)
            .expect("Could not create gbuffer framebuffer");

        let composite = device
            .create_framebuffer(passes.composite, &[target.color], extent)
            .expect("Could not create composite framebuffer");

        log::debug!("Created framebuffers for frame {}", target.index.get());

        Self {
            present,
            gbuffer,
            composite,
            color: target.color,
            depth: target.depth,
            extent,
        }
    }

    /// Whether these framebuffers were built for `target`.
    pub fn matches(&self, target: &FrameTarget) -> bool {
        self.color == target.color
            && self.depth == target.depth
            && self.extent.width == target.extent.width
            && self.extent.height == target.extent.height
    }

    pub fn destroy<D: Device + ?Sized>(self, device: &D) {
        device.destroy_framebuffer(self.present);
        device.destroy_framebuffer(self.gbuffer);
        device.destroy_framebuffer(self.composite);
    }
}
