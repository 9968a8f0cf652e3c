use ash::vk;

use crate::device::{Device, GpuImage, ImageDesc};

/// Resolution dependent attachments of the deferred pipeline.
pub struct GBuffer {
    pub position: GpuImage,
    pub normal: GpuImage,
    pub albedo: GpuImage,
    pub roughness: GpuImage,
    pub depth: GpuImage,
    /// One bit per light, written by the shadow rays.
    pub shadow: GpuImage,
    pub extent: vk::Extent2D,
}

impl GBuffer {
    pub const POSITION_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;
    pub const NORMAL_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;
    pub const ALBEDO_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
    pub const ROUGHNESS_FORMAT: vk::Format = vk::Format::R16_UNORM;
    pub const SHADOW_FORMAT: vk::Format = vk::Format::R16_UINT;
    pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

    pub const COLOR_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
        vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
            | vk::ImageUsageFlags::SAMPLED.as_raw()
            | vk::ImageUsageFlags::STORAGE.as_raw(),
    );

    pub fn new<D: Device + ?Sized>(device: &D, extent: vk::Extent2D) -> Self {
        let color = |format| {
            let desc = ImageDesc {
                extent,
                format,
                usage: GBuffer::COLOR_USAGE,
                aspect: vk::ImageAspectFlags::COLOR,
            };
            device
                .create_image(&desc)
                .expect("Could not create gbuffer image")
        };

        let position = color(GBuffer::POSITION_FORMAT);
        let normal = color(GBuffer::NORMAL_FORMAT);
        let albedo = color(GBuffer::ALBEDO_FORMAT);
        let roughness = color(GBuffer::ROUGHNESS_FORMAT);

        let depth = device
            .create_image(&ImageDesc {
                extent,
                format: GBuffer::DEPTH_FORMAT,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                    | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::DEPTH,
            })
            .expect("Could not create depth image");

        let mut shadow = device
            .create_image(&ImageDesc {
                extent,
                format: GBuffer::SHADOW_FORMAT,
                usage: vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
            })
            .expect("Could not create shadow image");
        device
            .transition_image_layout(&mut shadow, vk::ImageLayout::GENERAL)
            .expect("Could not transition shadow image");

        log::info!(
            "Created gbuffer attachments {}x{}",
            extent.width,
            extent.height
        );

        GBuffer {
            position,
            normal,
            albedo,
            roughness,
            depth,
            shadow,
            extent,
        }
    }

    /// Color targets of the geometry pass, in attachment order.
    pub fn color_views(&self) -> [vk::ImageView; 4] {
        [
            self.position.view,
            self.normal.view,
            self.albedo.view,
            self.roughness.view,
        ]
    }

    /// Images read by the shadow and composite passes, in binding order.
    pub fn storage_images(&self) -> [&GpuImage; 5] {
        [
            &self.position,
            &self.normal,
            &self.albedo,
            &self.shadow,
            &self.roughness,
        ]
    }

    pub fn destroy<D: Device + ?Sized>(&self, device: &D) {
        for image in [
            self.position,
            self.normal,
            self.albedo,
            self.roughness,
            self.depth,
            self.shadow,
        ] {
            device.destroy_image(image);
        }
    }
}
