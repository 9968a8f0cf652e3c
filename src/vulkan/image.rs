use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::device::{DeviceResult, GpuImage, ImageDesc};

use super::VulkanDevice;

pub fn simple_image_create_info() -> vk::ImageCreateInfo {
    vk::ImageCreateInfo {
        image_type: vk::ImageType::TYPE_2D,
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling: vk::ImageTiling::OPTIMAL,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        ..Default::default()
    }
}

pub fn aspect_for(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
        vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

fn full_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(super) fn create_image(device: &VulkanDevice, desc: &ImageDesc) -> DeviceResult<GpuImage> {
    let vk_device = &device.context.device;

    let create_info = vk::ImageCreateInfo {
        extent: vk::Extent3D {
            width: desc.extent.width,
            height: desc.extent.height,
            depth: 1,
        },
        format: desc.format,
        usage: desc.usage,
        ..simple_image_create_info()
    };

    let image = unsafe { vk_device.create_image(&create_info, None) }?;
    let requirements = unsafe { vk_device.get_image_memory_requirements(image) };

    let allocation = match device.allocator().allocate(&AllocationCreateDesc {
        name: "gbuffer image",
        requirements,
        location: MemoryLocation::GpuOnly,
        linear: false,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    }) {
        Ok(allocation) => allocation,
        Err(err) => {
            unsafe { vk_device.destroy_image(image, None) };
            return Err(err.into());
        }
    };

    unsafe { vk_device.bind_image_memory(image, allocation.memory(), allocation.offset()) }?;
    device
        .images
        .lock()
        .expect("Image lock poisoned")
        .insert(image, allocation);

    let view = {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(full_range(desc.aspect));
        unsafe { vk_device.create_image_view(&create_info, None) }?
    };

    let sampler = {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .mip_lod_bias(0.0)
            .anisotropy_enable(false)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        unsafe { vk_device.create_sampler(&create_info, None) }?
    };

    Ok(GpuImage {
        image,
        view,
        sampler,
        format: desc.format,
        extent: desc.extent,
        layout: vk::ImageLayout::UNDEFINED,
    })
}

pub(super) fn transition_layout(
    device: &VulkanDevice,
    image: &mut GpuImage,
    layout: vk::ImageLayout,
) -> DeviceResult<()> {
    let barrier = vk::ImageMemoryBarrier2::builder()
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE)
        .old_layout(image.layout)
        .new_layout(layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image.image)
        .subresource_range(full_range(aspect_for(image.format)))
        .build();

    device.submit_one_time(|command_buffer| {
        let dependency_info =
            vk::DependencyInfo::builder().image_memory_barriers(std::slice::from_ref(&barrier));
        unsafe {
            device
                .context
                .synchronisation2_loader
                .cmd_pipeline_barrier2(command_buffer, &dependency_info)
        };
    })?;

    image.layout = layout;
    Ok(())
}

pub(super) fn destroy_image(device: &VulkanDevice, image: GpuImage) {
    let vk_device = &device.context.device;
    unsafe {
        vk_device.destroy_sampler(image.sampler, None);
        vk_device.destroy_image_view(image.view, None);
    }

    let allocation = device
        .images
        .lock()
        .expect("Image lock poisoned")
        .remove(&image.image);
    if let Some(allocation) = allocation {
        if let Err(err) = device.allocator().free(allocation) {
            log::warn!("Could not free image memory: {err}");
        }
    }
    unsafe { vk_device.destroy_image(image.image, None) };
}
