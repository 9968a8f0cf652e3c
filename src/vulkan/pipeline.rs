use ash::vk;
use gpu_allocator::MemoryLocation;

use crate::device::{
    DeviceResult, GraphicsPipelineDesc, RayTracingPipelineDesc, RenderPassDesc,
    ShaderBindingTable,
};
use crate::scene::format_size;
use crate::utility::{aligned_address, aligned_size};

use super::shader_create_info::ShaderModule;
use super::VulkanDevice;

pub fn create_render_pass(device: &ash::Device, desc: &RenderPassDesc) -> DeviceResult<vk::RenderPass> {
    let attachments: Vec<vk::AttachmentDescription> = desc
        .color_attachments
        .iter()
        .chain(desc.depth_attachment.iter())
        .map(|attachment| vk::AttachmentDescription {
            format: attachment.format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: attachment.load_op,
            store_op: attachment.store_op,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: attachment.initial_layout,
            final_layout: attachment.final_layout,
            ..Default::default()
        })
        .collect();

    let color_attachment_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len())
        .map(|index| vk::AttachmentReference {
            attachment: index as u32,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect();

    let depth_attachment_ref = vk::AttachmentReference {
        attachment: desc.color_attachments.len() as u32,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let mut subpass = vk::SubpassDescription::builder()
        .color_attachments(&color_attachment_refs)
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS);
    if desc.depth_attachment.is_some() {
        subpass = subpass.depth_stencil_attachment(&depth_attachment_ref);
    }

    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(&desc.dependencies);

    Ok(unsafe { device.create_render_pass(&create_info, None) }?)
}

pub fn create_graphics_pipeline(
    device: &ash::Device,
    desc: &GraphicsPipelineDesc,
) -> DeviceResult<vk::Pipeline> {
    let vertex_shader = ShaderModule::load(device, vk::ShaderStageFlags::VERTEX, &desc.vertex_shader)?;
    let fragment_shader =
        ShaderModule::load(device, vk::ShaderStageFlags::FRAGMENT, &desc.fragment_shader)?;

    let specialization_entries = [vk::SpecializationMapEntry {
        constant_id: 0,
        offset: 0,
        size: std::mem::size_of::<i32>(),
    }];
    let specialization_data = desc.fragment_specialization.unwrap_or(0).to_ne_bytes();
    let specialization_info = vk::SpecializationInfo::builder()
        .map_entries(&specialization_entries)
        .data(&specialization_data);

    let mut fragment_stage = fragment_shader.stage_create_info();
    if desc.fragment_specialization.is_some() {
        fragment_stage = fragment_stage.specialization_info(&specialization_info);
    }
    let shader_stages = [vertex_shader.stage_create_info().build(), fragment_stage.build()];

    // Every attribute lives in its own buffer.
    let vertex_binding_descriptions: Vec<vk::VertexInputBindingDescription> = desc
        .vertex_attributes
        .iter()
        .enumerate()
        .map(|(index, format)| vk::VertexInputBindingDescription {
            binding: index as u32,
            stride: format_size(*format),
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let vertex_attribute_descriptions: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_attributes
        .iter()
        .enumerate()
        .map(|(index, format)| vk::VertexInputAttributeDescription {
            location: index as u32,
            binding: index as u32,
            format: *format,
            offset: 0,
        })
        .collect();

    let vertex_input_state_create_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&vertex_binding_descriptions)
        .vertex_attribute_descriptions(&vertex_attribute_descriptions);

    let input_assembly_state_create_info = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    let viewport_state_create_info = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization_state_create_info = vk::PipelineRasterizationStateCreateInfo::builder()
        .cull_mode(desc.cull_mode)
        .front_face(desc.front_face)
        .line_width(1.0)
        .polygon_mode(vk::PolygonMode::FILL);

    let multisample_state_create_info = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil_state_create_info = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(desc.depth_test)
        .depth_write_enable(desc.depth_test)
        .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false)
        .max_depth_bounds(1.0)
        .min_depth_bounds(0.0);

    let color_blend_attachment_states = vec![
        vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            ..Default::default()
        };
        desc.color_attachment_count as usize
    ];
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
        .attachments(&color_blend_attachment_states);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state_create_info =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state_create_info)
        .input_assembly_state(&input_assembly_state_create_info)
        .viewport_state(&viewport_state_create_info)
        .rasterization_state(&rasterization_state_create_info)
        .multisample_state(&multisample_state_create_info)
        .depth_stencil_state(&depth_stencil_state_create_info)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state_create_info)
        .layout(desc.layout)
        .render_pass(desc.render_pass);

    let pipelines = unsafe {
        device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&create_info),
            None,
        )
    }
    .map_err(|(_, err)| err)?;

    Ok(pipelines[0])
}

/// Creates the shadow pipeline with groups `raygen`, `miss` and
/// `closest hit`, and a shader binding table with one record per group.
pub fn create_ray_tracing_pipeline(
    device: &VulkanDevice,
    desc: &RayTracingPipelineDesc,
) -> DeviceResult<(vk::Pipeline, ShaderBindingTable)> {
    let vk_device = &device.context.device;
    let raytracing = &device.context.context_raytracing;

    let raygen = ShaderModule::load(vk_device, vk::ShaderStageFlags::RAYGEN_KHR, &desc.raygen_shader)?;
    let miss = ShaderModule::load(vk_device, vk::ShaderStageFlags::MISS_KHR, &desc.miss_shader)?;
    let closest_hit = ShaderModule::load(
        vk_device,
        vk::ShaderStageFlags::CLOSEST_HIT_KHR,
        &desc.closest_hit_shader,
    )?;

    let shader_stages = [
        raygen.stage_create_info().build(),
        miss.stage_create_info().build(),
        closest_hit.stage_create_info().build(),
    ];

    let general_group = |shader| {
        vk::RayTracingShaderGroupCreateInfoKHR::builder()
            .ty(vk::RayTracingShaderGroupTypeKHR::GENERAL)
            .general_shader(shader)
            .closest_hit_shader(vk::SHADER_UNUSED_KHR)
            .any_hit_shader(vk::SHADER_UNUSED_KHR)
            .intersection_shader(vk::SHADER_UNUSED_KHR)
            .build()
    };
    let shader_groups = [
        general_group(0),
        general_group(1),
        vk::RayTracingShaderGroupCreateInfoKHR::builder()
            .ty(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP)
            .general_shader(vk::SHADER_UNUSED_KHR)
            .closest_hit_shader(2)
            .any_hit_shader(vk::SHADER_UNUSED_KHR)
            .intersection_shader(vk::SHADER_UNUSED_KHR)
            .build(),
    ];

    let create_info = vk::RayTracingPipelineCreateInfoKHR::builder()
        .stages(&shader_stages)
        .groups(&shader_groups)
        .max_pipeline_ray_recursion_depth(1)
        .layout(desc.layout);

    let pipeline = unsafe {
        raytracing.ray_tracing_pipeline.create_ray_tracing_pipelines(
            vk::DeferredOperationKHR::null(),
            vk::PipelineCache::null(),
            std::slice::from_ref(&create_info),
            None,
        )
    }?[0];

    match create_shader_binding_table(device, pipeline, shader_groups.len() as u32) {
        Ok(table) => Ok((pipeline, table)),
        Err(err) => {
            unsafe { vk_device.destroy_pipeline(pipeline, None) };
            Err(err)
        }
    }
}

fn create_shader_binding_table(
    device: &VulkanDevice,
    pipeline: vk::Pipeline,
    group_count: u32,
) -> DeviceResult<ShaderBindingTable> {
    let properties = &device
        .context
        .context_raytracing
        .physical_device_ray_tracing_pipeline_properties_khr;
    let handle_size = properties.shader_group_handle_size;
    let handle_size_aligned = aligned_size(handle_size, properties.shader_group_handle_alignment);
    let base_alignment = properties.shader_group_base_alignment;
    let region_size = aligned_size(handle_size_aligned, base_alignment) as u64;

    let handles = unsafe {
        device
            .context
            .context_raytracing
            .ray_tracing_pipeline
            .get_ray_tracing_shader_group_handles(
                pipeline,
                0,
                group_count,
                (group_count * handle_size) as usize,
            )
    }?;

    // Extra room so the first record can start on a base-aligned address.
    let buffer_size = region_size * group_count as u64 + base_alignment as u64;
    let buffer = device.allocate_buffer(
        buffer_size,
        vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        MemoryLocation::CpuToGpu,
        "shader binding table",
    )?;

    let buffer_address = device.buffer_address(buffer);
    let first_record = aligned_address(buffer_address, base_alignment as u64) - buffer_address;

    for (group, handle) in handles.chunks_exact(handle_size as usize).enumerate() {
        let offset = first_record + region_size * group as u64;
        if let Err(err) = device.write_mapped(buffer, offset, handle) {
            device.release_buffer(buffer);
            return Err(err);
        }
    }

    let region = |group: u64| vk::StridedDeviceAddressRegionKHR {
        device_address: buffer_address + first_record + region_size * group,
        stride: handle_size_aligned as u64,
        size: handle_size_aligned as u64,
    };
    let raygen = vk::StridedDeviceAddressRegionKHR {
        // The raygen region size must equal its stride.
        stride: region_size,
        size: region_size,
        ..region(0)
    };

    Ok(ShaderBindingTable {
        buffer,
        raygen,
        miss: region(1),
        hit: region(2),
        callable: vk::StridedDeviceAddressRegionKHR::default(),
    })
}
