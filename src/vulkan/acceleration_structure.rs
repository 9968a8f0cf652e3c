use ash::vk;
use gpu_allocator::MemoryLocation;
use ultraviolet::Mat4;

use crate::device::{AccelerationStructure, BlasInstance, DeviceError, DeviceResult};
use crate::scene::{Geometry, POSITION_ATTRIBUTE};
use crate::utility::aligned_address;

use super::VulkanDevice;

/// Builds a bottom level structure over the geometry's `pos` stream. Vertex
/// and index buffers must have been created with
/// `ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR` and
/// `SHADER_DEVICE_ADDRESS`.
pub(super) fn build_bottom_level(
    device: &VulkanDevice,
    geometry: &Geometry,
) -> DeviceResult<AccelerationStructure> {
    let position = geometry
        .attribute(POSITION_ATTRIBUTE)
        .ok_or(DeviceError::MissingAttribute(POSITION_ATTRIBUTE))?;

    let triangles = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
        .vertex_format(vk::Format::R32G32B32_SFLOAT)
        .vertex_data(vk::DeviceOrHostAddressConstKHR {
            device_address: device.buffer_address(position.buffer) + position.offset,
        })
        .vertex_stride(position.stride() as u64)
        .max_vertex(geometry.vertex_count.saturating_sub(1))
        .index_type(vk::IndexType::UINT32)
        .index_data(vk::DeviceOrHostAddressConstKHR {
            device_address: device.buffer_address(geometry.index_buffer) + geometry.index_offset,
        })
        .build();

    let geometry_khr = vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
        .flags(vk::GeometryFlagsKHR::OPAQUE)
        .geometry(vk::AccelerationStructureGeometryDataKHR { triangles })
        .build();

    build(
        device,
        vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
        &geometry_khr,
        geometry.index_count / 3,
    )
}

/// Builds a top level structure with one instance per entry. The instance
/// custom index is what the closest hit shader sees.
pub(super) fn build_top_level(
    device: &VulkanDevice,
    instances: &[BlasInstance],
) -> DeviceResult<AccelerationStructure> {
    let instances: Vec<vk::AccelerationStructureInstanceKHR> = instances
        .iter()
        .map(|instance| vk::AccelerationStructureInstanceKHR {
            transform: transform_matrix(&instance.transform),
            instance_custom_index_and_mask: vk::Packed24_8::new(instance.custom_index, 0xff),
            instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(
                0,
                vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw() as u8,
            ),
            acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                device_handle: instance.blas,
            },
        })
        .collect();

    let instance_bytes: &[u8] = unsafe {
        std::slice::from_raw_parts(
            instances.as_ptr() as *const u8,
            std::mem::size_of_val(instances.as_slice()),
        )
    };

    let instance_buffer = device.allocate_buffer(
        instance_bytes.len().max(1) as u64,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        MemoryLocation::CpuToGpu,
        "top level instances",
    )?;

    let result = device
        .write_mapped(instance_buffer, 0, instance_bytes)
        .and_then(|_| {
            let instances_data = vk::AccelerationStructureGeometryInstancesDataKHR::builder()
                .array_of_pointers(false)
                .data(vk::DeviceOrHostAddressConstKHR {
                    device_address: device.buffer_address(instance_buffer),
                })
                .build();

            let geometry_khr = vk::AccelerationStructureGeometryKHR::builder()
                .geometry_type(vk::GeometryTypeKHR::INSTANCES)
                .flags(vk::GeometryFlagsKHR::OPAQUE)
                .geometry(vk::AccelerationStructureGeometryDataKHR {
                    instances: instances_data,
                })
                .build();

            build(
                device,
                vk::AccelerationStructureTypeKHR::TOP_LEVEL,
                &geometry_khr,
                instances.len() as u32,
            )
        });

    device.release_buffer(instance_buffer);
    result
}

/// Row-major 3x4, as the instance transform expects.
fn transform_matrix(transform: &Mat4) -> vk::TransformMatrixKHR {
    let columns: [f32; 16] = bytemuck::cast(*transform);
    let mut matrix = [0.0; 12];
    for row in 0..3 {
        for column in 0..4 {
            matrix[row * 4 + column] = columns[column * 4 + row];
        }
    }
    vk::TransformMatrixKHR { matrix }
}

fn build(
    device: &VulkanDevice,
    ty: vk::AccelerationStructureTypeKHR,
    geometry: &vk::AccelerationStructureGeometryKHR,
    primitive_count: u32,
) -> DeviceResult<AccelerationStructure> {
    let raytracing = &device.context.context_raytracing;
    let loader = &raytracing.acceleration_structure;

    let mut build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
        .ty(ty)
        .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
        .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
        .geometries(std::slice::from_ref(geometry));

    let build_size_info = unsafe {
        loader.get_acceleration_structure_build_sizes(
            vk::AccelerationStructureBuildTypeKHR::DEVICE,
            &build_info,
            &[primitive_count],
        )
    };

    let size = build_size_info.acceleration_structure_size;
    let buffer = device.allocate_buffer(
        size,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        MemoryLocation::GpuOnly,
        "acceleration structure",
    )?;

    let handle = {
        let create_info = vk::AccelerationStructureCreateInfoKHR::builder()
            .buffer(buffer)
            .size(size)
            .ty(ty);
        match unsafe { loader.create_acceleration_structure(&create_info, None) } {
            Ok(handle) => handle,
            Err(err) => {
                device.release_buffer(buffer);
                return Err(err.into());
            }
        }
    };

    let scratch_alignment = raytracing
        .physical_device_acceleration_structure_properties_khr
        .min_acceleration_structure_scratch_offset_alignment as u64;
    let scratch_result = device.allocate_buffer(
        build_size_info.build_scratch_size + scratch_alignment,
        vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        MemoryLocation::GpuOnly,
        "acceleration structure scratch",
    );
    let scratch = match scratch_result {
        Ok(scratch) => scratch,
        Err(err) => {
            unsafe { loader.destroy_acceleration_structure(handle, None) };
            device.release_buffer(buffer);
            return Err(err);
        }
    };

    build_info = build_info
        .dst_acceleration_structure(handle)
        .scratch_data(vk::DeviceOrHostAddressKHR {
            device_address: aligned_address(device.buffer_address(scratch), scratch_alignment),
        });

    let build_range = vk::AccelerationStructureBuildRangeInfoKHR::builder()
        .primitive_count(primitive_count)
        .primitive_offset(0)
        .first_vertex(0)
        .transform_offset(0)
        .build();

    let build_result = device.submit_one_time(|command_buffer| unsafe {
        loader.cmd_build_acceleration_structures(
            command_buffer,
            std::slice::from_ref(&build_info),
            &[std::slice::from_ref(&build_range)],
        )
    });
    device.release_buffer(scratch);

    if let Err(err) = build_result {
        unsafe { loader.destroy_acceleration_structure(handle, None) };
        device.release_buffer(buffer);
        return Err(err);
    }

    let device_address = {
        let address_info =
            vk::AccelerationStructureDeviceAddressInfoKHR::builder().acceleration_structure(handle);
        unsafe { loader.get_acceleration_structure_device_address(&address_info) }
    };

    log::debug!("Built {ty:?} acceleration structure of {size} bytes");
    Ok(AccelerationStructure {
        handle,
        buffer,
        size,
        device_address,
    })
}
