use std::collections::HashMap;

use ash::vk;

use crate::device::{DescriptorBinding, DescriptorInfo, DescriptorSets, DescriptorWrite, DeviceResult};

pub fn create_set_layout(
    device: &ash::Device,
    bindings: &[DescriptorBinding],
) -> DeviceResult<vk::DescriptorSetLayout> {
    let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding.binding)
                .descriptor_count(binding.count)
                .descriptor_type(binding.ty)
                .stage_flags(binding.stages)
                .build()
        })
        .collect();

    let binding_flags: Vec<vk::DescriptorBindingFlags> = bindings
        .iter()
        .map(|binding| {
            if binding.partially_bound {
                vk::DescriptorBindingFlags::PARTIALLY_BOUND
            } else {
                vk::DescriptorBindingFlags::empty()
            }
        })
        .collect();

    let mut binding_flags_info =
        vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder().binding_flags(&binding_flags);

    let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
        .bindings(&vk_bindings)
        .push_next(&mut binding_flags_info);

    Ok(unsafe { device.create_descriptor_set_layout(&create_info, None) }?)
}

/// Creates a pool sized for exactly these sets and allocates them.
pub fn allocate_sets(
    device: &ash::Device,
    layouts: &[vk::DescriptorSetLayout],
    bindings: &[&[DescriptorBinding]],
) -> DeviceResult<DescriptorSets> {
    let mut counts: HashMap<vk::DescriptorType, u32> = HashMap::new();
    for binding in bindings.iter().flat_map(|set| set.iter()) {
        *counts.entry(binding.ty).or_default() += binding.count;
    }
    let pool_sizes: Vec<vk::DescriptorPoolSize> = counts
        .into_iter()
        .map(|(ty, descriptor_count)| vk::DescriptorPoolSize {
            ty,
            descriptor_count,
        })
        .collect();

    let pool = {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(layouts.len() as u32);
        unsafe { device.create_descriptor_pool(&create_info, None) }?
    };

    let allocate_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(layouts);

    match unsafe { device.allocate_descriptor_sets(&allocate_info) } {
        Ok(sets) => Ok(DescriptorSets { pool, sets }),
        Err(err) => {
            unsafe { device.destroy_descriptor_pool(pool, None) };
            Err(err.into())
        }
    }
}

pub fn update_sets(device: &ash::Device, writes: &[DescriptorWrite]) {
    let buffer_infos: Vec<vk::DescriptorBufferInfo> = writes
        .iter()
        .map(|write| match write.info {
            DescriptorInfo::UniformBuffer(region) => vk::DescriptorBufferInfo {
                buffer: region.buffer,
                offset: region.offset,
                range: region.size,
            },
            _ => vk::DescriptorBufferInfo::default(),
        })
        .collect();

    let image_infos: Vec<vk::DescriptorImageInfo> = writes
        .iter()
        .map(|write| match write.info {
            DescriptorInfo::CombinedImageSampler {
                view,
                sampler,
                layout,
            } => vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: layout,
            },
            DescriptorInfo::StorageImage { view, layout } => vk::DescriptorImageInfo {
                sampler: vk::Sampler::null(),
                image_view: view,
                image_layout: layout,
            },
            _ => vk::DescriptorImageInfo::default(),
        })
        .collect();

    let acceleration_structures: Vec<vk::AccelerationStructureKHR> = writes
        .iter()
        .map(|write| match write.info {
            DescriptorInfo::AccelerationStructure(handle) => handle,
            _ => vk::AccelerationStructureKHR::null(),
        })
        .collect();

    let mut acceleration_structure_infos: Vec<vk::WriteDescriptorSetAccelerationStructureKHR> =
        acceleration_structures
            .iter()
            .map(|handle| {
                vk::WriteDescriptorSetAccelerationStructureKHR::builder()
                    .acceleration_structures(std::slice::from_ref(handle))
                    .build()
            })
            .collect();

    let vk_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .zip(acceleration_structure_infos.iter_mut())
        .enumerate()
        .map(|(index, (write, acceleration_structure_info))| {
            let mut vk_write = vk::WriteDescriptorSet::builder()
                .dst_set(write.set)
                .dst_binding(write.binding)
                .dst_array_element(write.array_element)
                .descriptor_type(write.info.descriptor_type());

            match write.info {
                DescriptorInfo::UniformBuffer(_) => {
                    vk_write = vk_write.buffer_info(std::slice::from_ref(&buffer_infos[index]))
                }
                DescriptorInfo::CombinedImageSampler { .. } | DescriptorInfo::StorageImage { .. } => {
                    vk_write = vk_write.image_info(std::slice::from_ref(&image_infos[index]))
                }
                DescriptorInfo::AccelerationStructure(_) => {
                    vk_write = vk_write.push_next(acceleration_structure_info);
                    vk_write.descriptor_count = 1;
                }
            }
            vk_write.build()
        })
        .collect();

    unsafe { device.update_descriptor_sets(&vk_writes, &[]) };
}
