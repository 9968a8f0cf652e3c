use ash::vk;
use bytemuck::Zeroable;

use crate::device::{BufferRegion, DescriptorInfo, DescriptorSets, DescriptorWrite, Device};
use crate::scene::{Scene, TextureId};

use super::gbuffer::GBuffer;
use super::layout::{deferred_bindings, main_bindings, RenderLayouts};
use super::per_frame::PerFrame;
use super::shader_types::{
    self, LightArray, MaterialArray, TransformArray, MAX_LIGHTS, MAX_MATERIALS, MAX_TEXTURES,
};

/// GPU visible copies of the scene data owned by one frame in flight.
pub struct FrameResources {
    pub camera: BufferRegion,
    pub transforms: BufferRegion,
    pub lights: BufferRegion,
    pub materials: BufferRegion,
    pub descriptor_sets: DescriptorSets,
}

impl FrameResources {
    pub fn main_set(&self) -> vk::DescriptorSet {
        self.descriptor_sets.sets[0]
    }

    pub fn deferred_set(&self) -> vk::DescriptorSet {
        self.descriptor_sets.sets[1]
    }

    pub fn sets(&self) -> Vec<vk::DescriptorSet> {
        self.descriptor_sets.sets.clone()
    }
}

pub fn create_frame_resources<D: Device + ?Sized>(
    device: &D,
    layouts: &RenderLayouts,
    gbuffer: &GBuffer,
) -> PerFrame<FrameResources> {
    let frames = PerFrame::from_fn(|_| {
        let uniform = |size: usize| {
            device
                .request_buffer(size as vk::DeviceSize, vk::BufferUsageFlags::UNIFORM_BUFFER)
                .expect("Could not create uniform buffer")
        };

        let resources = FrameResources {
            camera: uniform(std::mem::size_of::<shader_types::Camera>()),
            transforms: uniform(std::mem::size_of::<TransformArray>()),
            lights: uniform(std::mem::size_of::<LightArray>()),
            materials: uniform(std::mem::size_of::<MaterialArray>()),
            descriptor_sets: device
                .allocate_descriptor_sets(
                    &layouts.set_layouts(),
                    &[&layouts.main_bindings, &layouts.deferred_bindings],
                )
                .expect("Could not allocate descriptor sets"),
        };

        zero_fill(device, &resources.transforms, &TransformArray::zeroed());
        zero_fill(device, &resources.lights, &LightArray::zeroed());
        zero_fill(device, &resources.materials, &MaterialArray::zeroed());

        let set = resources.main_set();
        device.update_descriptor_sets(&[
            DescriptorWrite::new(
                set,
                main_bindings::CAMERA,
                DescriptorInfo::UniformBuffer(resources.camera),
            ),
            DescriptorWrite::new(
                set,
                main_bindings::TRANSFORMS,
                DescriptorInfo::UniformBuffer(resources.transforms),
            ),
            DescriptorWrite::new(
                set,
                main_bindings::LIGHTS,
                DescriptorInfo::UniformBuffer(resources.lights),
            ),
            DescriptorWrite::new(
                set,
                main_bindings::MATERIALS,
                DescriptorInfo::UniformBuffer(resources.materials),
            ),
        ]);

        resources
    });

    write_gbuffer_bindings(device, &frames, gbuffer);
    frames
}

fn zero_fill<D: Device + ?Sized, T: bytemuck::Pod>(device: &D, region: &BufferRegion, value: &T) {
    device
        .write_buffer(region, 0, bytemuck::bytes_of(value))
        .expect("Could not write uniform buffer");
}

/// Points the deferred sets of every frame at the current attachments.
pub fn write_gbuffer_bindings<D: Device + ?Sized>(
    device: &D,
    frames: &PerFrame<FrameResources>,
    gbuffer: &GBuffer,
) {
    let bindings = [
        deferred_bindings::POSITION,
        deferred_bindings::NORMAL,
        deferred_bindings::ALBEDO,
        deferred_bindings::SHADOW,
        deferred_bindings::ROUGHNESS,
    ];

    let writes: Vec<DescriptorWrite> = frames
        .iter()
        .flat_map(|frame| {
            bindings
                .into_iter()
                .zip(gbuffer.storage_images())
                .map(move |(binding, image)| {
                    DescriptorWrite::new(
                        frame.deferred_set(),
                        binding,
                        DescriptorInfo::StorageImage {
                            view: image.view,
                            layout: vk::ImageLayout::GENERAL,
                        },
                    )
                })
        })
        .collect();

    device.update_descriptor_sets(&writes);
}

pub fn write_top_level_binding<D: Device + ?Sized>(
    device: &D,
    frames: &PerFrame<FrameResources>,
    top_level: vk::AccelerationStructureKHR,
) {
    let writes: Vec<DescriptorWrite> = frames
        .iter()
        .map(|frame| {
            DescriptorWrite::new(
                frame.deferred_set(),
                deferred_bindings::TOP_LEVEL_AS,
                DescriptorInfo::AccelerationStructure(top_level),
            )
        })
        .collect();

    device.update_descriptor_sets(&writes);
}

pub fn update_camera<D: Device + ?Sized>(
    device: &D,
    frame: &FrameResources,
    scene: &dyn Scene,
) {
    let camera = shader_types::Camera {
        view: scene.camera_view(),
        proj: scene.camera_projection(),
        camera: scene.camera_transform(),
    };
    device
        .write_buffer(&frame.camera, 0, bytemuck::bytes_of(&camera))
        .expect("Could not write camera buffer");
}

pub fn update_lights<D: Device + ?Sized>(device: &D, frame: &FrameResources, scene: &dyn Scene) {
    let lights = scene.lights();
    let count = light_count(scene);
    let stride = std::mem::size_of::<shader_types::Light>() as vk::DeviceSize;

    for (index, light) in lights.iter().take(count as usize).enumerate() {
        device
            .write_buffer(
                &frame.lights,
                index as vk::DeviceSize * stride,
                bytemuck::bytes_of(light),
            )
            .expect("Could not write light buffer");
    }
}

/// The light count the shaders see.
pub fn light_count(scene: &dyn Scene) -> u32 {
    let count = scene.light_count().min(scene.lights().len() as u32);
    if count as usize > MAX_LIGHTS {
        log::warn!(
            "Scene has {count} lights, only the first {MAX_LIGHTS} cast shadows and are shaded"
        );
        MAX_LIGHTS as u32
    } else {
        count
    }
}

pub fn update_materials<D: Device + ?Sized>(
    device: &D,
    frame: &FrameResources,
    scene: &dyn Scene,
) {
    let materials = scene.materials();
    if materials.len() > MAX_MATERIALS {
        log::warn!(
            "Scene has {} materials, only the first {MAX_MATERIALS} are uploaded",
            materials.len()
        );
    }
    let count = materials.len().min(MAX_MATERIALS);

    device
        .write_buffer(
            &frame.materials,
            0,
            bytemuck::cast_slice(&materials[..count]),
        )
        .expect("Could not write material buffer");
}

pub fn update_textures<D: Device + ?Sized>(
    device: &D,
    frame: &FrameResources,
    scene: &dyn Scene,
) {
    let max_slot = MAX_TEXTURES as u32 - 1;
    let count = scene.texture_count();
    if count > max_slot {
        log::warn!("Scene has {count} textures, only the first {max_slot} are bound");
    }

    let writes: Vec<DescriptorWrite> = (1..=count.min(max_slot))
        .map(|slot| {
            let texture = scene.texture(TextureId(slot));
            DescriptorWrite {
                array_element: slot,
                ..DescriptorWrite::new(
                    frame.main_set(),
                    main_bindings::TEXTURES,
                    DescriptorInfo::CombinedImageSampler {
                        view: texture.image_view,
                        sampler: texture.sampler,
                        layout: texture.layout,
                    },
                )
            }
        })
        .collect();

    if !writes.is_empty() {
        device.update_descriptor_sets(&writes);
    }
}

pub fn destroy_frame_resources<D: Device + ?Sized>(device: &D, frames: &PerFrame<FrameResources>) {
    for frame in frames.iter() {
        device.free_descriptor_sets(frame.descriptor_sets.clone());
        for buffer in [frame.camera, frame.transforms, frame.lights, frame.materials] {
            device.free_buffer(buffer);
        }
    }
}
