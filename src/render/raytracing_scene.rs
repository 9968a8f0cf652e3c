use ash::vk;

use crate::device::{AccelerationStructure, BlasInstance, Device};
use crate::scene::Primitive;

/// Acceleration structures for the shadow rays. One bottom level structure
/// per primitive, one top level structure over all of them.
#[derive(Default)]
pub struct RaytracingScene {
    blases: Vec<AccelerationStructure>,
    tlas: Option<AccelerationStructure>,
    instance_count: usize,
}

impl RaytracingScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throws away every structure and builds new ones for `primitives`.
    pub fn rebuild<D: Device + ?Sized>(&mut self, device: &D, primitives: &[Primitive]) {
        self.destroy(device);

        if primitives.is_empty() {
            log::debug!("No primitives, top level acceleration structure stays empty");
            return;
        }

        self.blases = primitives
            .iter()
            .map(|primitive| {
                device
                    .build_bottom_level(&primitive.geometry)
                    .expect("Could not build bottom level acceleration structure")
            })
            .collect();

        let instances: Vec<BlasInstance> = self
            .blases
            .iter()
            .zip(primitives)
            .enumerate()
            .map(|(index, (blas, primitive))| BlasInstance {
                blas: blas.device_address,
                transform: primitive.transform,
                custom_index: index as u32,
            })
            .collect();

        self.tlas = Some(
            device
                .build_top_level(&instances)
                .expect("Could not build top level acceleration structure"),
        );
        self.instance_count = instances.len();

        log::info!(
            "Built {} bottom level acceleration structures",
            self.blases.len()
        );
    }

    /// `None` while there is nothing to trace against.
    pub fn top_level(&self) -> Option<vk::AccelerationStructureKHR> {
        self.tlas
            .as_ref()
            .filter(|tlas| tlas.size > 0)
            .map(|tlas| tlas.handle)
    }

    pub fn bottom_level_count(&self) -> usize {
        self.blases.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    pub fn destroy<D: Device + ?Sized>(&mut self, device: &D) {
        for blas in self.blases.drain(..) {
            device.destroy_acceleration_structure(blas);
        }
        if let Some(tlas) = self.tlas.take() {
            device.destroy_acceleration_structure(tlas);
        }
        self.instance_count = 0;
    }
}
