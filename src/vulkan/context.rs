use ash::{
    extensions::khr::{AccelerationStructure, BufferDeviceAddress, RayTracingPipeline, Synchronization2},
    vk,
};

/// Extension loaders and limits needed on top of the core device.
pub struct Context {
    pub device: ash::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,

    pub context_raytracing: ContextRaytracing,
    pub synchronisation2_loader: Synchronization2,
    pub buffer_device_address: BufferDeviceAddress,
}

pub struct ContextRaytracing {
    pub ray_tracing_pipeline: RayTracingPipeline,
    pub physical_device_ray_tracing_pipeline_properties_khr:
        vk::PhysicalDeviceRayTracingPipelinePropertiesKHR,

    pub acceleration_structure: AccelerationStructure,
    pub physical_device_acceleration_structure_properties_khr:
        vk::PhysicalDeviceAccelerationStructurePropertiesKHR,
}

impl Context {
    /// Wraps a device the application created with the ray tracing pipeline,
    /// acceleration structure, synchronization2 and buffer device address
    /// features enabled.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue_family_index: u32,
    ) -> Self {
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let synchronisation2_loader = Synchronization2::new(instance, &device);

        let ray_tracing_pipeline = RayTracingPipeline::new(instance, &device);
        let physical_device_ray_tracing_pipeline_properties_khr =
            unsafe { RayTracingPipeline::get_properties(instance, physical_device) };

        let acceleration_structure = AccelerationStructure::new(instance, &device);
        let physical_device_acceleration_structure_properties_khr =
            unsafe { AccelerationStructure::get_properties(instance, physical_device) };

        let buffer_device_address = BufferDeviceAddress::new(instance, &device);

        Self {
            device,
            queue,
            queue_family_index,
            context_raytracing: ContextRaytracing {
                ray_tracing_pipeline,
                physical_device_ray_tracing_pipeline_properties_khr,
                acceleration_structure,
                physical_device_acceleration_structure_properties_khr,
            },
            synchronisation2_loader,
            buffer_device_address,
        }
    }

    pub fn buffer_address(&self, buffer: vk::Buffer) -> vk::DeviceAddress {
        let info = vk::BufferDeviceAddressInfo::builder().buffer(buffer);
        unsafe { self.buffer_device_address.get_buffer_device_address(&info) }
    }
}
