use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::device::{DeviceError, DeviceResult};

use super::VulkanDevice;

impl VulkanDevice {
    /// Creates a buffer with its own allocation, tracked until
    /// [`VulkanDevice::release_buffer`].
    pub(super) fn allocate_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> DeviceResult<vk::Buffer> {
        let device = &self.context.device;

        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&create_info, None) }?;
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let allocation = match self.allocator().allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err.into());
            }
        };

        if let Err(err) =
            unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
        {
            self.allocator().free(allocation).ok();
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(err.into());
        }

        self.buffers
            .lock()
            .expect("Buffer lock poisoned")
            .insert(buffer, allocation);
        Ok(buffer)
    }

    pub(super) fn write_mapped(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> DeviceResult<()> {
        let mut buffers = self.buffers.lock().expect("Buffer lock poisoned");
        let mapped = buffers
            .get_mut(&buffer)
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or(DeviceError::UnknownResource("host visible buffer"))?;

        let start = offset as usize;
        let end = start + data.len();
        let target = mapped
            .get_mut(start..end)
            .ok_or(DeviceError::UnknownResource("buffer range"))?;
        target.copy_from_slice(data);
        Ok(())
    }

    pub(super) fn release_buffer(&self, buffer: vk::Buffer) {
        let allocation = self
            .buffers
            .lock()
            .expect("Buffer lock poisoned")
            .remove(&buffer);

        match allocation {
            Some(allocation) => {
                if let Err(err) = self.allocator().free(allocation) {
                    log::warn!("Could not free buffer memory: {err}");
                }
                unsafe { self.context.device.destroy_buffer(buffer, None) };
            }
            None => log::warn!("Tried to free unknown buffer {buffer:?}"),
        }
    }

    pub(super) fn buffer_address(&self, buffer: vk::Buffer) -> vk::DeviceAddress {
        self.context.buffer_address(buffer)
    }
}
