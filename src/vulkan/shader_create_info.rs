use std::{ffi::CStr, io::Cursor, path::Path};

use ash::vk;

use crate::device::{DeviceError, DeviceResult};

pub const SHADER_ENTRY_NAME: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// A shader module loaded from a SPIR-V file. Destroyed on drop, which is
/// fine as soon as the pipeline using it has been created.
pub struct ShaderModule<'a> {
    device: &'a ash::Device,
    pub inner: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
}

impl<'a> ShaderModule<'a> {
    pub fn load(
        device: &'a ash::Device,
        stage: vk::ShaderStageFlags,
        path: &Path,
    ) -> DeviceResult<Self> {
        let shader_error = |source| DeviceError::Shader {
            path: path.to_path_buf(),
            source,
        };

        let bytes = std::fs::read(path).map_err(shader_error)?;
        let shader_code = ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(shader_error)?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&shader_code);
        let inner = unsafe { device.create_shader_module(&create_info, None) }?;

        log::debug!("Loaded shader {path:?}");
        Ok(Self {
            device,
            inner,
            stage,
        })
    }

    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfoBuilder<'_> {
        vk::PipelineShaderStageCreateInfo::builder()
            .module(self.inner)
            .name(SHADER_ENTRY_NAME)
            .stage(self.stage)
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.inner, None) };
    }
}
