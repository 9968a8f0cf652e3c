use ash::vk;

pub const POSITION_ATTRIBUTE: &str = "pos";
pub const NORMAL_ATTRIBUTE: &str = "N";
pub const UV_ATTRIBUTE: &str = "uv";
pub const TANGENT_ATTRIBUTE: &str = "tan";

/// One non-interleaved vertex stream.
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub name: String,
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub format: vk::Format,
}

impl VertexAttribute {
    pub fn new(name: &str, buffer: vk::Buffer, offset: vk::DeviceSize) -> Self {
        Self {
            name: name.to_string(),
            buffer,
            offset,
            format: attribute_format(name),
        }
    }

    pub fn stride(&self) -> u32 {
        format_size(self.format)
    }
}

/// Device-resident mesh data with `u32` indices.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub attributes: Vec<VertexAttribute>,
    pub vertex_count: u32,
    pub index_buffer: vk::Buffer,
    pub index_offset: vk::DeviceSize,
    pub index_count: u32,
}

impl Geometry {
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

pub fn attribute_format(name: &str) -> vk::Format {
    match name {
        UV_ATTRIBUTE => vk::Format::R32G32_SFLOAT,
        _ => vk::Format::R32G32B32_SFLOAT,
    }
}

pub fn format_size(format: vk::Format) -> u32 {
    match format {
        vk::Format::R32G32_SFLOAT => 8,
        vk::Format::R32G32B32_SFLOAT => 12,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => 4,
    }
}
