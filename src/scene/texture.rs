use ash::vk;

/// A sampled image owned by the scene.
#[derive(Debug, Clone, Copy)]
pub struct Texture {
    pub image_view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub layout: vk::ImageLayout,
}

impl Texture {
    pub fn new(image_view: vk::ImageView, sampler: vk::Sampler) -> Self {
        Self {
            image_view,
            sampler,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}
