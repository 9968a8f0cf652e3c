pub mod config;
pub mod device;
pub mod render;
pub mod scene;
pub mod utility;
pub mod vulkan;

pub use config::RendererConfig;
pub use device::{Device, DeviceError};
pub use render::{FrameIndex, FrameTarget, Renderer, FRAMES_IN_FLIGHT};
pub use scene::{DirtyFlags, Scene};
