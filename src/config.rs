use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not parse renderer config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings the embedding application hands to [`crate::Renderer::new`].
///
/// The renderer never reads or writes files itself. Applications that keep
/// their settings on disk can go through [`RendererConfig::from_json`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    /// Directory containing the compiled `.spv` shaders.
    pub shader_directory: PathBuf,
    /// Negative-height viewport, so that +y points up in clip space.
    pub flip_viewport: bool,
    /// Sign convention for the position-only fragment shader.
    pub opengl_style: bool,
    /// Clear color of the color attachments. Defaults to a loud red so that
    /// uncovered pixels stand out.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shader_directory: "shaders".into(),
            flip_viewport: false,
            opengl_style: false,
            clear_color: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl RendererConfig {
    pub fn from_json(value: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(value)?)
    }

    pub fn to_json(&self) -> String {
        // A struct of plain fields always serializes.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn shader_path(&self, name: &str) -> PathBuf {
        self.shader_directory.join(format!("{name}.spv"))
    }

    pub fn position_only_sign(&self) -> i32 {
        if self.opengl_style {
            -1
        } else {
            1
        }
    }
}
