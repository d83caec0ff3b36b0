//! # Unified Configuration System
//!
//! Configuration for the engine core, the render manager and asset loading.
//! Every section has sensible defaults so an empty file is a valid config.
//!
//! ## Configuration Categories
//!
//! - **Engine Settings**: logging and debug behaviour
//! - **Renderer Config**: viewport, clear color, picking, fallback material
//! - **Asset Config**: asset root and shader directory

use serde::{Serialize, Deserialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};

/// # Engine Settings
///
/// Core engine behaviour shared by every subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Validate shader programs after linking
    pub debug_mode: bool,
    /// Target FPS for frame pacing (None = unlimited)
    pub target_fps: Option<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: cfg!(debug_assertions),
            target_fps: None,
        }
    }
}

/// # Renderer Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial viewport width in pixels
    pub viewport_width: u32,
    /// Initial viewport height in pixels
    pub viewport_height: u32,
    /// Clear color of the scene framebuffer (RGBA)
    pub clear_color: [f32; 4],
    /// Render the color-ID pass and resolve mouse picks
    pub enable_picking: bool,
    /// Flat color output by the error material
    pub error_color: [f32; 4],
    /// Upper bound on named frame timers kept alive at once
    pub max_frame_timers: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 720,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            enable_picking: true,
            error_color: [1.0, 0.0, 0.8, 1.0],
            max_frame_timers: 32,
        }
    }
}

impl RendererConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err("Viewport dimensions must be non-zero".to_string());
        }
        if self.max_frame_timers == 0 {
            return Err("At least one frame timer must be allowed".to_string());
        }
        Ok(())
    }
}

/// # Asset Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Base directory for assets
    pub assets_dir: PathBuf,
    /// Directory holding GLSL sources, relative to `assets_dir`
    pub shader_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("resources"),
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

impl AssetConfig {
    /// Resolve a shader file name against the configured directories
    pub fn shader_path(&self, file_name: &str) -> PathBuf {
        self.assets_dir.join(&self.shader_dir).join(file_name)
    }
}

/// # Complete Engine Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine core configuration
    pub engine: EngineSettings,
    /// Rendering configuration
    pub renderer: RendererConfig,
    /// Asset system configuration
    pub assets: AssetConfig,
}

impl EngineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_viewport_is_rejected() {
        let mut config = EngineConfig::default();
        config.renderer.viewport_height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = "[renderer]\nviewport_width = 640\nviewport_height = 480\n";
        let config = EngineConfig::from_str_with_format(text, "engine.toml").unwrap();
        assert_eq!(config.renderer.viewport_width, 640);
        assert_eq!(config.renderer.viewport_height, 480);
        assert!(config.renderer.enable_picking);
        assert_eq!(config.engine.log_level, "info");
    }

    #[test]
    fn test_ron_round_trip_through_text() {
        let config = EngineConfig::default();
        let text = ron::ser::to_string(&config).unwrap();
        let parsed = EngineConfig::from_str_with_format(&text, "engine.ron").unwrap();
        assert_eq!(parsed.renderer.viewport_width, config.renderer.viewport_width);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = EngineConfig::from_str_with_format("", "engine.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_shader_path_joins_directories() {
        let assets = AssetConfig::default();
        assert_eq!(
            assets.shader_path("basic.vert"),
            PathBuf::from("resources").join("shaders").join("basic.vert")
        );
    }
}
