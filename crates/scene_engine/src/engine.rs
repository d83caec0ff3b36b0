//! Engine context
//!
//! [`EngineContext`] owns one instance of every subsystem and passes them to
//! each other explicitly. Nothing in the crate reaches for global state; two
//! contexts over two drivers are fully independent.

use thiserror::Error;

use crate::assets::{AssetError, Assets};
use crate::config::ConfigError;
use crate::core::config::EngineConfig;
use crate::editor::{Editor, PickOutcome};
use crate::foundation::{logging, time::Timer};
use crate::input::{InputState, Viewport};
use crate::render::{FrameStats, GraphicsDriver, RenderError, RenderManager};
use crate::scene::{Scene, SceneError};

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Asset creation failed
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Rendering failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Scene setup or update failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Every subsystem of one engine instance
pub struct EngineContext<D: GraphicsDriver> {
    /// Configuration the context was built from
    pub config: EngineConfig,
    /// Graphics driver
    pub driver: D,
    /// Resource storages
    pub assets: Assets,
    /// Sort caches, dispatch and scene transitions
    pub render_manager: RenderManager,
    /// Selection and gizmo
    pub editor: Editor,
    timer: Timer,
}

impl<D: GraphicsDriver> EngineContext<D> {
    /// Validate `config`, start logging and create the GLOBAL defaults
    ///
    /// Fails when the error material cannot be built, since nothing could be
    /// drawn in place of a broken material.
    pub fn new(config: EngineConfig, mut driver: D) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init_with_level(&config.engine.log_level);
        log::info!(
            "Initializing engine ({}x{}, picking {})",
            config.renderer.viewport_width,
            config.renderer.viewport_height,
            if config.renderer.enable_picking { "on" } else { "off" }
        );

        let validate = config.engine.debug_mode;
        let mut assets = Assets::new();
        assets.init_global_defaults(&mut driver, config.renderer.error_color, validate)?;

        let mut render_manager = RenderManager::new(&config.renderer, validate);
        render_manager.create_viewport_fbos(&mut assets, &mut driver)?;

        Ok(Self {
            config,
            driver,
            assets,
            render_manager,
            editor: Editor::new(),
            timer: Timer::new(),
        })
    }

    /// Replace the running scene
    pub fn set_scene(&mut self, scene: Box<dyn Scene>) -> Result<(), EngineError> {
        self.editor.gizmo.end_drag();
        self.render_manager
            .set_new_scene(scene, &mut self.assets, &mut self.driver, &mut self.editor.selection)?;
        Ok(())
    }

    /// Run one frame: scene update, click picking, then the core pass
    ///
    /// A failed pick is logged and does not abort the frame.
    pub fn frame<I>(&mut self, input: &I) -> Result<FrameStats, EngineError>
    where
        I: InputState + Viewport + ?Sized,
    {
        self.timer.update();
        self.render_manager
            .update_scene(&mut self.assets, &mut self.driver, self.timer.delta_time())?;

        match self
            .editor
            .handle_input(input, &mut self.render_manager, &mut self.assets, &mut self.driver)
        {
            Ok(PickOutcome::Selected(entity)) => log::debug!("Selected {:?}", entity),
            Ok(_) => {}
            Err(e) => log::error!("Picking failed: {}", e),
        }

        Ok(self.render_manager.render_frame(&mut self.assets, &mut self.driver)?)
    }

    /// Recompile every program; returns how many still fail to link
    pub fn reload_shaders(&mut self) -> usize {
        self.render_manager.reload_shaders(&mut self.assets, &mut self.driver)
    }

    /// Follow a window resize
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        self.render_manager
            .reload_window(&mut self.assets, &mut self.driver, width, height)?;
        Ok(())
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    /// Destroy the scene, then every GLOBAL asset
    pub fn shutdown(&mut self) {
        log::info!("Shutting down after {} frames in {:.1?}", self.timer.frame_count(), self.timer.uptime());
        self.render_manager
            .shutdown(&mut self.assets, &mut self.driver, &mut self.editor.selection);
        self.assets.shutdown(&mut self.driver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDriver;

    #[test]
    fn test_new_creates_globals_and_viewport_fbos() {
        let engine = EngineContext::new(EngineConfig::default(), HeadlessDriver::new()).unwrap();
        assert!(engine.render_manager.scene_framebuffer().is_some());
        assert!(engine.render_manager.picking_framebuffer().is_some());
        assert!(engine.assets.material(engine.assets.error_material()).is_some());
        assert_eq!(engine.assets.scene_asset_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.renderer.viewport_width = 0;
        let result = EngineContext::new(config, HeadlessDriver::new());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_shutdown_releases_every_driver_object() {
        let mut engine = EngineContext::new(EngineConfig::default(), HeadlessDriver::new()).unwrap();
        engine.shutdown();
        assert_eq!(engine.driver.live_object_count(), 0);
    }
}
