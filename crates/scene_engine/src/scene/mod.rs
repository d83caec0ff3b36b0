//! Scene graph and scene lifecycle
//!
//! Entities are stored in [`crate::assets::Assets`] like every other asset and
//! reference each other through handles. A [`Scene`] creates its entities and
//! SCENE-scoped resources in [`Scene::setup`]; the
//! [`crate::render::RenderManager`] tears them down before the next scene's
//! setup runs.

pub mod bounds;
pub mod camera;
pub mod entity;
pub mod hierarchy;

pub use bounds::Aabb;
pub use camera::{CameraData, LightData, LightKind, Projection};
pub use entity::{ColorId, Entity, EntityKind};

use thiserror::Error;

use crate::assets::{AssetError, Assets, EntityHandle};
use crate::render::{GraphicsDriver, RenderError};

/// Everything a scene may touch while setting up or updating
pub struct SceneContext<'a> {
    /// Asset storages and factories
    pub assets: &'a mut Assets,
    /// Graphics driver for resource creation
    pub driver: &'a mut dyn GraphicsDriver,
    /// Camera the render manager draws through
    pub main_camera: &'a mut Option<EntityHandle>,
    /// Current viewport size in pixels
    pub viewport: (u32, u32),
}

/// A loadable scene
pub trait Scene {
    /// Display name
    fn name(&self) -> &str;

    /// Create the scene's entities and SCENE-scoped resources
    fn setup(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError>;

    /// Per-frame scene logic
    fn update(&mut self, _ctx: &mut SceneContext<'_>, _delta_time: f32) -> Result<(), SceneError> {
        Ok(())
    }

    /// Called before the scene's resources are destroyed
    fn destroy(&mut self, _ctx: &mut SceneContext<'_>) {}
}

/// Scene errors
#[derive(Error, Debug)]
pub enum SceneError {
    /// Asset creation failed
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Driver-level failure
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Re-parenting would create a loop
    #[error("Parenting '{child}' under '{parent}' would create a cycle")]
    HierarchyCycle {
        /// Entity being re-parented
        child: String,
        /// Requested parent
        parent: String,
    },

    /// Handle does not resolve to a live entity
    #[error("Entity handle is stale or null")]
    MissingEntity,

    /// Scene-specific setup failure
    #[error("Scene setup failed: {0}")]
    Setup(String),
}
