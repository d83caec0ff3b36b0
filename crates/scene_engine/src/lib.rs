//! # Scene Engine
//!
//! Render dispatch and GPU resource lifetime for a scene-editing 3D engine.
//!
//! ## Features
//!
//! - **Handle Storage**: generational handles into per-kind resource tables,
//!   partitioned into GLOBAL and SCENE lifetimes
//! - **GPU Resources**: textures, cubemaps, render buffers, meshes, shader
//!   programs and framebuffers behind a narrow [`render::GraphicsDriver`]
//! - **Render Dispatch**: materials sorted by sequence number, entities
//!   bucketed per material and pass, state bound once per material
//! - **Scene Graph**: entity hierarchy with cached world transforms
//! - **Editor**: selection, color-ID picking and a transform gizmo
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! struct Empty;
//!
//! impl Scene for Empty {
//!     fn name(&self) -> &str {
//!         "empty"
//!     }
//!
//!     fn setup(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
//!         let camera = CameraData::default();
//!         ctx.assets.create_entity(AssetScope::Scene, "camera", EntityKind::Camera(camera))?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), EngineError> {
//!     let mut engine = EngineContext::new(EngineConfig::default(), HeadlessDriver::new())?;
//!     engine.set_scene(Box::new(Empty))?;
//!     let stats = engine.frame(&FrameInput::new(1280, 720))?;
//!     println!("{} draw calls", stats.draw_calls);
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod config;
pub mod foundation;
pub mod assets;
pub mod render;
pub mod scene;
pub mod editor;
pub mod input;
pub mod debug;

mod engine;

pub use engine::{EngineContext, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        EngineContext, EngineError,
        assets::{
            AssetError, Assets, CubemapHandle, EntityHandle, FramebufferHandle, ImageData,
            MaterialHandle, MeshHandle, ProgramHandle, TextureHandle,
        },
        core::config::{AssetConfig, EngineConfig, EngineSettings, RendererConfig},
        config::{Config, ConfigError},
        editor::{Editor, Gizmo, GizmoAxis, GizmoMode, PickOutcome, Selection},
        foundation::{
            collections::AssetScope,
            math::{Mat4, Quat, Transform, Vec3},
            time::{Stopwatch, Timer},
        },
        input::{FrameInput, InputState, MouseButton, Viewport},
        render::{
            FrameStats, GraphicsDriver, HeadlessDriver, Material, PassType, PrimitiveMode, ShaderProgram,
            ProgramPair, RenderError, RenderManager, RenderMode, ShaderSource, ShaderStage,
            TextureLevel, UniformValue, Vertex,
        },
        scene::{CameraData, ColorId, Entity, EntityKind, LightData, Scene, SceneContext, SceneError},
    };
}
