//! Scene viewer
//!
//! Boots the engine over the headless driver, cycles the demo scenes and
//! logs frame statistics. An optional first argument names a `.toml` or
//! `.ron` engine config.

mod scenes;

use scene_engine::prelude::*;
use thiserror::Error;

const FRAMES_PER_SCENE: u32 = 120;

#[derive(Error, Debug)]
enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_config() -> Result<EngineConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let config = EngineConfig::load_from_file(&path)?;
            log::info!("Loaded config from {}", path);
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn run_scene(engine: &mut EngineContext<HeadlessDriver>, scene: Box<dyn Scene>) -> Result<(), EngineError> {
    engine.set_scene(scene)?;
    let (width, height) = engine.render_manager.viewport();
    let center = (width as f32 / 2.0, height as f32 / 2.0);

    let mut totals = FrameStats::default();
    for frame in 0..FRAMES_PER_SCENE {
        // Click the viewport center once, a quarter of the way in
        let mut input = FrameInput::new(width, height).with_cursor(center.0, center.1);
        if frame == FRAMES_PER_SCENE / 4 {
            input = input.with_click(MouseButton::Left);
        }
        let stats = engine.frame(&input)?;
        totals.draw_calls += stats.draw_calls;
        totals.material_binds += stats.material_binds;
        totals.fallback_textures += stats.fallback_textures;
    }

    log::info!(
        "Scene '{}': {} frames, {} draws, {} material binds, {} fallback textures, selected {:?}",
        engine.render_manager.scene_name().unwrap_or("?"),
        FRAMES_PER_SCENE,
        totals.draw_calls,
        totals.material_binds,
        totals.fallback_textures,
        engine.editor.selection.primary()
    );
    Ok(())
}

fn run() -> Result<(), ViewerError> {
    let config = load_config()?;
    let mut engine = EngineContext::new(config, HeadlessDriver::new())?;

    run_scene(&mut engine, Box::new(scenes::CubeGrid::new(4)))?;
    run_scene(&mut engine, Box::new(scenes::GlassPanes::new(4)))?;
    // Back to the first scene: asset counts must match the first load
    run_scene(&mut engine, Box::new(scenes::CubeGrid::new(4)))?;

    engine.resize(1920, 1080)?;
    let failing = engine.reload_shaders();
    if failing > 0 {
        log::warn!("{} programs failed to reload", failing);
    }

    engine.shutdown();
    log::info!("{} driver objects left after shutdown", engine.driver.live_object_count());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        log::error!("Viewer failed: {}", e);
        eprintln!("scene_viewer: {e}");
        std::process::exit(1);
    }
}
