//! Render dispatch
//!
//! The [`RenderManager`] keeps two lazily rebuilt caches:
//!
//! - the material sequence: sequence number -> material handle, ascending
//! - per-material entity buckets, split into opaque and transparent, each
//!   sorted by mesh handle and then entity ID so draws of the same mesh are
//!   adjacent and the order is identical from run to run
//!
//! Both caches carry a dirty flag. Flags are raised by
//! [`RenderManager::dirty_material_sequence`] /
//! [`RenderManager::dirty_entity_sequence`] or pulled from the change
//! notifications [`Assets`] records, and the caches are rebuilt at most once
//! per frame before drawing.
//!
//! A frame binds each material's program, state and shared textures once and
//! then loops over its bucket binding only per-entity uniforms (and
//! per-entity textures for materials that do not share them). The opaque
//! pass always runs before the transparent pass.
//!
//! The manager also owns the scene transition protocol: the outgoing scene's
//! SCENE-scoped assets are destroyed completely before the incoming scene's
//! setup runs.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::assets::{AssetError, Assets, EntityHandle, FramebufferHandle, MaterialHandle};
use crate::core::config::RendererConfig;
use crate::debug::DiagnosticCategory;
use crate::editor::Selection;
use crate::foundation::collections::AssetScope;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::driver::{ClearMask, GraphicsDriver, TextureFormat};
use crate::render::material::{PassType, RenderMode, SequenceId};
use crate::render::resources::{FramebufferSize, TargetKind};
use crate::render::timers::FrameTimers;
use crate::render::{RenderError, RenderResult};
use crate::scene::{CameraData, ColorId, Entity, Scene, SceneContext, SceneError};

const FRAME_TIMER: &str = "frame";
const SCENE_GPU_TIMER: &str = "scene_gpu";

/// Camera matrices uploaded once per material bind
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// Eye position in world space
    pub camera_position: Vec3,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            camera_position: Vec3::zeros(),
        }
    }
}

impl FrameUniforms {
    /// Matrices of a camera entity; `None` for other kinds
    pub fn from_camera(entity: &Entity) -> Option<Self> {
        let camera = entity.as_camera()?;
        Some(Self {
            view: CameraData::view_matrix(entity.world_matrix()),
            projection: camera.projection_matrix(),
            camera_position: entity.world_position(),
        })
    }
}

/// Counters of the last rendered pass set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Mesh draw calls issued
    pub draw_calls: u32,
    /// Materials bound (program + state)
    pub material_binds: u32,
    /// Bucket entries skipped: stale, hidden, meshless or failing to draw
    pub skipped_entities: u32,
    /// Null images bound in place of missing textures
    pub fallback_textures: u32,
    /// Materials drawn with the error material instead
    pub error_material_fallbacks: u32,
    /// CPU time of the last [`RenderManager::render_frame`]
    pub cpu_frame_time: Option<Duration>,
}

/// Sorts and dispatches draws; owns the scene transition protocol
pub struct RenderManager {
    material_sequence: BTreeMap<SequenceId, MaterialHandle>,
    opaque: HashMap<MaterialHandle, Vec<EntityHandle>>,
    transparent: HashMap<MaterialHandle, Vec<EntityHandle>>,
    material_order_dirty: bool,
    entity_order_dirty: bool,
    main_camera: Option<EntityHandle>,
    scene: Option<Box<dyn Scene>>,
    scene_fbo: Option<FramebufferHandle>,
    picking_fbo: Option<FramebufferHandle>,
    timers: FrameTimers,
    stats: FrameStats,
    frame: FrameUniforms,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    picking_enabled: bool,
    validate_programs: bool,
}

impl RenderManager {
    /// Create a manager with empty caches
    ///
    /// `validate_programs` enables program validation after every link.
    pub fn new(config: &RendererConfig, validate_programs: bool) -> Self {
        Self {
            material_sequence: BTreeMap::new(),
            opaque: HashMap::new(),
            transparent: HashMap::new(),
            material_order_dirty: true,
            entity_order_dirty: true,
            main_camera: None,
            scene: None,
            scene_fbo: None,
            picking_fbo: None,
            timers: FrameTimers::new(config.max_frame_timers),
            stats: FrameStats::default(),
            frame: FrameUniforms::default(),
            viewport: (config.viewport_width, config.viewport_height),
            clear_color: config.clear_color,
            picking_enabled: config.enable_picking,
            validate_programs,
        }
    }

    /// Create the fullscreen scene framebuffer and, if enabled, the picking one
    pub fn create_viewport_fbos(
        &mut self,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
    ) -> Result<(), AssetError> {
        self.scene_fbo = Some(self.create_viewport_fbo(assets, driver, "scene")?);
        if self.picking_enabled {
            self.picking_fbo = Some(self.create_viewport_fbo(assets, driver, "picking")?);
        }
        Ok(())
    }

    fn create_viewport_fbo(
        &self,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
        name: &str,
    ) -> Result<FramebufferHandle, AssetError> {
        let handle =
            assets.create_framebuffer(driver, AssetScope::Global, name, FramebufferSize::Fullscreen, self.viewport)?;
        let fbo = assets
            .framebuffer_mut(handle)
            .ok_or(RenderError::InvalidHandle("framebuffer"))?;

        fbo.bind(driver);
        let color = format!("{name}_color");
        fbo.new_attachment(driver, 0, TargetKind::Texture, &color, TextureFormat::Rgba8, false)?;
        fbo.set_depth(driver, TargetKind::Buffer, TextureFormat::Depth24Stencil8)?;
        let complete = fbo.check_status(driver);
        fbo.unbind(driver);

        if !complete {
            assets
                .diagnostics_mut()
                .record(DiagnosticCategory::Framebuffer, name, "incomplete after creation");
        }
        Ok(handle)
    }

    // ---- cache invalidation ----

    /// Force a material-sequence rebuild before the next render
    pub fn dirty_material_sequence(&mut self) {
        self.material_order_dirty = true;
    }

    /// Force an entity-bucket rebuild before the next render
    pub fn dirty_entity_sequence(&mut self) {
        self.entity_order_dirty = true;
    }

    /// Whether the material sequence will be rebuilt
    pub fn is_material_order_dirty(&self) -> bool {
        self.material_order_dirty
    }

    /// Whether the entity buckets will be rebuilt
    pub fn is_entity_order_dirty(&self) -> bool {
        self.entity_order_dirty
    }

    /// Pull the change notifications recorded by `assets`
    pub fn sync_order_changes(&mut self, assets: &mut Assets) {
        let changes = assets.take_order_changes();
        if changes.materials {
            self.dirty_material_sequence();
        }
        if changes.entities {
            self.dirty_entity_sequence();
        }
    }

    // ---- sorting ----

    /// Rebuild the material sequence if dirty; returns whether it was rebuilt
    ///
    /// Materials without a sequence number are left out and never drawn by
    /// the sorted passes.
    pub fn sort_materials(&mut self, assets: &mut Assets) -> bool {
        self.sync_order_changes(assets);
        if !self.material_order_dirty {
            return false;
        }

        self.material_sequence = assets
            .materials()
            .filter_map(|(handle, material)| material.sequence().map(|seq| (seq, handle)))
            .collect();
        self.material_order_dirty = false;

        log::debug!("Material sequence rebuilt: {} materials", self.material_sequence.len());
        true
    }

    /// Rebuild the entity buckets if dirty; returns whether they were rebuilt
    pub fn sort_entities(&mut self, assets: &mut Assets) -> bool {
        self.sync_order_changes(assets);
        if !self.entity_order_dirty {
            return false;
        }

        self.opaque.clear();
        self.transparent.clear();
        for (handle, material) in assets.materials() {
            match material.mode() {
                RenderMode::Opaque => self.opaque.insert(handle, Vec::new()),
                RenderMode::Transparent => self.transparent.insert(handle, Vec::new()),
            };
        }

        for (handle, entity) in assets.entities() {
            let Some(material) = entity.material() else { continue };
            let bucket = match assets.material(material).map(|m| m.mode()) {
                Some(RenderMode::Opaque) => self.opaque.get_mut(&material),
                Some(RenderMode::Transparent) => self.transparent.get_mut(&material),
                None => None,
            };
            if let Some(bucket) = bucket {
                bucket.push(handle);
            }
        }

        let assets = &*assets;
        for bucket in self.opaque.values_mut().chain(self.transparent.values_mut()) {
            bucket.sort_by_key(|handle| {
                let entity = assets.entity(*handle);
                (entity.and_then(Entity::mesh), entity.map(Entity::id))
            });
        }
        self.entity_order_dirty = false;

        log::debug!(
            "Entity buckets rebuilt: {} opaque, {} transparent materials",
            self.opaque.len(),
            self.transparent.len()
        );
        true
    }

    /// Materials in draw order
    pub fn material_order(&self) -> Vec<MaterialHandle> {
        self.material_sequence.values().copied().collect()
    }

    /// Opaque bucket of a material
    pub fn opaque_bucket(&self, material: MaterialHandle) -> Option<&[EntityHandle]> {
        self.opaque.get(&material).map(Vec::as_slice)
    }

    /// Transparent bucket of a material
    pub fn transparent_bucket(&self, material: MaterialHandle) -> Option<&[EntityHandle]> {
        self.transparent.get(&material).map(Vec::as_slice)
    }

    // ---- dispatch ----

    /// Draw one material's entities
    ///
    /// If the material's program cannot be bound the error material is drawn
    /// in its place; if that fails too the frame cannot continue.
    pub fn render(
        &mut self,
        material: MaterialHandle,
        entities: &[EntityHandle],
        pass: PassType,
        assets: &Assets,
        driver: &mut dyn GraphicsDriver,
    ) -> RenderResult<()> {
        dispatch(&mut self.stats, &self.frame, material, entities, pass, assets, driver)
    }

    /// Draw every opaque bucket in sequence order
    pub fn render_opaque(
        &mut self,
        pass: PassType,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
    ) -> RenderResult<()> {
        self.render_buckets(RenderMode::Opaque, pass, assets, driver)
    }

    /// Draw every transparent bucket in sequence order
    pub fn render_transparent(
        &mut self,
        pass: PassType,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
    ) -> RenderResult<()> {
        self.render_buckets(RenderMode::Transparent, pass, assets, driver)
    }

    fn render_buckets(
        &mut self,
        mode: RenderMode,
        pass: PassType,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
    ) -> RenderResult<()> {
        self.sort_materials(assets);
        self.sort_entities(assets);

        let Self { material_sequence, opaque, transparent, stats, frame, .. } = self;
        let buckets = match mode {
            RenderMode::Opaque => opaque,
            RenderMode::Transparent => transparent,
        };
        for material in material_sequence.values() {
            let Some(entities) = buckets.get(material) else { continue };
            if entities.is_empty() {
                continue;
            }
            dispatch(stats, frame, *material, entities, pass, assets, driver)?;
        }
        Ok(())
    }

    /// Update transforms and camera matrices, reset the counters
    pub fn begin_frame(&mut self, assets: &mut Assets) {
        self.stats = FrameStats::default();
        assets.update_transforms();
        self.refresh_frame_uniforms(assets);
    }

    fn refresh_frame_uniforms(&mut self, assets: &Assets) {
        let camera = self.main_camera.and_then(|h| assets.entity(h));
        self.frame = match camera.and_then(FrameUniforms::from_camera) {
            Some(frame) => frame,
            None => {
                if self.main_camera.is_some() {
                    log::warn!("Main camera is gone, rendering with identity matrices");
                    self.main_camera = None;
                }
                FrameUniforms::default()
            }
        };
    }

    /// Render the core pass into the scene framebuffer
    ///
    /// Falls back to the default framebuffer when no viewport framebuffers
    /// were created.
    pub fn render_frame(&mut self, assets: &mut Assets, driver: &mut dyn GraphicsDriver) -> RenderResult<FrameStats> {
        self.timers.begin_cpu(FRAME_TIMER);
        self.begin_frame(assets);

        let (width, height) = self.viewport;
        match self.scene_fbo.and_then(|h| assets.framebuffer(h)) {
            Some(fbo) => fbo.clear_buffers(driver, self.clear_color),
            None => {
                driver.bind_framebuffer(None);
                driver.clear(ClearMask::COLOR | ClearMask::DEPTH, self.clear_color, 1.0);
            }
        }
        driver.set_viewport(0, 0, width, height);

        let result = self.timers.begin_gpu(driver, SCENE_GPU_TIMER).and_then(|timing| {
            let drawn = self
                .render_opaque(PassType::Core, assets, driver)
                .and_then(|()| self.render_transparent(PassType::Core, assets, driver));
            if timing {
                self.timers.end_gpu(driver, SCENE_GPU_TIMER);
            }
            drawn
        });
        driver.bind_framebuffer(None);
        let cpu_frame_time = self.timers.end_cpu(FRAME_TIMER);
        result?;

        self.stats.cpu_frame_time = cpu_frame_time;
        log::trace!(
            "Frame: {} draws, {} material binds, {} skipped",
            self.stats.draw_calls,
            self.stats.material_binds,
            self.stats.skipped_entities
        );
        Ok(self.stats)
    }

    /// Render the color-ID pass and decode the entity under one pixel
    ///
    /// `(x, y)` is in framebuffer coordinates, origin bottom-left. Stalls
    /// until the GPU has finished; call at most once per frame.
    pub fn pick(
        &mut self,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
        x: u32,
        y: u32,
    ) -> RenderResult<Option<EntityHandle>> {
        let Some(handle) = self.picking_fbo else {
            return Ok(None);
        };
        assets.update_transforms();
        self.refresh_frame_uniforms(assets);

        let fbo = assets.framebuffer(handle).ok_or(RenderError::InvalidHandle("framebuffer"))?;
        fbo.clear_buffers(driver, [0.0, 0.0, 0.0, 0.0]);
        driver.set_viewport(0, 0, fbo.width(), fbo.height());

        let drawn = self
            .render_opaque(PassType::ColorId, assets, driver)
            .and_then(|()| self.render_transparent(PassType::ColorId, assets, driver));
        let pixel = drawn.and_then(|()| {
            let fbo = assets.framebuffer(handle).ok_or(RenderError::InvalidHandle("framebuffer"))?;
            fbo.read_pixels(driver, 0, x, y, 1, 1)
        });
        driver.bind_framebuffer(None);

        let picked = ColorId::from_rgb8(&pixel?).and_then(|id| assets.entity_by_color_id(id));
        log::debug!("Pick at ({}, {}): {:?}", x, y, picked);
        Ok(picked)
    }

    /// Depth under one pixel of the scene framebuffer
    pub fn read_scene_depth(&self, assets: &Assets, driver: &mut dyn GraphicsDriver, x: u32, y: u32) -> RenderResult<Option<f32>> {
        let fbo = self
            .scene_fbo
            .and_then(|h| assets.framebuffer(h))
            .ok_or(RenderError::InvalidHandle("framebuffer"))?;
        fbo.read_depth(driver, x, y)
    }

    // ---- scene lifecycle ----

    /// Tear down the current scene and set up `scene`
    ///
    /// The previous scene's SCENE assets are fully destroyed before the new
    /// setup runs. If setup fails, whatever it created is destroyed too.
    pub fn set_new_scene(
        &mut self,
        mut scene: Box<dyn Scene>,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
        selection: &mut Selection,
    ) -> Result<(), SceneError> {
        if let Some(mut old) = self.scene.take() {
            log::info!("Leaving scene '{}'", old.name());
            let mut ctx = SceneContext {
                assets: &mut *assets,
                driver: &mut *driver,
                main_camera: &mut self.main_camera,
                viewport: self.viewport,
            };
            old.destroy(&mut ctx);
        }
        self.destroy_scene_gl_resources(assets, driver, selection);

        log::info!("Setting up scene '{}'", scene.name());
        let mut ctx = SceneContext {
            assets: &mut *assets,
            driver: &mut *driver,
            main_camera: &mut self.main_camera,
            viewport: self.viewport,
        };
        if let Err(e) = scene.setup(&mut ctx) {
            log::error!("Scene '{}' failed to set up: {}", scene.name(), e);
            assets.diagnostics_mut().record(DiagnosticCategory::Scene, scene.name(), e.to_string());
            self.destroy_scene_gl_resources(assets, driver, selection);
            return Err(e);
        }

        if self.main_camera.is_none() {
            self.main_camera = assets.first_camera();
        }
        self.apply_camera_aspect(assets);
        self.dirty_material_sequence();
        self.dirty_entity_sequence();
        log::info!("Scene '{}' ready: {} scene assets", scene.name(), assets.scene_asset_count());
        self.scene = Some(scene);
        Ok(())
    }

    /// Run the current scene's per-frame logic
    pub fn update_scene(
        &mut self,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
        delta_time: f32,
    ) -> Result<(), SceneError> {
        let Some(scene) = self.scene.as_mut() else { return Ok(()) };
        let mut ctx = SceneContext {
            assets,
            driver,
            main_camera: &mut self.main_camera,
            viewport: self.viewport,
        };
        scene.update(&mut ctx, delta_time)
    }

    /// Destroy every SCENE asset, the frame timers and the selection
    pub fn destroy_scene_gl_resources(
        &mut self,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
        selection: &mut Selection,
    ) {
        selection.clear();
        self.timers.destroy_all(driver);
        if self
            .main_camera
            .is_some_and(|h| assets.entity(h).is_none() || is_scene_scoped(assets, h))
        {
            self.main_camera = None;
        }
        assets.destroy_and_erase_all(driver, AssetScope::Scene);
        self.material_sequence.clear();
        self.opaque.clear();
        self.transparent.clear();
        self.dirty_material_sequence();
        self.dirty_entity_sequence();
    }

    /// Tear down the current scene and release the viewport framebuffers
    pub fn shutdown(&mut self, assets: &mut Assets, driver: &mut dyn GraphicsDriver, selection: &mut Selection) {
        if let Some(mut scene) = self.scene.take() {
            let mut ctx = SceneContext {
                assets: &mut *assets,
                driver: &mut *driver,
                main_camera: &mut self.main_camera,
                viewport: self.viewport,
            };
            scene.destroy(&mut ctx);
        }
        self.destroy_scene_gl_resources(assets, driver, selection);
        for handle in [self.scene_fbo.take(), self.picking_fbo.take()].into_iter().flatten() {
            assets.destroy_framebuffer(driver, handle);
        }
    }

    // ---- reloads ----

    /// Recompile and relink every program; returns how many still fail
    pub fn reload_shaders(&mut self, assets: &mut Assets, driver: &mut dyn GraphicsDriver) -> usize {
        log::info!("Reloading shaders");
        assets.reload_all_programs(driver, self.validate_programs)
    }

    /// Follow a window resize: camera aspect and viewport framebuffers
    pub fn reload_window(
        &mut self,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        self.viewport = (width, height);
        self.apply_camera_aspect(assets);
        self.reload_viewport_fbos(assets, driver)
    }

    /// Resize every fullscreen viewport framebuffer to the current viewport
    pub fn reload_viewport_fbos(&mut self, assets: &mut Assets, driver: &mut dyn GraphicsDriver) -> RenderResult<()> {
        let (width, height) = self.viewport;
        for handle in [self.scene_fbo, self.picking_fbo].into_iter().flatten() {
            if let Some(fbo) = assets.framebuffer_mut(handle) {
                fbo.on_viewport_resize(driver, width, height)?;
            }
        }
        log::info!("Viewport framebuffers at {}x{}", width, height);
        Ok(())
    }

    fn apply_camera_aspect(&self, assets: &mut Assets) {
        let (width, height) = self.viewport;
        let aspect = crate::foundation::math::utils::aspect_ratio(width, height);
        if let Some(camera) = self
            .main_camera
            .and_then(|h| assets.entity_mut(h))
            .and_then(Entity::as_camera_mut)
        {
            camera.set_aspect_ratio(aspect);
        }
    }

    // ---- accessors ----

    /// Camera the scene is rendered through
    pub fn main_camera(&self) -> Option<EntityHandle> {
        self.main_camera
    }

    /// Switch cameras
    pub fn set_main_camera(&mut self, camera: Option<EntityHandle>) {
        self.main_camera = camera;
    }

    /// Counters of the last frame
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Current per-frame uniforms
    pub fn frame_uniforms(&self) -> &FrameUniforms {
        &self.frame
    }

    /// Viewport size in pixels
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Scene color + depth framebuffer
    pub fn scene_framebuffer(&self) -> Option<FramebufferHandle> {
        self.scene_fbo
    }

    /// Color-ID framebuffer
    pub fn picking_framebuffer(&self) -> Option<FramebufferHandle> {
        self.picking_fbo
    }

    /// Whether click picking has a framebuffer to render into
    pub fn picking_enabled(&self) -> bool {
        self.picking_enabled && self.picking_fbo.is_some()
    }

    /// Whether a scene is loaded
    pub fn has_scene(&self) -> bool {
        self.scene.is_some()
    }

    /// Name of the loaded scene
    pub fn scene_name(&self) -> Option<&str> {
        self.scene.as_deref().map(|s| s.name())
    }

    /// Frame timers
    pub fn timers(&self) -> &FrameTimers {
        &self.timers
    }

    /// Mutable frame timers, for caller-defined sections
    pub fn timers_mut(&mut self) -> &mut FrameTimers {
        &mut self.timers
    }
}

fn is_scene_scoped(assets: &Assets, handle: EntityHandle) -> bool {
    assets.entity_scope(handle) == Some(AssetScope::Scene)
}

fn dispatch(
    stats: &mut FrameStats,
    frame: &FrameUniforms,
    handle: MaterialHandle,
    entities: &[EntityHandle],
    pass: PassType,
    assets: &Assets,
    driver: &mut dyn GraphicsDriver,
) -> RenderResult<()> {
    let Some(mut material) = assets.material(handle) else {
        stats.skipped_entities += entities.len() as u32;
        return Ok(());
    };

    if !material.bind_program(assets, driver, pass, frame) {
        log::warn!("Material '{}' cannot bind its {:?} program, using the error material", material.name(), pass);
        material = assets
            .material(assets.error_material())
            .ok_or(RenderError::ErrorMaterialUnavailable)?;
        if !material.bind_program(assets, driver, pass, frame) {
            log::error!("Error material cannot be bound");
            return Err(RenderError::ErrorMaterialUnavailable);
        }
        stats.error_material_fallbacks += 1;
    }
    stats.material_binds += 1;

    material.bind_program_states(driver, pass);
    if material.shares_textures() {
        stats.fallback_textures += material.bind_textures(assets, driver, pass, None) as u32;
    }

    for handle in entities {
        let Some(entity) = assets.entity(*handle) else {
            stats.skipped_entities += 1;
            continue;
        };
        if !entity.is_visible() || (pass == PassType::ColorId && !entity.is_selectable()) {
            stats.skipped_entities += 1;
            continue;
        }
        let Some(mesh) = entity.mesh().and_then(|m| assets.mesh(m)) else {
            stats.skipped_entities += 1;
            continue;
        };

        if !material.shares_textures() {
            stats.fallback_textures += material.bind_textures(assets, driver, pass, Some(entity)) as u32;
        }
        material.bind_program_uniforms(assets, driver, pass, entity);
        match mesh.draw(driver) {
            Ok(_) => stats.draw_calls += 1,
            Err(e) => {
                log::error!("Entity '{}' not drawn: {}", entity.name(), e);
                stats.skipped_entities += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::driver::{PrimitiveMode, UniformValue};
    use crate::render::material::{Material, ProgramPair};
    use crate::render::resources::Vertex;
    use crate::render::{DriverCall, HeadlessDriver};
    use crate::scene::EntityKind;

    struct Fixture {
        driver: HeadlessDriver,
        assets: Assets,
        manager: RenderManager,
    }

    fn fixture() -> Fixture {
        let mut driver = HeadlessDriver::new();
        let mut assets = Assets::new();
        assets.init_global_defaults(&mut driver, [1.0, 0.0, 1.0, 1.0], false).unwrap();
        let manager = RenderManager::new(&RendererConfig::default(), false);
        Fixture { driver, assets, manager }
    }

    impl Fixture {
        fn material(&mut self, name: &str, sequence: Option<u32>) -> MaterialHandle {
            let program = self.assets.color_id_program();
            let material = Material::new(name, ProgramPair::new(program))
                .with_uniform("u_tag", UniformValue::Int(sequence.map_or(-1, |s| s as i32)));
            self.assets.create_material(AssetScope::Scene, material, sequence).unwrap()
        }

        fn entity(&mut self, material: MaterialHandle) -> EntityHandle {
            let vertices = [Vertex::at(0.0, 0.0, 0.0), Vertex::at(1.0, 0.0, 0.0), Vertex::at(0.0, 1.0, 0.0)];
            let mesh = self
                .assets
                .create_mesh(&mut self.driver, AssetScope::Scene, "tri", &vertices, None, PrimitiveMode::Triangles)
                .unwrap();
            let entity = self.assets.create_entity(AssetScope::Scene, "e", EntityKind::GameObject).unwrap();
            self.assets.set_entity_mesh(entity, Some(mesh));
            self.assets.set_entity_material(entity, Some(material));
            entity
        }

        fn tags(&self) -> Vec<i32> {
            self.driver
                .calls()
                .iter()
                .filter_map(|call| match call {
                    DriverCall::SetUniform { name, value: UniformValue::Int(tag), .. } if name == "u_tag" => Some(*tag),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_unsequenced_material_is_not_drawn() {
        let mut f = fixture();
        let sequenced = f.material("a", Some(4));
        let unsequenced = f.material("b", None);
        f.entity(sequenced);
        f.entity(unsequenced);

        f.manager.render_opaque(PassType::Core, &mut f.assets, &mut f.driver).unwrap();
        assert_eq!(f.tags(), vec![4]);
        assert_eq!(f.manager.stats().draw_calls, 1);
    }

    #[test]
    fn test_material_without_entities_is_skipped() {
        let mut f = fixture();
        let empty = f.material("empty", Some(1));
        let used = f.material("used", Some(2));
        f.entity(used);

        f.manager.render_opaque(PassType::Core, &mut f.assets, &mut f.driver).unwrap();
        assert_eq!(f.tags(), vec![2]);
        assert_eq!(f.manager.opaque_bucket(empty), Some(&[][..]));
    }

    #[test]
    fn test_transparent_materials_use_their_own_bucket() {
        let mut f = fixture();
        let glass = f.material("glass", Some(1));
        f.assets.set_material_render_mode(glass, RenderMode::Transparent);
        let entity = f.entity(glass);

        f.manager.sort_entities(&mut f.assets);
        assert_eq!(f.manager.transparent_bucket(glass), Some(&[entity][..]));
        assert!(f.manager.opaque_bucket(glass).is_none());

        f.manager.render_opaque(PassType::Core, &mut f.assets, &mut f.driver).unwrap();
        assert!(f.tags().is_empty());
        f.manager.render_transparent(PassType::Core, &mut f.assets, &mut f.driver).unwrap();
        assert_eq!(f.tags(), vec![1]);
    }

    #[test]
    fn test_buckets_sort_by_mesh_then_id() {
        let mut f = fixture();
        let material = f.material("m", Some(1));
        let first = f.entity(material);
        let second = f.entity(material);
        let first_mesh = f.assets.entity(first).unwrap().mesh();
        // Both on the first mesh: entity ID breaks the tie
        f.assets.set_entity_mesh(second, first_mesh);

        f.manager.sort_entities(&mut f.assets);
        assert_eq!(f.manager.opaque_bucket(material), Some(&[first, second][..]));
    }

    #[test]
    fn test_sorting_is_lazy() {
        let mut f = fixture();
        f.material("m", Some(1));
        assert!(f.manager.sort_materials(&mut f.assets));
        assert!(!f.manager.sort_materials(&mut f.assets));

        f.manager.dirty_material_sequence();
        assert!(f.manager.sort_materials(&mut f.assets));
    }

    #[test]
    fn test_hidden_entity_is_skipped() {
        let mut f = fixture();
        let material = f.material("m", Some(1));
        let entity = f.entity(material);
        f.assets.entity_mut(entity).unwrap().set_visible(false);

        f.manager.render_opaque(PassType::Core, &mut f.assets, &mut f.driver).unwrap();
        let stats = f.manager.stats();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.skipped_entities, 1);
    }

    #[test]
    fn test_broken_program_falls_back_to_error_material() {
        let mut f = fixture();
        let broken = f
            .assets
            .create_program(
                &mut f.driver,
                AssetScope::Scene,
                "broken",
                vec![(crate::render::ShaderStage::Fragment, crate::render::ShaderSource::Inline("#error".into()))],
                false,
            )
            .unwrap();
        let material = f
            .assets
            .create_material(AssetScope::Scene, Material::new("bad", ProgramPair::new(broken)), Some(1))
            .unwrap();
        f.entity(material);

        f.manager.render_opaque(PassType::Core, &mut f.assets, &mut f.driver).unwrap();
        let stats = f.manager.stats();
        assert_eq!(stats.error_material_fallbacks, 1);
        assert_eq!(stats.draw_calls, 1);

        let error_material = f.assets.material(f.assets.error_material()).unwrap();
        let error_program = f.assets.program(error_material.programs().core).unwrap().id();
        assert!(f.driver.calls().contains(&DriverCall::UseProgram(Some(error_program))));
    }

    #[test]
    fn test_failed_frame_stops_frame_timer() {
        let mut f = Fixture {
            driver: HeadlessDriver::new(),
            assets: Assets::new(),
            manager: RenderManager::new(&RendererConfig::default(), false),
        };
        let broken = f
            .assets
            .create_program(
                &mut f.driver,
                AssetScope::Scene,
                "broken",
                vec![(crate::render::ShaderStage::Fragment, crate::render::ShaderSource::Inline("#error".into()))],
                false,
            )
            .unwrap();
        let material = f
            .assets
            .create_material(AssetScope::Scene, Material::new("bad", ProgramPair::new(broken)), Some(1))
            .unwrap();
        f.entity(material);

        let result = f.manager.render_frame(&mut f.assets, &mut f.driver);
        assert!(matches!(result, Err(RenderError::ErrorMaterialUnavailable)));
        assert!(!f.manager.timers().is_cpu_running(FRAME_TIMER));
        assert!(f.manager.timers().cpu_elapsed(FRAME_TIMER).is_some());
        assert_eq!(f.driver.bound_framebuffer(), None);
    }
}
