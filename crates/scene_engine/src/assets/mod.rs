//! Asset storages
//!
//! [`Assets`] owns every GPU resource object, material and entity of the
//! running engine. Each kind lives in its own [`ScopedStorage`] keyed by a
//! per-kind generational handle, so a `MeshHandle` can never be used to look
//! up a texture and a handle kept past its resource's destruction resolves
//! to `None` even after its slot has been reused.
//!
//! ## Scopes
//!
//! GLOBAL assets (null images, the error material, the color-ID program,
//! engine framebuffers) are created once at startup. SCENE assets are
//! created by a scene's setup and destroyed in bulk by
//! [`Assets::destroy_and_erase_all`] before the next scene is set up.
//!
//! ## Order notifications
//!
//! Mutations that change draw order (material sequence numbers, render modes,
//! entity material/mesh assignment, creation and destruction) go through
//! methods here that record an [`OrderChanges`] flag. The
//! [`crate::render::RenderManager`] drains the flags before sorting.

pub mod image_loader;

pub use image_loader::ImageData;

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::debug::{DiagnosticCategory, Diagnostics};
use crate::foundation::collections::{AssetScope, ScopedStorage};
use crate::render::driver::{
    GraphicsDriver, PrimitiveMode, ShaderStage, TextureDesc, TextureFormat, UniformValue,
};
use crate::render::material::{Material, ProgramPair, RenderMode, SequenceId, SequenceRegistry, TextureLevel};
use crate::render::resources::{
    Cubemap, FramebufferObject, FramebufferSize, Mesh, ShaderProgram, ShaderSource, Texture2D, Vertex,
};
use crate::render::RenderError;
use crate::scene::{hierarchy, ColorId, Entity, EntityKind, SceneError};

slotmap::new_key_type! {
    /// Handle to a [`Texture2D`]
    pub struct TextureHandle;
    /// Handle to a [`Cubemap`]
    pub struct CubemapHandle;
    /// Handle to a [`Mesh`]
    pub struct MeshHandle;
    /// Handle to a [`ShaderProgram`]
    pub struct ProgramHandle;
    /// Handle to a [`Material`]
    pub struct MaterialHandle;
    /// Handle to a [`FramebufferObject`]
    pub struct FramebufferHandle;
    /// Handle to an [`Entity`]
    pub struct EntityHandle;
}

const COLOR_ID_VERTEX: &str = "#version 330 core
layout(location = 0) in vec3 a_position;
uniform mat4 u_model;
uniform mat4 u_view;
uniform mat4 u_projection;
void main() {
    gl_Position = u_projection * u_view * u_model * vec4(a_position, 1.0);
}
";

const COLOR_ID_FRAGMENT: &str = "#version 330 core
uniform vec4 u_color_id;
out vec4 frag_color;
void main() {
    frag_color = u_color_id;
}
";

const FLAT_FRAGMENT: &str = "#version 330 core
uniform vec4 u_color;
out vec4 frag_color;
void main() {
    frag_color = u_color;
}
";

const NULL_IMAGE_SIZE: u32 = 8;
const CHECKER_CELL: u32 = 4;
const CHECKER_LIGHT: [u8; 4] = [255, 0, 255, 255];
const CHECKER_DARK: [u8; 4] = [0, 0, 0, 255];

/// Pending draw-order invalidations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderChanges {
    /// Material sequence order changed
    pub materials: bool,
    /// Entity buckets changed
    pub entities: bool,
}

impl OrderChanges {
    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        !self.materials && !self.entities
    }
}

/// Asset errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset file not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Decoding or parsing failed
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Sequence number already claimed by another material
    #[error("Sequence number {0} is already taken")]
    SequenceTaken(SequenceId),

    /// Every encodable entity ID has been handed out
    #[error("Entity IDs exhausted")]
    EntityIdsExhausted,

    /// Driver-level failure while creating a resource
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owner of every resource, material and entity
pub struct Assets {
    textures: ScopedStorage<TextureHandle, Texture2D>,
    cubemaps: ScopedStorage<CubemapHandle, Cubemap>,
    meshes: ScopedStorage<MeshHandle, Mesh>,
    programs: ScopedStorage<ProgramHandle, ShaderProgram>,
    materials: ScopedStorage<MaterialHandle, Material>,
    framebuffers: ScopedStorage<FramebufferHandle, FramebufferObject>,
    entities: ScopedStorage<EntityHandle, Entity>,
    sequences: SequenceRegistry,
    null_images: BTreeMap<TextureLevel, TextureHandle>,
    error_material: MaterialHandle,
    color_id_program: ProgramHandle,
    diagnostics: Diagnostics,
    next_entity_id: u32,
    order_changes: OrderChanges,
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}

impl Assets {
    /// Create empty storages; call [`Assets::init_global_defaults`] before rendering
    pub fn new() -> Self {
        Self {
            textures: ScopedStorage::new(),
            cubemaps: ScopedStorage::new(),
            meshes: ScopedStorage::new(),
            programs: ScopedStorage::new(),
            materials: ScopedStorage::new(),
            framebuffers: ScopedStorage::new(),
            entities: ScopedStorage::new(),
            sequences: SequenceRegistry::new(),
            null_images: BTreeMap::new(),
            error_material: MaterialHandle::default(),
            color_id_program: ProgramHandle::default(),
            diagnostics: Diagnostics::new(),
            next_entity_id: 1,
            order_changes: OrderChanges::default(),
        }
    }

    /// Create the GLOBAL fallbacks: null images, color-ID program and error material
    ///
    /// The error material must link; if it does not, nothing can be drawn in
    /// its place and startup fails.
    pub fn init_global_defaults(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        error_color: [f32; 4],
        validate: bool,
    ) -> Result<(), AssetError> {
        for level in TextureLevel::ALL {
            let image = match level {
                TextureLevel::Diffuse => {
                    ImageData::checkerboard(NULL_IMAGE_SIZE, CHECKER_CELL, CHECKER_LIGHT, CHECKER_DARK)
                }
                _ => ImageData::solid_color(1, 1, [0, 0, 0, 255]),
            };
            let name = format!("null_{:?}", level).to_lowercase();
            let handle = self.create_texture(driver, AssetScope::Global, name, image.desc(), &image.data)?;
            self.null_images.insert(level, handle);
        }

        self.color_id_program = self.create_program(
            driver,
            AssetScope::Global,
            "color_id",
            vec![
                (ShaderStage::Vertex, ShaderSource::Inline(COLOR_ID_VERTEX.to_owned())),
                (ShaderStage::Fragment, ShaderSource::Inline(COLOR_ID_FRAGMENT.to_owned())),
            ],
            validate,
        )?;

        let error_program = self.create_program(
            driver,
            AssetScope::Global,
            "error",
            vec![
                (ShaderStage::Vertex, ShaderSource::Inline(COLOR_ID_VERTEX.to_owned())),
                (ShaderStage::Fragment, ShaderSource::Inline(FLAT_FRAGMENT.to_owned())),
            ],
            validate,
        )?;
        if !self.programs.get(error_program).is_some_and(ShaderProgram::is_linked) {
            return Err(RenderError::ErrorMaterialUnavailable.into());
        }

        let material = Material::new("error", ProgramPair::new(error_program))
            .with_uniform("u_color", UniformValue::Vec4(error_color));
        self.error_material = self.create_material(AssetScope::Global, material, None)?;

        log::info!("Global defaults created ({} null images)", self.null_images.len());
        Ok(())
    }

    // ---- factories ----

    /// Upload a texture from raw pixels
    pub fn create_texture(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        scope: AssetScope,
        name: impl Into<String>,
        desc: TextureDesc,
        data: &[u8],
    ) -> Result<TextureHandle, AssetError> {
        let texture = Texture2D::new(driver, name, desc, data)?;
        Ok(self.textures.add(texture, scope))
    }

    /// Decode an image file and upload it as RGBA8
    ///
    /// Failures are recorded in the diagnostics before being returned.
    pub fn load_texture(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        scope: AssetScope,
        path: impl AsRef<Path>,
    ) -> Result<TextureHandle, AssetError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        if !path.exists() {
            self.diagnostics.record(DiagnosticCategory::Texture, &name, "file not found");
            return Err(AssetError::NotFound(name));
        }
        let image = match ImageData::from_file(path) {
            Ok(image) => image,
            Err(e) => {
                self.diagnostics.record(DiagnosticCategory::Texture, &name, e.to_string());
                return Err(e);
            }
        };
        let mut desc = image.desc();
        desc.mipmaps = true;
        self.create_texture(driver, scope, name, desc, &image.data)
    }

    /// Upload a cube map
    pub fn create_cubemap(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        scope: AssetScope,
        name: impl Into<String>,
        size: u32,
        format: TextureFormat,
        faces: [&[u8]; 6],
    ) -> Result<CubemapHandle, AssetError> {
        let cubemap = Cubemap::new(driver, name, size, format, faces)?;
        Ok(self.cubemaps.add(cubemap, scope))
    }

    /// Upload a mesh
    pub fn create_mesh(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        scope: AssetScope,
        name: impl Into<String>,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
        mode: PrimitiveMode,
    ) -> Result<MeshHandle, AssetError> {
        let mesh = Mesh::new(driver, name, vertices, indices, mode)?;
        Ok(self.meshes.add(mesh, scope))
    }

    /// Compile and link a program from stage sources
    ///
    /// A compile or link failure still yields a handle; the program is
    /// registered as failed and materials using it fall back to the error
    /// material until a reload fixes it.
    pub fn create_program(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        scope: AssetScope,
        name: impl Into<String>,
        stages: Vec<(ShaderStage, ShaderSource)>,
        validate: bool,
    ) -> Result<ProgramHandle, AssetError> {
        let program = ShaderProgram::new(driver, name, stages, validate)?;
        Ok(self.add_program(scope, program))
    }

    /// Take ownership of an already built program
    pub fn add_program(&mut self, scope: AssetScope, program: ShaderProgram) -> ProgramHandle {
        if let Some(error) = program.error() {
            self.diagnostics.program_failed(program.name(), error);
        }
        self.programs.add(program, scope)
    }

    /// Register a material, optionally claiming a sequence number
    pub fn create_material(
        &mut self,
        scope: AssetScope,
        mut material: Material,
        sequence: Option<SequenceId>,
    ) -> Result<MaterialHandle, AssetError> {
        material.forget_sequence();
        if let Some(id) = sequence {
            if !material.set_sequence_id(&mut self.sequences, Some(id)) {
                return Err(AssetError::SequenceTaken(id));
            }
            self.order_changes.materials = true;
        }
        self.order_changes.entities = true;
        let name = material.name().to_owned();
        let handle = self.materials.add(material, scope);
        log::debug!("Material '{}' created (sequence {:?})", name, sequence);
        Ok(handle)
    }

    /// Create an empty framebuffer
    pub fn create_framebuffer(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        scope: AssetScope,
        name: impl Into<String>,
        size: FramebufferSize,
        viewport: (u32, u32),
    ) -> Result<FramebufferHandle, AssetError> {
        let framebuffer = FramebufferObject::new(driver, name, size, viewport)?;
        Ok(self.framebuffers.add(framebuffer, scope))
    }

    /// Create an entity with the next unused ID
    pub fn create_entity(
        &mut self,
        scope: AssetScope,
        name: impl Into<String>,
        kind: EntityKind,
    ) -> Result<EntityHandle, AssetError> {
        let id = self.next_entity_id;
        if id > ColorId::MAX {
            return Err(AssetError::EntityIdsExhausted);
        }
        self.next_entity_id += 1;
        self.order_changes.entities = true;
        Ok(self.entities.add(Entity::new(id, name, kind), scope))
    }

    // ---- lookups ----

    /// Texture by handle
    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture2D> {
        self.textures.get(handle)
    }

    /// Cube map by handle
    pub fn cubemap(&self, handle: CubemapHandle) -> Option<&Cubemap> {
        self.cubemaps.get(handle)
    }

    /// Mesh by handle
    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    /// Mutable mesh, for instance buffer updates
    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle)
    }

    /// Program by handle
    pub fn program(&self, handle: ProgramHandle) -> Option<&ShaderProgram> {
        self.programs.get(handle)
    }

    /// Material by handle
    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    /// Mutable material
    ///
    /// Sequence number and render mode are private to the material; change
    /// them through [`Assets::set_material_sequence`] and
    /// [`Assets::set_material_render_mode`].
    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle)
    }

    /// Framebuffer by handle
    pub fn framebuffer(&self, handle: FramebufferHandle) -> Option<&FramebufferObject> {
        self.framebuffers.get(handle)
    }

    /// Mutable framebuffer
    pub fn framebuffer_mut(&mut self, handle: FramebufferHandle) -> Option<&mut FramebufferObject> {
        self.framebuffers.get_mut(handle)
    }

    /// Entity by handle
    pub fn entity(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(handle)
    }

    /// Mutable entity
    pub fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.entities.get_mut(handle)
    }

    /// Scope an entity was created in
    pub fn entity_scope(&self, handle: EntityHandle) -> Option<AssetScope> {
        self.entities.scope_of(handle)
    }

    /// Whether `ancestor` is a proper ancestor of `node`
    pub fn is_descendant_of(&self, node: EntityHandle, ancestor: EntityHandle) -> bool {
        node != ancestor && hierarchy::is_ancestor(&self.entities, ancestor, node)
    }

    /// Every live material
    pub fn materials(&self) -> impl Iterator<Item = (MaterialHandle, &Material)> {
        self.materials.iter()
    }

    /// Every live entity
    pub fn entities(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.entities.iter()
    }

    /// Every live program
    pub fn programs(&self) -> impl Iterator<Item = (ProgramHandle, &ShaderProgram)> {
        self.programs.iter()
    }

    /// Entity whose picking color is `id`
    pub fn entity_by_color_id(&self, id: ColorId) -> Option<EntityHandle> {
        self.entities
            .iter()
            .find(|(_, e)| e.color_id() == id)
            .map(|(h, _)| h)
    }

    /// First camera entity, lowest ID first
    pub fn first_camera(&self) -> Option<EntityHandle> {
        self.entities
            .iter()
            .filter(|(_, e)| e.as_camera().is_some())
            .min_by_key(|(_, e)| e.id())
            .map(|(h, _)| h)
    }

    /// Driver texture bound when a material has nothing at `level`
    pub fn null_image(&self, level: TextureLevel) -> Option<u32> {
        self.null_images
            .get(&level)
            .and_then(|h| self.textures.get(*h))
            .map(Texture2D::id)
    }

    /// Program used by the color-ID pass of materials without their own
    pub fn color_id_program(&self) -> ProgramHandle {
        self.color_id_program
    }

    /// Material drawn in place of one whose program fails to bind
    pub fn error_material(&self) -> MaterialHandle {
        self.error_material
    }

    /// Claimed sequence numbers
    pub fn sequences(&self) -> &SequenceRegistry {
        &self.sequences
    }

    /// Recorded failures
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Mutable diagnostics, for callers recording their own failures
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Number of live entries of one scope across every storage
    pub fn asset_count(&self, scope: AssetScope) -> usize {
        self.textures.len_in(scope)
            + self.cubemaps.len_in(scope)
            + self.meshes.len_in(scope)
            + self.programs.len_in(scope)
            + self.materials.len_in(scope)
            + self.framebuffers.len_in(scope)
            + self.entities.len_in(scope)
    }

    /// Number of live SCENE entries
    pub fn scene_asset_count(&self) -> usize {
        self.asset_count(AssetScope::Scene)
    }

    /// Slots ever allocated in the entity storage
    pub fn entity_slot_capacity(&self) -> usize {
        self.entities.slot_capacity()
    }

    // ---- order-changing mutations ----

    /// Claim a new sequence number for a material; `None` unassigns
    ///
    /// Returns `false` on collision or stale handle, leaving the material's
    /// current number unchanged.
    pub fn set_material_sequence(&mut self, handle: MaterialHandle, sequence: Option<SequenceId>) -> bool {
        let Some(material) = self.materials.get_mut(handle) else { return false };
        let before = material.sequence();
        if !material.set_sequence_id(&mut self.sequences, sequence) {
            log::warn!("Material '{}': sequence {:?} is taken", material.name(), sequence);
            return false;
        }
        if before != material.sequence() {
            self.order_changes.materials = true;
        }
        true
    }

    /// Move a material between the opaque and transparent buckets
    pub fn set_material_render_mode(&mut self, handle: MaterialHandle, mode: RenderMode) -> bool {
        let Some(material) = self.materials.get_mut(handle) else { return false };
        if material.mode() != mode {
            material.set_mode(mode);
            self.order_changes.entities = true;
        }
        true
    }

    /// Assign or clear an entity's material
    pub fn set_entity_material(&mut self, entity: EntityHandle, material: Option<MaterialHandle>) -> bool {
        let Some(e) = self.entities.get_mut(entity) else { return false };
        e.set_material(material);
        self.order_changes.entities = true;
        true
    }

    /// Assign or clear an entity's mesh
    pub fn set_entity_mesh(&mut self, entity: EntityHandle, mesh: Option<MeshHandle>) -> bool {
        let Some(e) = self.entities.get_mut(entity) else { return false };
        e.set_mesh(mesh);
        self.order_changes.entities = true;
        true
    }

    /// Drain pending order invalidations
    pub fn take_order_changes(&mut self) -> OrderChanges {
        std::mem::take(&mut self.order_changes)
    }

    /// Order invalidations not yet drained
    pub fn pending_order_changes(&self) -> OrderChanges {
        self.order_changes
    }

    // ---- hierarchy ----

    /// Re-parent an entity; cycles are rejected
    pub fn set_parent(&mut self, child: EntityHandle, parent: Option<EntityHandle>) -> Result<(), SceneError> {
        hierarchy::set_parent(&mut self.entities, child, parent)
    }

    /// Recompute world matrices and bounds of dirty entities
    pub fn update_transforms(&mut self) -> usize {
        let meshes = &self.meshes;
        hierarchy::update_world_transforms(&mut self.entities, |entity| {
            entity.mesh().and_then(|m| meshes.get(m)).map(Mesh::bounds)
        })
    }

    // ---- shader reload ----

    /// Recompile and relink every program from its sources
    ///
    /// Returns the number of programs that fail afterwards.
    pub fn reload_all_programs(&mut self, driver: &mut dyn GraphicsDriver, validate: bool) -> usize {
        let mut failures = 0;
        for (_, program) in self.programs.iter_mut() {
            let outcome = program.reload(driver, validate);
            match outcome {
                Ok(true) => self.diagnostics.program_recovered(program.name()),
                Ok(false) => {
                    let error = program.error().unwrap_or("unknown link error").to_owned();
                    self.diagnostics.program_failed(program.name(), &error);
                    failures += 1;
                }
                Err(e) => {
                    self.diagnostics.program_failed(program.name(), &e.to_string());
                    failures += 1;
                }
            }
        }
        log::info!("Reloaded {} programs, {} failing", self.programs.len(), failures);
        failures
    }

    // ---- destruction ----

    /// Release and erase a texture
    pub fn destroy_texture(&mut self, driver: &mut dyn GraphicsDriver, handle: TextureHandle) -> bool {
        self.textures.erase(handle).map(|mut t| t.destroy(driver)).is_some()
    }

    /// Release and erase a cube map
    pub fn destroy_cubemap(&mut self, driver: &mut dyn GraphicsDriver, handle: CubemapHandle) -> bool {
        self.cubemaps.erase(handle).map(|mut c| c.destroy(driver)).is_some()
    }

    /// Release and erase a mesh
    pub fn destroy_mesh(&mut self, driver: &mut dyn GraphicsDriver, handle: MeshHandle) -> bool {
        let destroyed = self.meshes.erase(handle).map(|mut m| m.destroy(driver)).is_some();
        if destroyed {
            self.order_changes.entities = true;
        }
        destroyed
    }

    /// Release and erase a program
    pub fn destroy_program(&mut self, driver: &mut dyn GraphicsDriver, handle: ProgramHandle) -> bool {
        self.programs.erase(handle).map(|mut p| p.destroy(driver)).is_some()
    }

    /// Erase a material and release its sequence number
    pub fn destroy_material(&mut self, handle: MaterialHandle) -> bool {
        let Some(mut material) = self.materials.erase(handle) else { return false };
        if material.sequence().is_some() {
            material.set_sequence_id(&mut self.sequences, None);
            self.order_changes.materials = true;
        }
        self.order_changes.entities = true;
        true
    }

    /// Release and erase a framebuffer with its attachments
    pub fn destroy_framebuffer(&mut self, driver: &mut dyn GraphicsDriver, handle: FramebufferHandle) -> bool {
        self.framebuffers.erase(handle).map(|mut f| f.destroy(driver)).is_some()
    }

    /// Unlink and erase an entity; its children become roots
    pub fn destroy_entity(&mut self, handle: EntityHandle) -> bool {
        hierarchy::detach(&mut self.entities, handle);
        let erased = self.entities.erase(handle).is_some();
        if erased {
            self.order_changes.entities = true;
        }
        erased
    }

    /// Destroy every asset of one scope and erase it from its storage
    ///
    /// Driver objects are released before the entries are dropped. Returns
    /// the number of entries removed.
    pub fn destroy_and_erase_all(&mut self, driver: &mut dyn GraphicsDriver, scope: AssetScope) -> usize {
        let scoped_entities: Vec<EntityHandle> = self.entities.iter_scope(scope).map(|(h, _)| h).collect();
        for handle in &scoped_entities {
            hierarchy::detach(&mut self.entities, *handle);
        }
        let mut removed = self.entities.erase_all(scope).len();

        for (_, mut material) in self.materials.erase_all(scope) {
            material.set_sequence_id(&mut self.sequences, None);
            removed += 1;
        }
        for (_, mut framebuffer) in self.framebuffers.erase_all(scope) {
            framebuffer.destroy(driver);
            removed += 1;
        }
        for (_, mut program) in self.programs.erase_all(scope) {
            self.diagnostics.program_recovered(program.name());
            program.destroy(driver);
            removed += 1;
        }
        for (_, mut mesh) in self.meshes.erase_all(scope) {
            mesh.destroy(driver);
            removed += 1;
        }
        for (_, mut cubemap) in self.cubemaps.erase_all(scope) {
            cubemap.destroy(driver);
            removed += 1;
        }
        for (_, mut texture) in self.textures.erase_all(scope) {
            texture.destroy(driver);
            removed += 1;
        }

        if scope == AssetScope::Global {
            self.null_images.clear();
            self.error_material = MaterialHandle::default();
            self.color_id_program = ProgramHandle::default();
        }
        self.order_changes = OrderChanges { materials: true, entities: true };
        log::info!("Destroyed {} {:?} assets", removed, scope);
        removed
    }

    /// Destroy everything, SCENE first
    pub fn shutdown(&mut self, driver: &mut dyn GraphicsDriver) {
        self.destroy_and_erase_all(driver, AssetScope::Scene);
        self.destroy_and_erase_all(driver, AssetScope::Global);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDriver;

    fn assets_with_defaults(driver: &mut HeadlessDriver) -> Assets {
        let mut assets = Assets::new();
        assets.init_global_defaults(driver, [1.0, 0.0, 1.0, 1.0], false).unwrap();
        assets
    }

    fn triangle(assets: &mut Assets, driver: &mut HeadlessDriver) -> MeshHandle {
        let vertices = [Vertex::at(0.0, 0.0, 0.0), Vertex::at(1.0, 0.0, 0.0), Vertex::at(0.0, 1.0, 0.0)];
        assets
            .create_mesh(driver, AssetScope::Scene, "tri", &vertices, None, PrimitiveMode::Triangles)
            .unwrap()
    }

    #[test]
    fn test_global_defaults_are_usable() {
        let mut driver = HeadlessDriver::new();
        let assets = assets_with_defaults(&mut driver);

        let error = assets.material(assets.error_material()).unwrap();
        assert!(assets.program(error.programs().core).unwrap().is_linked());
        assert!(assets.program(assets.color_id_program()).unwrap().is_linked());
        for level in TextureLevel::ALL {
            assert!(assets.null_image(level).is_some());
        }
        assert_ne!(assets.null_image(TextureLevel::Diffuse), assets.null_image(TextureLevel::Normal));
        assert_eq!(assets.scene_asset_count(), 0);
    }

    #[test]
    fn test_duplicate_sequence_is_rejected() {
        let mut driver = HeadlessDriver::new();
        let mut assets = assets_with_defaults(&mut driver);
        let program = assets.color_id_program();

        let a = assets
            .create_material(AssetScope::Scene, Material::new("a", ProgramPair::new(program)), Some(1))
            .unwrap();
        let b = assets
            .create_material(AssetScope::Scene, Material::new("b", ProgramPair::new(program)), Some(2))
            .unwrap();
        assets.take_order_changes();

        assert!(!assets.set_material_sequence(b, Some(1)));
        assert_eq!(assets.material(b).unwrap().sequence(), Some(2));
        assert!(assets.take_order_changes().is_empty());

        let result = assets.create_material(AssetScope::Scene, Material::new("c", ProgramPair::new(program)), Some(1));
        assert!(matches!(result, Err(AssetError::SequenceTaken(1))));

        assert!(assets.destroy_material(a));
        assert!(assets.set_material_sequence(b, Some(1)));
        assert!(assets.take_order_changes().materials);
    }

    #[test]
    fn test_copied_material_does_not_share_sequence() {
        let mut driver = HeadlessDriver::new();
        let mut assets = assets_with_defaults(&mut driver);
        let program = assets.color_id_program();
        let a = assets
            .create_material(AssetScope::Scene, Material::new("a", ProgramPair::new(program)), Some(4))
            .unwrap();

        let copy = assets.material(a).unwrap().clone();
        assert_eq!(copy.sequence(), None);
        let b = assets.create_material(AssetScope::Scene, copy, None).unwrap();
        assert_eq!(assets.material(b).unwrap().sequence(), None);

        let copy = assets.material(a).unwrap().clone();
        let c = assets.create_material(AssetScope::Scene, copy, Some(9)).unwrap();
        assert_eq!(assets.material(c).unwrap().sequence(), Some(9));
        assert_eq!(assets.material(a).unwrap().sequence(), Some(4));
        assert!(assets.sequences().is_taken(4));

        let result = assets.create_material(AssetScope::Scene, Material::new("d", ProgramPair::new(program)), Some(4));
        assert!(matches!(result, Err(AssetError::SequenceTaken(4))));
    }

    #[test]
    fn test_stale_entity_handle_is_rejected_after_slot_reuse() {
        let mut assets = Assets::new();
        let old = assets.create_entity(AssetScope::Scene, "old", EntityKind::GameObject).unwrap();
        let capacity = assets.entity_slot_capacity();
        assert!(assets.destroy_entity(old));

        let new = assets.create_entity(AssetScope::Scene, "new", EntityKind::GameObject).unwrap();
        assert_eq!(assets.entity_slot_capacity(), capacity);
        assert!(assets.entity(old).is_none());
        assert_eq!(assets.entity(new).unwrap().name(), "new");
        assert!(!assets.set_entity_material(old, None));
    }

    #[test]
    fn test_destroy_scene_keeps_globals_and_releases_driver_objects() {
        let mut driver = HeadlessDriver::new();
        let mut assets = assets_with_defaults(&mut driver);
        let baseline_objects = driver.live_object_count();
        let global_count = assets.asset_count(AssetScope::Global);

        let mesh = triangle(&mut assets, &mut driver);
        let material = assets
            .create_material(
                AssetScope::Scene,
                Material::new("m", ProgramPair::new(assets.color_id_program())),
                Some(3),
            )
            .unwrap();
        let entity = assets.create_entity(AssetScope::Scene, "e", EntityKind::GameObject).unwrap();
        assets.set_entity_mesh(entity, Some(mesh));
        assets.set_entity_material(entity, Some(material));
        assert_eq!(assets.scene_asset_count(), 3);

        assert_eq!(assets.destroy_and_erase_all(&mut driver, AssetScope::Scene), 3);
        assert_eq!(assets.scene_asset_count(), 0);
        assert_eq!(assets.asset_count(AssetScope::Global), global_count);
        assert_eq!(driver.live_object_count(), baseline_objects);
        assert!(!assets.sequences().is_taken(3));
        assert!(assets.mesh(mesh).is_none());
    }

    #[test]
    fn test_failed_program_is_registered() {
        let mut driver = HeadlessDriver::new();
        let mut assets = Assets::new();
        let handle = assets
            .create_program(
                &mut driver,
                AssetScope::Scene,
                "broken",
                vec![
                    (ShaderStage::Vertex, ShaderSource::Inline(COLOR_ID_VERTEX.to_owned())),
                    (ShaderStage::Fragment, ShaderSource::Inline("#error broken".to_owned())),
                ],
                false,
            )
            .unwrap();
        assert!(!assets.program(handle).unwrap().is_linked());
        assert!(assets.diagnostics().is_program_failed("broken"));
    }

    #[test]
    fn test_update_transforms_uses_mesh_bounds() {
        let mut driver = HeadlessDriver::new();
        let mut assets = Assets::new();
        let mesh = triangle(&mut assets, &mut driver);
        let entity = assets.create_entity(AssetScope::Scene, "e", EntityKind::GameObject).unwrap();
        assets.set_entity_mesh(entity, Some(mesh));

        assert_eq!(assets.update_transforms(), 1);
        let bounds = assets.entity(entity).unwrap().bounds();
        assert!((bounds.max.x - 1.0).abs() < 1e-6);
        assert!((bounds.max.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_texture_file_is_recorded() {
        let mut driver = HeadlessDriver::new();
        let mut assets = Assets::new();
        let result = assets.load_texture(&mut driver, AssetScope::Scene, "does/not/exist.png");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
        assert_eq!(assets.diagnostics().entries_in(DiagnosticCategory::Texture).count(), 1);
    }
}
