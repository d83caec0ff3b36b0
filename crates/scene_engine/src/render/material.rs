//! Materials
//!
//! A material binds a program pair (the shaded core pass and the flat
//! color-ID pass used for picking), a fixed-function state snapshot, a set of
//! textures keyed by [`TextureLevel`] and a render mode. Binding is split in
//! four phases so the [`crate::render::RenderManager`] can bind program and
//! state once per material and only re-bind per-entity uniforms and textures
//! inside the entity loop:
//!
//! 1. [`Material::bind_program`]
//! 2. [`Material::bind_program_states`]
//! 3. [`Material::bind_program_uniforms`] (per entity)
//! 4. [`Material::bind_textures`] (once when textures are shared, else per entity)
//!
//! ## Render order
//!
//! Materials are drawn in ascending sequence number. Numbers are unique among
//! live materials; the [`SequenceRegistry`] owned by [`Assets`] tracks the
//! claimed set. A material without a number never renders through the
//! sorted passes.

use std::collections::{BTreeMap, BTreeSet};

use crate::assets::{Assets, CubemapHandle, ProgramHandle, TextureHandle};
use crate::render::driver::{BlendFunc, CullMode, DepthFunc, GraphicsDriver, TextureTarget, UniformValue};
use crate::render::render_manager::FrameUniforms;
use crate::render::resources::ShaderProgram;
use crate::scene::Entity;

/// Position of a material in the global draw order
pub type SequenceId = u32;

/// Which program of the pair a pass uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    /// Shaded pass
    Core,
    /// Flat color-ID pass for picking
    ColorId,
}

/// Opaque or blended bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// Drawn in the opaque pass
    #[default]
    Opaque,
    /// Drawn after all opaque geometry
    Transparent,
}

/// Texture slot of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureLevel {
    /// Base color
    Diffuse,
    /// Tangent-space normals
    Normal,
    /// Specular intensity
    Specular,
    /// Metalness
    Metallic,
    /// Roughness
    Roughness,
    /// Emission
    Emissive,
    /// Ambient occlusion
    Occlusion,
}

impl TextureLevel {
    /// Every level in unit order
    pub const ALL: [TextureLevel; 7] = [
        Self::Diffuse,
        Self::Normal,
        Self::Specular,
        Self::Metallic,
        Self::Roughness,
        Self::Emissive,
        Self::Occlusion,
    ];

    /// Texture unit the environment cube map is bound to
    pub const ENVIRONMENT_UNIT: u32 = 7;

    /// Texture unit for this level
    pub fn unit(self) -> u32 {
        self as u32
    }

    /// Sampler uniform name
    pub fn sampler(self) -> &'static str {
        match self {
            Self::Diffuse => "u_diffuse",
            Self::Normal => "u_normal",
            Self::Specular => "u_specular",
            Self::Metallic => "u_metallic",
            Self::Roughness => "u_roughness",
            Self::Emissive => "u_emissive",
            Self::Occlusion => "u_occlusion",
        }
    }
}

/// Core program plus optional dedicated color-ID program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramPair {
    /// Shaded pass program
    pub core: ProgramHandle,
    /// Picking program; the global color-ID program is used when absent
    pub color_id: Option<ProgramHandle>,
}

impl ProgramPair {
    /// Pair with only a core program
    pub fn new(core: ProgramHandle) -> Self {
        Self { core, color_id: None }
    }

    /// Pair with a dedicated picking program
    pub fn with_color_id(core: ProgramHandle, color_id: ProgramHandle) -> Self {
        Self { core, color_id: Some(color_id) }
    }
}

/// Fixed-function state applied when a material is bound
#[derive(Debug, Clone, PartialEq)]
pub struct GlState {
    /// Face culling
    pub cull: CullMode,
    /// Blend function for every draw buffer, `None` disables blending
    pub blend: Option<BlendFunc>,
    /// Per-draw-buffer overrides applied after `blend`
    pub attachment_blend: BTreeMap<u32, Option<BlendFunc>>,
    /// Depth test
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Depth comparison
    pub depth_func: DepthFunc,
    /// Draw polygon outlines
    pub wireframe: bool,
}

impl Default for GlState {
    fn default() -> Self {
        Self {
            cull: CullMode::Back,
            blend: None,
            attachment_blend: BTreeMap::new(),
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
            wireframe: false,
        }
    }
}

impl GlState {
    /// Alpha blending without depth writes
    pub fn transparent() -> Self {
        Self {
            blend: Some(BlendFunc::ALPHA),
            depth_write: false,
            ..Self::default()
        }
    }

    /// Override blending for one draw buffer
    pub fn with_attachment_blend(mut self, attachment: u32, func: Option<BlendFunc>) -> Self {
        self.attachment_blend.insert(attachment, func);
        self
    }

    /// Push the state to the driver
    pub fn apply(&self, driver: &mut dyn GraphicsDriver) {
        driver.set_cull_mode(self.cull);
        driver.set_blend(None, self.blend);
        for (attachment, func) in &self.attachment_blend {
            driver.set_blend(Some(*attachment), *func);
        }
        driver.set_depth_state(self.depth_test, self.depth_write, self.depth_func);
        driver.set_wireframe(self.wireframe);
    }
}

/// Claimed sequence numbers of all live materials
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    taken: BTreeSet<SequenceId>,
}

impl SequenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a number; `false` when another material holds it
    pub fn claim(&mut self, id: SequenceId) -> bool {
        self.taken.insert(id)
    }

    /// Give a number back
    pub fn release(&mut self, id: SequenceId) {
        self.taken.remove(&id);
    }

    /// Whether a number is claimed
    pub fn is_taken(&self, id: SequenceId) -> bool {
        self.taken.contains(&id)
    }

    /// Number of claimed numbers
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    /// Whether nothing is claimed
    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}

/// Surface description binding programs, state and textures
///
/// A clone starts without a sequence number; numbers belong to exactly one
/// live material.
#[derive(Debug)]
pub struct Material {
    name: String,
    programs: ProgramPair,
    textures: BTreeMap<TextureLevel, TextureHandle>,
    environment: Option<CubemapHandle>,
    state: GlState,
    mode: RenderMode,
    shared_textures: bool,
    sequence: Option<SequenceId>,
    uniforms: BTreeMap<String, UniformValue>,
}

impl Clone for Material {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            programs: self.programs,
            textures: self.textures.clone(),
            environment: self.environment,
            state: self.state.clone(),
            mode: self.mode,
            shared_textures: self.shared_textures,
            sequence: None,
            uniforms: self.uniforms.clone(),
        }
    }
}

impl Material {
    /// Opaque material with shared textures and no sequence number
    pub fn new(name: impl Into<String>, programs: ProgramPair) -> Self {
        Self {
            name: name.into(),
            programs,
            textures: BTreeMap::new(),
            environment: None,
            state: GlState::default(),
            mode: RenderMode::Opaque,
            shared_textures: true,
            sequence: None,
            uniforms: BTreeMap::new(),
        }
    }

    /// Set a shared texture
    pub fn with_texture(mut self, level: TextureLevel, texture: TextureHandle) -> Self {
        self.textures.insert(level, texture);
        self
    }

    /// Set the environment cube map
    pub fn with_environment(mut self, cubemap: CubemapHandle) -> Self {
        self.environment = Some(cubemap);
        self
    }

    /// Set the fixed-function state
    pub fn with_state(mut self, state: GlState) -> Self {
        self.state = state;
        self
    }

    /// Set the render mode
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Choose between material-wide textures and per-entity overrides
    pub fn with_shared_textures(mut self, shared: bool) -> Self {
        self.shared_textures = shared;
        self
    }

    /// Set a uniform uploaded whenever the core program is bound
    pub fn with_uniform(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.uniforms.insert(name.into(), value);
        self
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program pair
    pub fn programs(&self) -> ProgramPair {
        self.programs
    }

    /// Render mode
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
    }

    /// Whether textures are bound once per material
    pub fn shares_textures(&self) -> bool {
        self.shared_textures
    }

    /// Assigned sequence number
    pub fn sequence(&self) -> Option<SequenceId> {
        self.sequence
    }

    /// Drop the number without releasing it; the registry entry belongs to
    /// whichever material claimed it
    pub(crate) fn forget_sequence(&mut self) {
        self.sequence = None;
    }

    /// Claim a new sequence number, releasing the old one
    ///
    /// `None` unassigns. On collision the current number is kept and `false`
    /// is returned.
    pub(crate) fn set_sequence_id(&mut self, registry: &mut SequenceRegistry, id: Option<SequenceId>) -> bool {
        match id {
            None => {
                if let Some(old) = self.sequence.take() {
                    registry.release(old);
                }
                true
            }
            Some(id) if self.sequence == Some(id) => true,
            Some(id) => {
                if !registry.claim(id) {
                    return false;
                }
                if let Some(old) = self.sequence.replace(id) {
                    registry.release(old);
                }
                true
            }
        }
    }

    /// Shared texture at a level
    pub fn texture(&self, level: TextureLevel) -> Option<TextureHandle> {
        self.textures.get(&level).copied()
    }

    /// Replace a shared texture, returning the previous one
    pub fn set_texture(&mut self, level: TextureLevel, texture: TextureHandle) -> Option<TextureHandle> {
        self.textures.insert(level, texture)
    }

    /// Remove a shared texture
    pub fn remove_texture(&mut self, level: TextureLevel) -> Option<TextureHandle> {
        self.textures.remove(&level)
    }

    /// Fixed-function state
    pub fn state(&self) -> &GlState {
        &self.state
    }

    /// Mutable fixed-function state
    pub fn state_mut(&mut self) -> &mut GlState {
        &mut self.state
    }

    /// Set a core-pass uniform
    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms.insert(name.into(), value);
    }

    /// Program used by a pass
    pub fn program<'a>(&self, assets: &'a Assets, pass: PassType) -> Option<&'a ShaderProgram> {
        let handle = match pass {
            PassType::Core => self.programs.core,
            PassType::ColorId => self.programs.color_id.unwrap_or_else(|| assets.color_id_program()),
        };
        assets.program(handle)
    }

    /// Phase 1: make the pass program current and upload per-frame uniforms
    ///
    /// Returns `false` when the program is missing or not linked.
    pub fn bind_program(
        &self,
        assets: &Assets,
        driver: &mut dyn GraphicsDriver,
        pass: PassType,
        frame: &FrameUniforms,
    ) -> bool {
        let Some(program) = self.program(assets, pass) else {
            return false;
        };
        if !program.bind(driver) {
            return false;
        }
        program.set_uniform(driver, "u_view", UniformValue::Mat4(mat4_array(&frame.view)));
        program.set_uniform(driver, "u_projection", UniformValue::Mat4(mat4_array(&frame.projection)));
        if pass == PassType::Core {
            let eye = frame.camera_position;
            program.set_uniform(driver, "u_camera_position", UniformValue::Vec3([eye.x, eye.y, eye.z]));
            for (name, value) in &self.uniforms {
                program.set_uniform(driver, name, *value);
            }
        }
        true
    }

    /// Phase 2: apply fixed-function state
    ///
    /// The color-ID pass never blends and never draws wireframe, so every
    /// covered pixel holds an exact ID.
    pub fn bind_program_states(&self, driver: &mut dyn GraphicsDriver, pass: PassType) {
        match pass {
            PassType::Core => self.state.apply(driver),
            PassType::ColorId => {
                let state = GlState {
                    blend: None,
                    attachment_blend: BTreeMap::new(),
                    wireframe: false,
                    ..self.state.clone()
                };
                state.apply(driver);
            }
        }
    }

    /// Phase 3: per-entity uniforms
    pub fn bind_program_uniforms(
        &self,
        assets: &Assets,
        driver: &mut dyn GraphicsDriver,
        pass: PassType,
        entity: &Entity,
    ) {
        let Some(program) = self.program(assets, pass) else { return };
        program.set_uniform(driver, "u_model", UniformValue::Mat4(mat4_array(entity.world_matrix())));
        if pass == PassType::ColorId {
            program.set_uniform(driver, "u_color_id", UniformValue::Vec4(entity.color_id_rgba()));
        }
    }

    /// Phase 4: bind every texture level the program samples
    ///
    /// With an entity and per-entity textures the entity's overrides are
    /// used, otherwise the shared map. Missing or unloaded textures bind the
    /// null image of their level. Returns the number of fallbacks bound.
    pub fn bind_textures(
        &self,
        assets: &Assets,
        driver: &mut dyn GraphicsDriver,
        pass: PassType,
        entity: Option<&Entity>,
    ) -> usize {
        if pass == PassType::ColorId {
            return 0;
        }
        let Some(program) = self.program(assets, pass) else { return 0 };

        let mut fallbacks = 0;
        for level in program.texture_levels() {
            let handle = match entity {
                Some(entity) if !self.shared_textures => entity.texture_override(*level),
                _ => self.texture(*level),
            };
            match handle.and_then(|h| assets.texture(h)).filter(|t| t.is_loaded()) {
                Some(texture) => texture.bind(driver, level.unit()),
                None => {
                    log::trace!("Material '{}' binds null image at {:?}", self.name, level);
                    driver.bind_texture(level.unit(), TextureTarget::Texture2D, assets.null_image(*level));
                    fallbacks += 1;
                }
            }
            program.set_uniform(driver, level.sampler(), UniformValue::Int(level.unit() as i32));
        }

        if program.samples_environment() {
            let unit = TextureLevel::ENVIRONMENT_UNIT;
            match self.environment.and_then(|h| assets.cubemap(h)).filter(|c| c.is_loaded()) {
                Some(cubemap) => cubemap.bind(driver, unit),
                None => {
                    driver.bind_texture(unit, TextureTarget::Cubemap, None);
                    fallbacks += 1;
                }
            }
            program.set_uniform(driver, "u_environment", UniformValue::Int(unit as i32));
        }
        fallbacks
    }
}

fn mat4_array(matrix: &crate::foundation::math::Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DriverCall, HeadlessDriver};

    fn material(registry: &mut SequenceRegistry, seq: SequenceId) -> Material {
        let mut m = Material::new("m", ProgramPair::new(ProgramHandle::default()));
        assert!(m.set_sequence_id(registry, Some(seq)));
        m
    }

    #[test]
    fn test_sequence_collision_keeps_old_number() {
        let mut registry = SequenceRegistry::new();
        let _a = material(&mut registry, 1);
        let mut b = material(&mut registry, 2);

        assert!(!b.set_sequence_id(&mut registry, Some(1)));
        assert_eq!(b.sequence(), Some(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_sequence_change_releases_previous() {
        let mut registry = SequenceRegistry::new();
        let mut a = material(&mut registry, 1);
        assert!(a.set_sequence_id(&mut registry, Some(5)));
        assert!(!registry.is_taken(1));
        assert!(registry.is_taken(5));

        assert!(a.set_sequence_id(&mut registry, Some(5)));
        assert!(a.set_sequence_id(&mut registry, None));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_transparent_state_applies_blend() {
        let mut driver = HeadlessDriver::new();
        GlState::transparent()
            .with_attachment_blend(1, None)
            .apply(&mut driver);
        let calls = driver.calls();
        assert!(calls.contains(&DriverCall::SetBlend { attachment: None, func: Some(BlendFunc::ALPHA) }));
        assert!(calls.contains(&DriverCall::SetBlend { attachment: Some(1), func: None }));
        assert!(calls.contains(&DriverCall::SetDepthState { test: true, write: false, func: DepthFunc::Less }));
    }

    #[test]
    fn test_color_id_pass_disables_blending() {
        let mut driver = HeadlessDriver::new();
        let m = Material::new("glass", ProgramPair::new(ProgramHandle::default()))
            .with_state(GlState::transparent());
        m.bind_program_states(&mut driver, PassType::ColorId);
        assert!(driver.calls().contains(&DriverCall::SetBlend { attachment: None, func: None }));
    }

    #[test]
    fn test_texture_units_are_distinct() {
        let units: BTreeSet<u32> = TextureLevel::ALL.iter().map(|l| l.unit()).collect();
        assert_eq!(units.len(), TextureLevel::ALL.len());
        assert!(!units.contains(&TextureLevel::ENVIRONMENT_UNIT));
    }
}
