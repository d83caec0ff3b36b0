//! Scene entities
//!
//! An [`Entity`] is a transform-linked node that can reference a mesh and a
//! material. What kind of node it is lives in [`EntityKind`], a sum type
//! matched on by the systems that care (camera selection, lighting) instead of
//! a type tag plus downcast.
//!
//! Mesh and material references are changed through [`crate::assets::Assets`]
//! so the render manager's sort caches are invalidated with them.

use std::collections::BTreeMap;

use crate::assets::{EntityHandle, MaterialHandle, MeshHandle, TextureHandle};
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::render::material::TextureLevel;
use crate::scene::bounds::Aabb;
use crate::scene::camera::{CameraData, LightData};

/// What an entity is
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// Plain renderable or grouping node
    GameObject,
    /// Camera; the pose comes from the entity transform
    Camera(CameraData),
    /// Light source
    Light(LightData),
}

/// 24-bit entity ID encoded as a flat RGB color for picking
///
/// `0` (black) means "no entity" so the cleared background never decodes to
/// a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorId(pub u32);

impl ColorId {
    /// Largest encodable ID
    pub const MAX: u32 = 0x00FF_FFFF;

    /// RGB bytes, red holding the low byte
    pub fn to_rgb8(self) -> [u8; 3] {
        let [r, g, b, _] = self.0.to_le_bytes();
        [r, g, b]
    }

    /// Normalized RGBA color written by the color-ID shader
    pub fn to_rgba(self) -> [f32; 4] {
        let [r, g, b] = self.to_rgb8();
        [f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0, 1.0]
    }

    /// Decode a read-back pixel; `None` for background or short input
    pub fn from_rgb8(pixel: &[u8]) -> Option<Self> {
        let [r, g, b] = <[u8; 3]>::try_from(pixel.get(..3)?).ok()?;
        let id = u32::from_le_bytes([r, g, b, 0]);
        (id != 0).then_some(Self(id))
    }
}

/// Transform-linked scene node
#[derive(Debug, Clone)]
pub struct Entity {
    id: u32,
    name: String,
    kind: EntityKind,
    transform: Transform,
    pub(crate) parent: Option<EntityHandle>,
    pub(crate) children: Vec<EntityHandle>,
    world: Mat4,
    pub(crate) transform_dirty: bool,
    material: Option<MaterialHandle>,
    mesh: Option<MeshHandle>,
    texture_overrides: BTreeMap<TextureLevel, TextureHandle>,
    visible: bool,
    selectable: bool,
    bounds: Aabb,
}

impl Entity {
    pub(crate) fn new(id: u32, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            transform: Transform::identity(),
            parent: None,
            children: Vec::new(),
            world: Mat4::identity(),
            transform_dirty: true,
            material: None,
            mesh: None,
            texture_overrides: BTreeMap::new(),
            visible: true,
            selectable: true,
            bounds: Aabb::empty(),
        }
    }

    /// Unique numeric ID, never reused within a run
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Picking color of this entity
    pub fn color_id(&self) -> ColorId {
        ColorId(self.id)
    }

    /// Normalized picking color
    pub fn color_id_rgba(&self) -> [f32; 4] {
        self.color_id().to_rgba()
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Node kind
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Mutable node kind
    pub fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    /// Camera payload, if this is a camera
    pub fn as_camera(&self) -> Option<&CameraData> {
        match &self.kind {
            EntityKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Mutable camera payload
    pub fn as_camera_mut(&mut self) -> Option<&mut CameraData> {
        match &mut self.kind {
            EntityKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Light payload, if this is a light
    pub fn as_light(&self) -> Option<&LightData> {
        match &self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Local transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable local transform; marks the world matrix stale
    pub fn transform_mut(&mut self) -> &mut Transform {
        self.transform_dirty = true;
        &mut self.transform
    }

    /// Replace the local transform
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.transform_dirty = true;
    }

    /// Move relative to the parent
    pub fn set_position(&mut self, position: Vec3) {
        self.transform_mut().position = position;
    }

    /// Cached world matrix, valid after the last hierarchy update
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    pub(crate) fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
        self.transform_dirty = false;
    }

    /// World-space position from the cached world matrix
    pub fn world_position(&self) -> Vec3 {
        self.world.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Whether the world matrix needs recomputing
    pub fn is_transform_dirty(&self) -> bool {
        self.transform_dirty
    }

    /// Parent node
    pub fn parent(&self) -> Option<EntityHandle> {
        self.parent
    }

    /// Child nodes
    pub fn children(&self) -> &[EntityHandle] {
        &self.children
    }

    /// Assigned material
    pub fn material(&self) -> Option<MaterialHandle> {
        self.material
    }

    pub(crate) fn set_material(&mut self, material: Option<MaterialHandle>) {
        self.material = material;
    }

    /// Assigned mesh
    pub fn mesh(&self) -> Option<MeshHandle> {
        self.mesh
    }

    pub(crate) fn set_mesh(&mut self, mesh: Option<MeshHandle>) {
        self.mesh = mesh;
        self.transform_dirty = true;
    }

    /// Per-entity texture at a level
    pub fn texture_override(&self, level: TextureLevel) -> Option<TextureHandle> {
        self.texture_overrides.get(&level).copied()
    }

    /// Set a per-entity texture, used when the material does not share textures
    pub fn set_texture_override(&mut self, level: TextureLevel, texture: TextureHandle) {
        self.texture_overrides.insert(level, texture);
    }

    /// Drop a per-entity texture
    pub fn clear_texture_override(&mut self, level: TextureLevel) {
        self.texture_overrides.remove(&level);
    }

    /// Whether the entity is drawn
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether picking and the gizmo may select the entity
    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Allow or forbid selection
    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    /// World-space bounds, valid after the last hierarchy update
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub(crate) fn set_bounds(&mut self, bounds: Aabb) {
        self.bounds = bounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_id_encoding() {
        let id = ColorId(0x0012_3456);
        assert_eq!(id.to_rgb8(), [0x56, 0x34, 0x12]);
        assert_eq!(ColorId::from_rgb8(&[0x56, 0x34, 0x12, 0xFF]), Some(id));
    }

    #[test]
    fn test_background_decodes_to_none() {
        assert_eq!(ColorId::from_rgb8(&[0, 0, 0, 255]), None);
        assert_eq!(ColorId::from_rgb8(&[1, 0]), None);
    }

    #[test]
    fn test_kind_accessors() {
        let camera = Entity::new(1, "cam", EntityKind::Camera(CameraData::default()));
        assert!(camera.as_camera().is_some());
        assert!(camera.as_light().is_none());

        let light = Entity::new(2, "sun", EntityKind::Light(LightData::directional(1.0)));
        assert!(light.as_light().is_some());
    }

    #[test]
    fn test_transform_edit_marks_dirty() {
        let mut entity = Entity::new(1, "box", EntityKind::GameObject);
        entity.set_world_matrix(Mat4::identity());
        assert!(!entity.is_transform_dirty());
        entity.set_position(Vec3::new(1.0, 0.0, 0.0));
        assert!(entity.is_transform_dirty());
    }
}
