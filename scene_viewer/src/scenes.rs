//! Demo scenes

use scene_engine::foundation::math::utils;
use scene_engine::prelude::*;
use scene_engine::render::GlState;

const LIT_VERTEX: &str = "#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_uv;
uniform mat4 u_model;
uniform mat4 u_view;
uniform mat4 u_projection;
out vec3 v_normal;
out vec2 v_uv;
void main() {
    v_normal = mat3(u_model) * a_normal;
    v_uv = a_uv;
    gl_Position = u_projection * u_view * u_model * vec4(a_position, 1.0);
}
";

const LIT_FRAGMENT: &str = "#version 330 core
in vec3 v_normal;
in vec2 v_uv;
uniform sampler2D u_diffuse;
uniform vec4 u_tint;
out vec4 frag_color;
void main() {
    float light = max(dot(normalize(v_normal), normalize(vec3(0.4, 1.0, 0.3))), 0.2);
    frag_color = texture(u_diffuse, v_uv) * u_tint * vec4(vec3(light), 1.0);
}
";

fn cube_vertices() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = [
                normal[0] * 0.5 + u[0] * su + v[0] * sv,
                normal[1] * 0.5 + u[1] * su + v[1] * sv,
                normal[2] * 0.5 + u[2] * su + v[2] * sv,
            ];
            vertices.push(Vertex::new(position, normal, [su + 0.5, sv + 0.5]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn lit_program(ctx: &mut SceneContext<'_>) -> Result<ProgramHandle, SceneError> {
    let program = ShaderProgram::new(
        &mut *ctx.driver,
        "lit",
        vec![
            (ShaderStage::Vertex, ShaderSource::Inline(LIT_VERTEX.to_owned())),
            (ShaderStage::Fragment, ShaderSource::Inline(LIT_FRAGMENT.to_owned())),
        ],
        false,
    )?
    .with_texture_levels(&[TextureLevel::Diffuse]);
    Ok(ctx.assets.add_program(AssetScope::Scene, program))
}

fn camera(ctx: &mut SceneContext<'_>, position: Vec3) -> Result<EntityHandle, SceneError> {
    let (width, height) = ctx.viewport;
    let aspect = utils::aspect_ratio(width, height);
    let camera = ctx.assets.create_entity(
        AssetScope::Scene,
        "camera",
        EntityKind::Camera(CameraData::perspective(60.0, aspect, 0.1, 100.0)),
    )?;
    if let Some(entity) = ctx.assets.entity_mut(camera) {
        entity.set_position(position);
        entity.set_selectable(false);
    }
    *ctx.main_camera = Some(camera);
    Ok(camera)
}

/// Grid of textured cubes orbiting a parent pivot
pub struct CubeGrid {
    size: u32,
    pivot: Option<EntityHandle>,
}

impl CubeGrid {
    /// `size` x `size` cubes
    pub fn new(size: u32) -> Self {
        Self { size, pivot: None }
    }
}

impl Scene for CubeGrid {
    fn name(&self) -> &str {
        "cube_grid"
    }

    fn setup(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        camera(ctx, Vec3::new(0.0, 2.0, 12.0))?;
        let sun = ctx.assets.create_entity(
            AssetScope::Scene,
            "sun",
            EntityKind::Light(LightData::directional(1.0).with_color(Vec3::new(1.0, 0.95, 0.8))),
        )?;
        if let Some(entity) = ctx.assets.entity_mut(sun) {
            entity.set_selectable(false);
        }

        let (vertices, indices) = cube_vertices();
        let cube = ctx
            .assets
            .create_mesh(&mut *ctx.driver, AssetScope::Scene, "cube", &vertices, Some(&indices), PrimitiveMode::Triangles)?;
        let program = lit_program(ctx)?;

        let checker = ImageData::checkerboard(64, 8, [230, 230, 230, 255], [60, 60, 70, 255]);
        let texture = ctx
            .assets
            .create_texture(&mut *ctx.driver, AssetScope::Scene, "checker", checker.desc(), &checker.data)?;

        let textured = Material::new("checker", ProgramPair::new(program))
            .with_texture(TextureLevel::Diffuse, texture)
            .with_uniform("u_tint", UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]));
        let textured = ctx.assets.create_material(AssetScope::Scene, textured, Some(10))?;
        // No diffuse assigned: draws with the null checkerboard
        let untextured = Material::new("untextured", ProgramPair::new(program))
            .with_uniform("u_tint", UniformValue::Vec4([0.6, 0.8, 1.0, 1.0]));
        let untextured = ctx.assets.create_material(AssetScope::Scene, untextured, Some(5))?;

        let pivot = ctx.assets.create_entity(AssetScope::Scene, "pivot", EntityKind::GameObject)?;
        let half = self.size as f32 / 2.0;
        for row in 0..self.size {
            for column in 0..self.size {
                let name = format!("cube_{row}_{column}");
                let entity = ctx.assets.create_entity(AssetScope::Scene, name, EntityKind::GameObject)?;
                let material = if (row + column) % 2 == 0 { textured } else { untextured };
                ctx.assets.set_entity_mesh(entity, Some(cube));
                ctx.assets.set_entity_material(entity, Some(material));
                if let Some(e) = ctx.assets.entity_mut(entity) {
                    e.set_position(Vec3::new((column as f32 - half) * 1.5, 0.0, (row as f32 - half) * 1.5));
                }
                ctx.assets.set_parent(entity, Some(pivot))?;
            }
        }
        self.pivot = Some(pivot);
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>, delta_time: f32) -> Result<(), SceneError> {
        let Some(pivot) = self.pivot.and_then(|h| ctx.assets.entity_mut(h)) else {
            return Ok(());
        };
        let spin = Quat::from_axis_angle(&Vec3::y_axis(), delta_time * 0.5);
        let transform = pivot.transform_mut();
        transform.rotation = spin * transform.rotation;
        Ok(())
    }

    fn destroy(&mut self, _ctx: &mut SceneContext<'_>) {
        self.pivot = None;
    }
}

/// Opaque floor under transparent panes
pub struct GlassPanes {
    panes: u32,
}

impl GlassPanes {
    /// Scene with `panes` transparent quads
    pub fn new(panes: u32) -> Self {
        Self { panes }
    }
}

impl Scene for GlassPanes {
    fn name(&self) -> &str {
        "glass_panes"
    }

    fn setup(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        camera(ctx, Vec3::new(0.0, 1.5, 6.0))?;
        let (vertices, indices) = cube_vertices();
        let slab = ctx
            .assets
            .create_mesh(&mut *ctx.driver, AssetScope::Scene, "slab", &vertices, Some(&indices), PrimitiveMode::Triangles)?;
        let program = lit_program(ctx)?;

        let floor = Material::new("floor", ProgramPair::new(program))
            .with_uniform("u_tint", UniformValue::Vec4([0.4, 0.4, 0.4, 1.0]));
        let floor = ctx.assets.create_material(AssetScope::Scene, floor, Some(1))?;
        let glass = Material::new("glass", ProgramPair::new(program))
            .with_mode(RenderMode::Transparent)
            .with_state(GlState::transparent())
            .with_uniform("u_tint", UniformValue::Vec4([0.5, 0.8, 1.0, 0.35]));
        let glass = ctx.assets.create_material(AssetScope::Scene, glass, Some(2))?;

        let ground = ctx.assets.create_entity(AssetScope::Scene, "floor", EntityKind::GameObject)?;
        ctx.assets.set_entity_mesh(ground, Some(slab));
        ctx.assets.set_entity_material(ground, Some(floor));
        if let Some(entity) = ctx.assets.entity_mut(ground) {
            entity.set_transform(Transform::from_position(Vec3::new(0.0, -0.55, 0.0)).with_scale(Vec3::new(10.0, 0.1, 10.0)));
        }

        for i in 0..self.panes {
            let pane = ctx.assets.create_entity(AssetScope::Scene, format!("pane_{i}"), EntityKind::GameObject)?;
            ctx.assets.set_entity_mesh(pane, Some(slab));
            ctx.assets.set_entity_material(pane, Some(glass));
            if let Some(entity) = ctx.assets.entity_mut(pane) {
                entity.set_transform(
                    Transform::from_position(Vec3::new(i as f32 * 1.2 - 1.8, 0.5, -(i as f32)))
                        .with_scale(Vec3::new(1.0, 1.0, 0.05)),
                );
            }
        }
        Ok(())
    }
}
