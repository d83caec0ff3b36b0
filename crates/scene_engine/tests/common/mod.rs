#![allow(dead_code)]

use scene_engine::prelude::*;
use scene_engine::render::DriverCall;

pub fn engine() -> EngineContext<HeadlessDriver> {
    EngineContext::new(EngineConfig::default(), HeadlessDriver::new()).unwrap()
}

pub fn triangle(assets: &mut Assets, driver: &mut dyn GraphicsDriver) -> MeshHandle {
    let vertices = [Vertex::at(0.0, 0.0, 0.0), Vertex::at(1.0, 0.0, 0.0), Vertex::at(0.0, 1.0, 0.0)];
    assets
        .create_mesh(driver, AssetScope::Scene, "triangle", &vertices, None, PrimitiveMode::Triangles)
        .unwrap()
}

/// Material drawn with the flat color-ID program, tagged with its sequence
pub fn tagged_material(assets: &mut Assets, name: &str, sequence: u32) -> MaterialHandle {
    let material = Material::new(name, ProgramPair::new(assets.color_id_program()))
        .with_uniform("u_tag", UniformValue::Int(sequence as i32));
    assets.create_material(AssetScope::Scene, material, Some(sequence)).unwrap()
}

pub fn drawn_entity(
    assets: &mut Assets,
    driver: &mut dyn GraphicsDriver,
    name: &str,
    material: MaterialHandle,
) -> EntityHandle {
    let mesh = triangle(assets, driver);
    let entity = assets.create_entity(AssetScope::Scene, name, EntityKind::GameObject).unwrap();
    assets.set_entity_mesh(entity, Some(mesh));
    assets.set_entity_material(entity, Some(material));
    entity
}

/// Tags in the order the driver received them
pub fn tags(driver: &HeadlessDriver) -> Vec<i32> {
    driver
        .calls()
        .iter()
        .filter_map(|call| match call {
            DriverCall::SetUniform { name, value: UniformValue::Int(tag), .. } if name == "u_tag" => Some(*tag),
            _ => None,
        })
        .collect()
}

/// One entity per sequence number, plus a camera
pub struct TaggedScene {
    pub name: &'static str,
    pub sequences: Vec<u32>,
}

impl Scene for TaggedScene {
    fn name(&self) -> &str {
        self.name
    }

    fn setup(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        ctx.assets
            .create_entity(AssetScope::Scene, "camera", EntityKind::Camera(CameraData::default()))?;
        for sequence in &self.sequences {
            let material = tagged_material(ctx.assets, &format!("m{sequence}"), *sequence);
            drawn_entity(ctx.assets, &mut *ctx.driver, &format!("e{sequence}"), material);
        }
        Ok(())
    }
}
