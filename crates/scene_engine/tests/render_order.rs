mod common;

use common::{drawn_entity, engine, tagged_material, tags, TaggedScene};
use scene_engine::prelude::*;

#[test]
fn test_materials_draw_in_sequence_order() {
    let mut engine = engine();
    engine
        .set_scene(Box::new(TaggedScene { name: "order", sequences: vec![5, 1, 3] }))
        .unwrap();

    engine.driver.clear_calls();
    let stats = engine.render_manager.render_frame(&mut engine.assets, &mut engine.driver).unwrap();
    assert_eq!(tags(&engine.driver), vec![1, 3, 5]);
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.material_binds, 3);
}

#[test]
fn test_sequence_change_mid_run_resorts() {
    let mut engine = engine();
    let a = tagged_material(&mut engine.assets, "a", 1);
    let b = tagged_material(&mut engine.assets, "b", 2);
    drawn_entity(&mut engine.assets, &mut engine.driver, "ea", a);
    drawn_entity(&mut engine.assets, &mut engine.driver, "eb", b);

    engine.render_manager.render_frame(&mut engine.assets, &mut engine.driver).unwrap();
    assert_eq!(engine.render_manager.material_order(), vec![a, b]);
    assert!(!engine.render_manager.is_material_order_dirty());

    assert!(engine.assets.set_material_sequence(b, Some(0)));
    engine.render_manager.sync_order_changes(&mut engine.assets);
    assert!(engine.render_manager.is_material_order_dirty());

    assert!(engine.render_manager.sort_materials(&mut engine.assets));
    assert_eq!(engine.render_manager.material_order(), vec![b, a]);
}

#[test]
fn test_taken_sequence_is_refused() {
    let mut engine = engine();
    let a = tagged_material(&mut engine.assets, "a", 1);
    let b = tagged_material(&mut engine.assets, "b", 2);

    assert!(!engine.assets.set_material_sequence(b, Some(1)));
    assert_eq!(engine.assets.material(a).unwrap().sequence(), Some(1));
    assert_eq!(engine.assets.material(b).unwrap().sequence(), Some(2));
}

#[test]
fn test_missing_diffuse_binds_checkerboard() {
    let mut engine = engine();
    let program = ShaderProgram::new(
        &mut engine.driver,
        "textured",
        vec![
            (ShaderStage::Vertex, ShaderSource::Inline("void main() {}".into())),
            (ShaderStage::Fragment, ShaderSource::Inline("uniform sampler2D u_diffuse;".into())),
        ],
        false,
    )
    .unwrap()
    .with_texture_levels(&[TextureLevel::Diffuse]);
    let program = engine.assets.add_program(AssetScope::Scene, program);

    // Texture assigned and then destroyed: the stale handle must not bind
    let image = ImageData::solid_color(2, 2, [255, 255, 255, 255]);
    let texture = engine
        .assets
        .create_texture(&mut engine.driver, AssetScope::Scene, "white", image.desc(), &image.data)
        .unwrap();
    let material = Material::new("textured", ProgramPair::new(program)).with_texture(TextureLevel::Diffuse, texture);
    let material = engine.assets.create_material(AssetScope::Scene, material, Some(1)).unwrap();
    drawn_entity(&mut engine.assets, &mut engine.driver, "e", material);
    assert!(engine.assets.destroy_texture(&mut engine.driver, texture));

    let stats = engine.render_manager.render_frame(&mut engine.assets, &mut engine.driver).unwrap();
    assert_eq!(stats.fallback_textures, 1);
    assert_eq!(
        engine.driver.bound_texture(TextureLevel::Diffuse.unit()),
        engine.assets.null_image(TextureLevel::Diffuse)
    );
}

#[test]
fn test_bad_vertex_count_is_reported_and_skipped() {
    let mut engine = engine();
    let vertices = [Vertex::at(0.0, 0.0, 0.0), Vertex::at(1.0, 0.0, 0.0), Vertex::at(0.0, 1.0, 0.0), Vertex::at(1.0, 1.0, 0.0)];
    let mesh = engine
        .assets
        .create_mesh(&mut engine.driver, AssetScope::Scene, "quad", &vertices, None, PrimitiveMode::Triangles)
        .unwrap();
    assert!(matches!(
        engine.assets.mesh(mesh).unwrap().draw(&mut engine.driver),
        Err(RenderError::InvalidDrawCount { count: 4, .. })
    ));

    let material = tagged_material(&mut engine.assets, "m", 1);
    let entity = engine.assets.create_entity(AssetScope::Scene, "quad", EntityKind::GameObject).unwrap();
    engine.assets.set_entity_mesh(entity, Some(mesh));
    engine.assets.set_entity_material(entity, Some(material));

    let stats = engine.render_manager.render_frame(&mut engine.assets, &mut engine.driver).unwrap();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.skipped_entities, 1);
}
