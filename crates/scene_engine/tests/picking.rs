mod common;

use common::{drawn_entity, engine, tagged_material};
use scene_engine::prelude::*;

fn click(x: f32, y: f32) -> FrameInput {
    FrameInput::new(1280, 720).with_cursor(x, y).with_click(MouseButton::Left)
}

fn handle(engine: &mut EngineContext<HeadlessDriver>, input: &FrameInput) -> PickOutcome {
    engine
        .editor
        .handle_input(input, &mut engine.render_manager, &mut engine.assets, &mut engine.driver)
        .unwrap()
}

#[test]
fn test_click_selects_entity_under_cursor() {
    let mut engine = engine();
    let material = tagged_material(&mut engine.assets, "m", 1);
    let target = drawn_entity(&mut engine.assets, &mut engine.driver, "target", material);
    let locked = drawn_entity(&mut engine.assets, &mut engine.driver, "locked", material);
    engine.assets.entity_mut(locked).unwrap().set_selectable(false);

    assert_eq!(handle(&mut engine, &click(640.0, 360.0)), PickOutcome::Selected(target));
    assert_eq!(engine.editor.selection.primary(), Some(target));
    assert_eq!(engine.editor.selection.len(), 1);
}

#[test]
fn test_click_on_background_clears_selection() {
    let mut engine = engine();
    let material = tagged_material(&mut engine.assets, "m", 1);
    let entity = drawn_entity(&mut engine.assets, &mut engine.driver, "e", material);
    assert!(engine.editor.selection.add(&engine.assets, entity));
    engine.assets.entity_mut(entity).unwrap().set_visible(false);

    assert_eq!(handle(&mut engine, &click(5.0, 5.0)), PickOutcome::Cleared);
    assert!(engine.editor.selection.is_empty());
}

#[test]
fn test_click_over_ui_is_ignored() {
    let mut engine = engine();
    let material = tagged_material(&mut engine.assets, "m", 1);
    let entity = drawn_entity(&mut engine.assets, &mut engine.driver, "e", material);
    assert!(engine.editor.selection.add(&engine.assets, entity));

    assert_eq!(handle(&mut engine, &click(5.0, 5.0).over_ui()), PickOutcome::Ignored);
    assert_eq!(handle(&mut engine, &FrameInput::new(1280, 720).with_cursor(5.0, 5.0)), PickOutcome::Ignored);
    assert_eq!(engine.editor.selection.primary(), Some(entity));
}

#[test]
fn test_picking_disabled_by_config() {
    let mut config = EngineConfig::default();
    config.renderer.enable_picking = false;
    let mut engine = EngineContext::new(config, HeadlessDriver::new()).unwrap();
    assert!(engine.render_manager.picking_framebuffer().is_none());

    let material = tagged_material(&mut engine.assets, "m", 1);
    drawn_entity(&mut engine.assets, &mut engine.driver, "e", material);
    assert_eq!(handle(&mut engine, &click(5.0, 5.0)), PickOutcome::Ignored);
}

#[test]
fn test_frame_picks_then_gizmo_moves_selection() {
    let mut engine = engine();
    let material = tagged_material(&mut engine.assets, "m", 1);
    let entity = drawn_entity(&mut engine.assets, &mut engine.driver, "e", material);

    let stats = engine.frame(&click(100.0, 100.0)).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(engine.editor.selection.primary(), Some(entity));

    assert!(engine.editor.gizmo.begin_drag(&engine.assets, &engine.editor.selection, GizmoAxis::Y));
    assert_eq!(engine.editor.gizmo.update_drag(&mut engine.assets, 2.0), 1);
    engine.editor.gizmo.end_drag();

    engine.frame(&FrameInput::new(1280, 720)).unwrap();
    let position = engine.assets.entity(entity).unwrap().world_position();
    approx::assert_relative_eq!(position, Vec3::new(0.0, 2.0, 0.0));
}
