//! Click-to-select
//!
//! Turns a left click over the scene viewport into a color-ID pick and
//! updates the selection with the result.

use crate::assets::{Assets, EntityHandle};
use crate::editor::Selection;
use crate::input::{InputState, MouseButton, Viewport};
use crate::render::{GraphicsDriver, RenderManager, RenderResult};

/// What a frame's click did to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    /// No eligible click this frame
    Ignored,
    /// Click landed on empty space; selection cleared
    Cleared,
    /// Entity under the cursor is now the only selection
    Selected(EntityHandle),
}

/// Convert a top-left viewport position to bottom-left framebuffer pixels
pub fn to_framebuffer_coords(position: (f32, f32), viewport_height: u32) -> (u32, u32) {
    let x = position.0.max(0.0) as u32;
    let y = position.1.max(0.0) as u32;
    (x, viewport_height.saturating_sub(1).saturating_sub(y))
}

/// Pick under the cursor when the left button went down over the scene
pub fn handle_click<I>(
    input: &I,
    render_manager: &mut RenderManager,
    assets: &mut Assets,
    driver: &mut dyn GraphicsDriver,
    selection: &mut Selection,
) -> RenderResult<PickOutcome>
where
    I: InputState + Viewport + ?Sized,
{
    if !render_manager.picking_enabled() || !input.mouse_button_down(MouseButton::Left) || input.is_cursor_on_ui() {
        return Ok(PickOutcome::Ignored);
    }
    let Some(position) = input.mouse_viewport_position() else {
        return Ok(PickOutcome::Ignored);
    };

    let (_, height) = input.viewport_size();
    let (x, y) = to_framebuffer_coords(position, height);
    match render_manager.pick(assets, driver, x, y)? {
        Some(entity) if selection.select_only(assets, entity) => Ok(PickOutcome::Selected(entity)),
        _ => {
            selection.clear();
            Ok(PickOutcome::Cleared)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_left_flips_to_bottom_left() {
        assert_eq!(to_framebuffer_coords((0.0, 0.0), 600), (0, 599));
        assert_eq!(to_framebuffer_coords((10.7, 599.2), 600), (10, 0));
    }
}
