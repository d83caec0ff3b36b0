//! Editor layer
//!
//! Selection, click picking and the transform gizmo. The editor holds no
//! GPU state of its own; it drives [`RenderManager::pick`](crate::render::RenderManager::pick)
//! and edits entity transforms through [`Assets`].

pub mod gizmo;
pub mod picking;
pub mod selection;

pub use gizmo::{Gizmo, GizmoAxis, GizmoMode};
pub use picking::PickOutcome;
pub use selection::Selection;

use crate::assets::Assets;
use crate::input::{InputState, Viewport};
use crate::render::{GraphicsDriver, RenderManager, RenderResult};

/// Editor state for one viewport
#[derive(Debug, Default)]
pub struct Editor {
    /// Selected entities
    pub selection: Selection,
    /// Transform manipulator
    pub gizmo: Gizmo,
}

impl Editor {
    /// Empty selection, translate gizmo
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one frame of input
    ///
    /// Clicks are ignored while a gizmo drag is active.
    pub fn handle_input<I>(
        &mut self,
        input: &I,
        render_manager: &mut RenderManager,
        assets: &mut Assets,
        driver: &mut dyn GraphicsDriver,
    ) -> RenderResult<PickOutcome>
    where
        I: InputState + Viewport + ?Sized,
    {
        self.selection.retain_live(assets);
        if self.gizmo.is_dragging() {
            return Ok(PickOutcome::Ignored);
        }
        picking::handle_click(input, render_manager, assets, driver, &mut self.selection)
    }
}
