//! Window and input collaborators
//!
//! The engine does not own a window. Whatever hosts it (a windowing layer,
//! an editor shell, a test) implements [`Viewport`] and [`InputState`] and
//! hands them to the editor each frame. [`FrameInput`] is a plain snapshot
//! implementing both.

use std::collections::HashSet;

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

/// Viewport queries
pub trait Viewport {
    /// Viewport size in pixels
    fn viewport_size(&self) -> (u32, u32);

    /// Whether the cursor is over a UI panel rather than the scene
    fn is_cursor_on_ui(&self) -> bool;

    /// Width over height
    fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.viewport_size();
        crate::foundation::math::utils::aspect_ratio(width, height)
    }
}

/// Per-frame input queries
pub trait InputState {
    /// Whether a button went down this frame
    fn mouse_button_down(&self, button: MouseButton) -> bool;

    /// Cursor in viewport pixels, origin top-left; `None` outside the viewport
    fn mouse_viewport_position(&self) -> Option<(f32, f32)>;
}

/// Input snapshot of one frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Viewport size in pixels
    pub viewport: (u32, u32),
    /// Cursor over a UI panel
    pub cursor_on_ui: bool,
    /// Cursor in viewport pixels, origin top-left
    pub cursor: Option<(f32, f32)>,
    /// Buttons pressed this frame
    pub pressed: HashSet<MouseButton>,
}

impl FrameInput {
    /// Snapshot with no buttons pressed and no cursor
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            ..Self::default()
        }
    }

    /// Move the cursor
    pub fn with_cursor(mut self, x: f32, y: f32) -> Self {
        self.cursor = Some((x, y));
        self
    }

    /// Press a button this frame
    pub fn with_click(mut self, button: MouseButton) -> Self {
        self.pressed.insert(button);
        self
    }

    /// Put the cursor over UI
    pub fn over_ui(mut self) -> Self {
        self.cursor_on_ui = true;
        self
    }

    /// Forget button presses; call at the end of a frame
    pub fn clear_clicks(&mut self) {
        self.pressed.clear();
    }
}

impl Viewport for FrameInput {
    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn is_cursor_on_ui(&self) -> bool {
        self.cursor_on_ui
    }
}

impl InputState for FrameInput {
    fn mouse_button_down(&self, button: MouseButton) -> bool {
        self.pressed.contains(&button)
    }

    fn mouse_viewport_position(&self) -> Option<(f32, f32)> {
        let (x, y) = self.cursor?;
        let (width, height) = self.viewport;
        let inside = x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32;
        inside.then_some((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cursor_outside_viewport_is_none() {
        let input = FrameInput::new(100, 50).with_cursor(120.0, 10.0);
        assert!(input.mouse_viewport_position().is_none());

        let input = FrameInput::new(100, 50).with_cursor(99.0, 49.0);
        assert_eq!(input.mouse_viewport_position(), Some((99.0, 49.0)));
    }

    #[test]
    fn test_aspect_ratio_from_viewport() {
        let input = FrameInput::new(1920, 1080);
        assert_relative_eq!(input.aspect_ratio(), 1920.0 / 1080.0);
    }

    #[test]
    fn test_clicks_are_per_frame() {
        let mut input = FrameInput::new(10, 10).with_click(MouseButton::Left);
        assert!(input.mouse_button_down(MouseButton::Left));
        input.clear_clicks();
        assert!(!input.mouse_button_down(MouseButton::Left));
    }
}
