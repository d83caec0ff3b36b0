//! Transform gizmo
//!
//! Translate, rotate and scale the selection along one axis. A drag
//! snapshots the local transform of every affected entity when it begins and
//! applies the accumulated drag amount to those snapshots on each update, so
//! repeated updates never accumulate rounding drift.
//!
//! Entities whose ancestor is also selected are left alone; they follow the
//! ancestor through the hierarchy.

use crate::assets::{Assets, EntityHandle};
use crate::editor::Selection;
use crate::foundation::math::{Quat, Transform, Unit, Vec3};

const MIN_SCALE: f32 = 0.001;

/// Gizmo operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GizmoMode {
    /// Move along an axis
    #[default]
    Translate,
    /// Rotate around an axis
    Rotate,
    /// Scale along an axis
    Scale,
}

/// Constraint axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoAxis {
    /// World X
    X,
    /// World Y
    Y,
    /// World Z
    Z,
    /// All axes; uniform scale, free translation along the diagonal
    Center,
}

impl GizmoAxis {
    /// Direction of the axis
    pub fn direction(self) -> Vec3 {
        match self {
            Self::X => Vec3::x(),
            Self::Y => Vec3::y(),
            Self::Z => Vec3::z(),
            Self::Center => Vec3::repeat(1.0),
        }
    }

    /// Handle color
    pub fn color(self) -> [f32; 4] {
        match self {
            Self::X => [1.0, 0.2, 0.2, 1.0],
            Self::Y => [0.2, 1.0, 0.2, 1.0],
            Self::Z => [0.2, 0.5, 1.0, 1.0],
            Self::Center => [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone)]
struct DragState {
    axis: GizmoAxis,
    start: Vec<(EntityHandle, Transform)>,
}

/// Interactive transform manipulator over the selection
#[derive(Debug, Default)]
pub struct Gizmo {
    mode: GizmoMode,
    snap: Option<f32>,
    drag: Option<DragState>,
}

impl Gizmo {
    /// Translate gizmo without snapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch mode; an active drag is cancelled
    pub fn set_mode(&mut self, mode: GizmoMode) {
        if self.mode != mode {
            self.drag = None;
            self.mode = mode;
        }
    }

    /// Current mode
    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    /// Round drag amounts to multiples of `increment`
    pub fn set_snap(&mut self, increment: Option<f32>) {
        self.snap = increment.filter(|i| *i > 0.0);
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Average world position of the selection, where the gizmo is drawn
    pub fn pivot(assets: &Assets, selection: &Selection) -> Option<Vec3> {
        let positions: Vec<Vec3> = selection
            .iter()
            .filter_map(|h| assets.entity(h))
            .map(|e| e.world_position())
            .collect();
        if positions.is_empty() {
            return None;
        }
        let sum = positions.iter().fold(Vec3::zeros(), |acc, p| acc + p);
        Some(sum / positions.len() as f32)
    }

    /// Start dragging along `axis`; returns `false` when nothing can move
    pub fn begin_drag(&mut self, assets: &Assets, selection: &Selection, axis: GizmoAxis) -> bool {
        let start: Vec<(EntityHandle, Transform)> = selection
            .iter()
            .filter(|h| !selection.iter().any(|other| assets.is_descendant_of(*h, other)))
            .filter_map(|h| assets.entity(h).filter(|e| e.is_selectable()).map(|e| (h, e.transform().clone())))
            .collect();
        if start.is_empty() {
            return false;
        }
        log::debug!("Gizmo {:?} drag on {:?} for {} entities", self.mode, axis, start.len());
        self.drag = Some(DragState { axis, start });
        true
    }

    /// Apply the total drag `amount` since [`Gizmo::begin_drag`]
    ///
    /// Units are world units for translation, radians for rotation and a
    /// relative factor offset for scale (`0.5` scales by 1.5). Returns the
    /// number of entities moved.
    pub fn update_drag(&self, assets: &mut Assets, amount: f32) -> usize {
        let Some(drag) = &self.drag else { return 0 };
        let amount = match self.snap {
            Some(increment) => (amount / increment).round() * increment,
            None => amount,
        };

        let mut moved = 0;
        for (handle, start) in &drag.start {
            let Some(entity) = assets.entity_mut(*handle) else { continue };
            entity.set_transform(self.apply(drag.axis, start, amount));
            moved += 1;
        }
        moved
    }

    fn apply(&self, axis: GizmoAxis, start: &Transform, amount: f32) -> Transform {
        let mut transform = start.clone();
        match self.mode {
            GizmoMode::Translate => {
                transform.position = start.position + axis.direction() * amount;
            }
            GizmoMode::Rotate => {
                let around = match axis {
                    GizmoAxis::Center => return transform,
                    _ => Unit::new_normalize(axis.direction()),
                };
                transform.rotation = Quat::from_axis_angle(&around, amount) * start.rotation;
            }
            GizmoMode::Scale => {
                let factor = Vec3::repeat(1.0) + axis.direction() * amount;
                transform.scale = start.scale.component_mul(&factor).map(|s| s.max(MIN_SCALE));
            }
        }
        transform
    }

    /// Finish the drag, keeping the applied transforms
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Abort the drag and restore the starting transforms
    pub fn cancel_drag(&mut self, assets: &mut Assets) {
        if let Some(drag) = self.drag.take() {
            for (handle, start) in drag.start {
                if let Some(entity) = assets.entity_mut(handle) {
                    entity.set_transform(start);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::AssetScope;
    use crate::scene::EntityKind;
    use approx::assert_relative_eq;

    fn setup() -> (Assets, Selection, EntityHandle) {
        let mut assets = Assets::new();
        let entity = assets.create_entity(AssetScope::Scene, "box", EntityKind::GameObject).unwrap();
        let mut selection = Selection::new();
        selection.add(&assets, entity);
        (assets, selection, entity)
    }

    #[test]
    fn test_translate_is_absolute_from_drag_start() {
        let (mut assets, selection, entity) = setup();
        let mut gizmo = Gizmo::new();
        assert!(gizmo.begin_drag(&assets, &selection, GizmoAxis::X));

        gizmo.update_drag(&mut assets, 1.0);
        gizmo.update_drag(&mut assets, 2.5);
        gizmo.end_drag();
        assert_relative_eq!(assets.entity(entity).unwrap().transform().position, Vec3::new(2.5, 0.0, 0.0));
    }

    #[test]
    fn test_scale_snaps_and_clamps() {
        let (mut assets, selection, entity) = setup();
        let mut gizmo = Gizmo::new();
        gizmo.set_mode(GizmoMode::Scale);
        gizmo.set_snap(Some(0.5));
        gizmo.begin_drag(&assets, &selection, GizmoAxis::Center);

        gizmo.update_drag(&mut assets, 0.6);
        assert_relative_eq!(assets.entity(entity).unwrap().transform().scale, Vec3::repeat(1.5));

        gizmo.update_drag(&mut assets, -3.0);
        assert_relative_eq!(assets.entity(entity).unwrap().transform().scale, Vec3::repeat(MIN_SCALE));
    }

    #[test]
    fn test_rotate_about_axis() {
        let (mut assets, selection, entity) = setup();
        let mut gizmo = Gizmo::new();
        gizmo.set_mode(GizmoMode::Rotate);
        gizmo.begin_drag(&assets, &selection, GizmoAxis::Y);
        gizmo.update_drag(&mut assets, std::f32::consts::FRAC_PI_2);

        let rotated = assets.entity(entity).unwrap().transform().rotation * Vec3::x();
        assert_relative_eq!(rotated, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_cancel_restores_start() {
        let (mut assets, selection, entity) = setup();
        let mut gizmo = Gizmo::new();
        gizmo.begin_drag(&assets, &selection, GizmoAxis::Z);
        gizmo.update_drag(&mut assets, 4.0);
        gizmo.cancel_drag(&mut assets);
        assert_relative_eq!(assets.entity(entity).unwrap().transform().position, Vec3::zeros());
        assert!(!gizmo.is_dragging());
    }

    #[test]
    fn test_child_of_selected_parent_is_not_moved_twice() {
        let (mut assets, mut selection, parent) = setup();
        let child = assets.create_entity(AssetScope::Scene, "child", EntityKind::GameObject).unwrap();
        assets.set_parent(child, Some(parent)).unwrap();
        selection.add(&assets, child);

        let mut gizmo = Gizmo::new();
        gizmo.begin_drag(&assets, &selection, GizmoAxis::X);
        assert_eq!(gizmo.update_drag(&mut assets, 1.0), 1);
        assert_relative_eq!(assets.entity(child).unwrap().transform().position, Vec3::zeros());
    }

    #[test]
    fn test_empty_selection_cannot_drag() {
        let assets = Assets::new();
        let mut gizmo = Gizmo::new();
        assert!(!gizmo.begin_drag(&assets, &Selection::new(), GizmoAxis::X));
    }
}
