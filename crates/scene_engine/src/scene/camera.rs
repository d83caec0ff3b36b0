//! Camera and light payloads carried by [`super::EntityKind`]
//!
//! Cameras take their pose from the owning entity's world transform; only
//! projection parameters live here. Matrices follow the OpenGL clip-space
//! convention (right-handed, depth in [-1, 1]).

use nalgebra::{Orthographic3, Perspective3};
use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Mat4, Vec3};

/// Projection model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective with a vertical field of view in radians
    Perspective {
        /// Vertical field of view
        fov_y: f32,
    },
    /// Orthographic with a fixed view height in world units
    Orthographic {
        /// Height of the view volume
        height: f32,
    },
}

/// Projection parameters of a camera entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    /// Projection model
    pub projection: Projection,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Distance to near clipping plane
    pub near: f32,
    /// Distance to far clipping plane
    pub far: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl CameraData {
    /// Perspective camera; the field of view is given in degrees
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y: utils::deg_to_rad(fov_degrees) },
            aspect,
            near,
            far,
        }
    }

    /// Orthographic camera
    pub fn orthographic(height: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { height },
            aspect,
            near,
            far,
        }
    }

    /// Update the aspect ratio after a viewport change
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => {
                Perspective3::new(self.aspect, fov_y, self.near, self.far).to_homogeneous()
            }
            Projection::Orthographic { height } => {
                let half_h = height * 0.5;
                let half_w = half_h * self.aspect;
                Orthographic3::new(-half_w, half_w, -half_h, half_h, self.near, self.far).to_homogeneous()
            }
        }
    }

    /// View matrix for a camera whose world transform is `world`
    pub fn view_matrix(world: &Mat4) -> Mat4 {
        world.try_inverse().unwrap_or_else(Mat4::identity)
    }
}

/// Light type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Parallel rays along the entity's -Z axis
    Directional,
    /// Omnidirectional with a falloff range
    Point {
        /// Falloff distance
        range: f32,
    },
    /// Cone along the entity's -Z axis
    Spot {
        /// Falloff distance
        range: f32,
        /// Half-angle of the cone in radians
        angle: f32,
    },
}

/// Light parameters of a light entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightData {
    /// Light type
    pub kind: LightKind,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
}

impl LightData {
    /// White directional light
    pub fn directional(intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity,
        }
    }

    /// White point light
    pub fn point(range: f32, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point { range },
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity,
        }
    }

    /// Change the color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }
}
