// Local rigid transform of a scene node.
//
// A `Transformation` is the position/rotation/scale triple every node owns.
// It composes to a 4x4 matrix as translate · rotate · scale, so a local
// point is scaled first, then rotated, then moved into the parent frame.
// Nodes mutate their transformation in place (`stick_to` writes position,
// `point_at` composes onto rotation); nothing here caches matrices.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transformation {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Compose to `translate(position) · rotate(rotation) · scale(scale)`.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Map a point in this local frame into the parent frame.
    pub fn apply(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * local)
    }
}

impl Default for Transformation {
    fn default() -> Self {
        Self::IDENTITY
    }
}
