// Read-only traversal from scene graph to renderer-facing primitives.
//
// `Scene::drawables()` walks the tree depth-first from the root, composing each
// node's local matrix against its parent's accumulated world matrix (one
// multiply per node, no repeated ancestor walks), and emits two parallel
// sequences:
//   - `GeometryInstance` for every leaf node carrying `BakedGeometry`, stamped
//     with its resolved world transform;
//   - optionally, one `BoneInstance` per non-root node: the shared bone mesh
//     (built once per process and handed out as `Drawables::bone_mesh`)
//     placed at the parent's origin, rotated so the mesh's +Y long axis
//     points at this node's origin, and stretched along Y to the segment
//     length.
//
// `BakedGeometry` is an opaque vertex/triangle payload owned by the geometry
// layer. The scene shares it by `Arc`; nothing here inspects its contents
// beyond the bone mesh constructor.
//
// This module never mutates the scene.

use std::sync::{Arc, LazyLock};

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::{NodeId, NodeKind, Scene};

/// Baked triangle geometry: positions, normals, triangle indices, colors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BakedGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<[u32; 3]>,
    pub colors: Vec<[f32; 3]>,
    /// Render without lighting.
    pub shadeless: bool,
}

/// Half-width of the bone prism's widest ring.
const BONE_WIDTH: f32 = 0.1;
/// Height of the widest ring along the bone's unit length.
const BONE_WAIST: f32 = 0.2;
const BONE_COLOR: [f32; 3] = [0.9, 0.75, 0.3];

static BONE_MESH: LazyLock<Arc<BakedGeometry>> =
    LazyLock::new(|| Arc::new(BakedGeometry::bone_mesh()));

impl BakedGeometry {
    /// The 6-vertex, 8-triangle bone prism spanning y in [0, 1].
    ///
    /// Vertex 0 is the base, 1..=4 the waist ring, 5 the tip. Triangles are
    /// wound counter-clockwise seen from outside.
    pub fn bone_mesh() -> Self {
        let w = BONE_WIDTH;
        let h = BONE_WAIST;
        let positions = vec![
            [0.0, 0.0, 0.0],
            [w, h, 0.0],
            [0.0, h, w],
            [-w, h, 0.0],
            [0.0, h, -w],
            [0.0, 1.0, 0.0],
        ];
        let normals = positions
            .iter()
            .map(|&p| {
                let n = (Vec3::from(p) - Vec3::new(0.0, h, 0.0)).normalize_or_zero();
                n.to_array()
            })
            .collect();

        let mut indices = Vec::with_capacity(8);
        for i in 0..4u32 {
            let a = 1 + i;
            let b = 1 + (i + 1) % 4;
            indices.push([0, a, b]);
            indices.push([5, b, a]);
        }

        Self {
            positions,
            normals,
            indices,
            colors: vec![BONE_COLOR; 6],
            shadeless: true,
        }
    }
}

/// A geometry leaf resolved to world space.
#[derive(Clone, Debug)]
pub struct GeometryInstance {
    pub node: NodeId,
    pub geometry: Arc<BakedGeometry>,
    pub world: Mat4,
    pub shadeless: bool,
}

/// One bone visualization instance for the segment parent → `node`.
#[derive(Clone, Debug)]
pub struct BoneInstance {
    pub node: NodeId,
    pub world: Mat4,
    pub shadeless: bool,
}

/// Output of a traversal, in depth-first order.
#[derive(Clone, Debug, Default)]
pub struct Drawables {
    pub geometry: Vec<GeometryInstance>,
    pub bones: Vec<BoneInstance>,
    /// The one bone mesh every `BoneInstance` draws. `None` when bones were
    /// not requested.
    pub bone_mesh: Option<Arc<BakedGeometry>>,
}

/// World transform placing the unit bone mesh between two points.
pub fn bone_transform(from: Vec3, to: Vec3) -> Mat4 {
    let segment = to - from;
    let length = segment.length();
    let rotation = match segment.try_normalize() {
        Some(dir) => Quat::from_rotation_arc(Vec3::Y, dir),
        None => Quat::IDENTITY,
    };
    Mat4::from_scale_rotation_translation(Vec3::new(1.0, length, 1.0), rotation, from)
}

impl Scene {
    /// Resolve every geometry leaf (and optionally every bone) reachable
    /// from the root.
    pub fn drawables(&self, include_bones: bool) -> Drawables {
        let mut out = Drawables {
            bone_mesh: include_bones.then(|| Arc::clone(&BONE_MESH)),
            ..Drawables::default()
        };
        let root = self.root();
        // (node, world matrix, parent's world origin)
        let mut stack = vec![(root, self.transform(root).to_matrix(), None)];

        while let Some((id, world, parent_origin)) = stack.pop() {
            let origin = world.w_axis.truncate();
            if let NodeKind::Geometry(geometry) = self.kind(id) {
                out.geometry.push(GeometryInstance {
                    node: id,
                    geometry: Arc::clone(geometry),
                    world,
                    shadeless: geometry.shadeless,
                });
            }
            if let (true, Some(from)) = (include_bones, parent_origin) {
                out.bones.push(BoneInstance {
                    node: id,
                    world: bone_transform(from, origin),
                    shadeless: true,
                });
            }

            for &child in self.children(id).iter().rev() {
                let child_world = world * self.transform(child).to_matrix();
                stack.push((child, child_world, Some(origin)));
            }
        }
        out
    }
}
