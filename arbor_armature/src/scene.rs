// Arena-backed scene graph of rigid-transform nodes.
//
// A `Scene` owns every node in a flat `Vec<Node>`, addressed by `NodeId`
// (a stable index that is never reused). Each node owns an ordered child list
// and a local `Transformation`; its `parent` is a non-owning index used only
// for global-transform composition. `add_child` is the only way to link two
// nodes and it validates the link: no self-parenting, no re-parenting, and no
// cycles (the child may not appear in the parent's ancestor chain). The child
// list and the parent index are always updated together, so
// `children(p).contains(c)` iff `parent(c) == Some(p)`.
//
// Nodes start isolated (no parent) and join the graph through `stick_to`
// (rigidly join two named points) or `attach` (hang leaf geometry at a point).
// Isolated nodes that are never attached stay in the arena but are invisible
// to traversal, which starts at the scene root.
//
// Named points are immutable `(node, local position)` pairs. The constraint
// operations `hold` / `grab` / `point_at` / `release` orient a node by
// rotating it about the axis through its origin and the held point until the
// grabbed point faces a target.
//
// Global transforms are recomputed on every call by walking the ancestor
// chain; callers that need memoization (the cost function) cache externally.
//
// See also: `drawables.rs` for the read-only traversal that feeds a renderer,
// `grammar.rs` for the rule bodies that build scenes, `cost.rs` for the
// guiding-curve cost function that reads global positions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::drawables::BakedGeometry;
use crate::error::{ArmatureError, ArmatureResult};
use crate::transform::Transformation;

// ---------------------------------------------------------------------------
// Identifiers and value types
// ---------------------------------------------------------------------------

/// Stable index of a node within one `Scene`.
///
/// Ids are only meaningful for the scene that issued them; passing an id
/// from a different scene to a `Scene` method panics if it is out of range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// A coordinate in a specific node's local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    node: NodeId,
    position: Vec3,
}

impl Point {
    pub const fn new(node: NodeId, position: Vec3) -> Self {
        Self { node, position }
    }

    /// The node whose local frame `position` is expressed in.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

/// Argument to `hold` / `grab` / `point_at`: either a raw coordinate in the
/// acting node's local frame, or a point on any node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Anchor {
    Local(Vec3),
    Point(Point),
}

impl From<Vec3> for Anchor {
    fn from(v: Vec3) -> Self {
        Anchor::Local(v)
    }
}

impl From<Point> for Anchor {
    fn from(p: Point) -> Self {
        Anchor::Point(p)
    }
}

/// Whether a node is part of the armature topology or a leaf carrying
/// baked geometry.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Structural,
    Geometry(Arc<BakedGeometry>),
}

#[derive(Clone, Debug)]
struct Node {
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    transform: Transformation,
    points: BTreeMap<String, Vec3>,
    held: Option<Vec3>,
    grabbed: Option<Vec3>,
    kind: NodeKind,
}

impl Node {
    fn new(kind: NodeKind, transform: Transformation) -> Self {
        Self {
            parent: None,
            children: SmallVec::new(),
            transform,
            points: BTreeMap::new(),
            held: None,
            grabbed: None,
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// The node arena plus its root.
#[derive(Clone, Debug)]
pub struct Scene {
    nodes: Vec<Node>,
}

const ROOT: NodeId = NodeId(0);

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene containing only a structural root at the origin.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Structural, Transformation::IDENTITY)],
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Total nodes in the arena, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ids issued at or after `mark` (a previous `node_count()`).
    pub fn nodes_since(&self, mark: usize) -> impl Iterator<Item = NodeId> + '_ {
        (mark..self.nodes.len()).map(NodeId::from_index)
    }

    /// Create an isolated structural node with an identity transform.
    pub fn create_node(&mut self) -> NodeId {
        self.push(Node::new(NodeKind::Structural, Transformation::IDENTITY))
    }

    /// Create an isolated structural node with the given local transform.
    pub fn create_node_with(&mut self, transform: Transformation) -> NodeId {
        self.push(Node::new(NodeKind::Structural, transform))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn is_structural(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Structural)
    }

    pub fn transform(&self, id: NodeId) -> &Transformation {
        &self.node(id).transform
    }

    pub fn transform_mut(&mut self, id: NodeId) -> &mut Transformation {
        &mut self.node_mut(id).transform
    }

    /// Ancestors of `id`, nearest first. Does not include `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            scene: self,
            next: self.parent(id),
        }
    }

    /// All descendants of `id` in depth-first pre-order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    // -----------------------------------------------------------------------
    // Named points
    // -----------------------------------------------------------------------

    /// Register a named point on `node`.
    ///
    /// Names are unique per node; re-registering an existing name fails
    /// with `DuplicatePoint` rather than silently moving the point.
    pub fn create_point(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        local: Vec3,
    ) -> ArmatureResult<Point> {
        let name = name.into();
        let points = &mut self.node_mut(node).points;
        if points.contains_key(&name) {
            return Err(ArmatureError::DuplicatePoint { node, name });
        }
        points.insert(name, local);
        Ok(Point::new(node, local))
    }

    pub fn point(&self, node: NodeId, name: &str) -> ArmatureResult<Point> {
        self.node(node)
            .points
            .get(name)
            .map(|&p| Point::new(node, p))
            .ok_or_else(|| ArmatureError::PointNotFound {
                node,
                name: name.to_string(),
            })
    }

    /// Named points on `node`, ordered by name.
    pub fn points(&self, node: NodeId) -> impl Iterator<Item = (&str, Point)> + '_ {
        self.node(node)
            .points
            .iter()
            .map(move |(name, &p)| (name.as_str(), Point::new(node, p)))
    }

    /// The origin of `node` as a point.
    pub fn origin(&self, node: NodeId) -> Point {
        Point::new(node, Vec3::ZERO)
    }

    // -----------------------------------------------------------------------
    // Composition
    // -----------------------------------------------------------------------

    /// Append `child` to `parent`'s child list and link it back.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> ArmatureResult<()> {
        if parent == child {
            return Err(ArmatureError::SelfAttachment(child));
        }
        if child == ROOT || self.parent(child).is_some() {
            return Err(ArmatureError::AlreadyAttached(child));
        }
        if self.ancestors(parent).any(|a| a == child) {
            return Err(ArmatureError::CycleDetected { parent, child });
        }
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
        Ok(())
    }

    /// Attach `this.node()` under `target.node()` so the two points coincide.
    ///
    /// The child's position is chosen in the parent frame such that its
    /// local point `this` lands on the parent's local point `target`, taking
    /// the child's current rotation and scale into account.
    pub fn stick_to(&mut self, this: Point, target: Point) -> ArmatureResult<()> {
        if this.node == target.node {
            return Err(ArmatureError::SelfAttachment(this.node));
        }
        self.add_child(target.node, this.node)?;
        let t = &mut self.node_mut(this.node).transform;
        t.position = target.position - t.rotation * (t.scale * this.position);
        Ok(())
    }

    /// Hang a new leaf geometry node at `at`. Returns the new node.
    pub fn attach(&mut self, at: Point, geometry: Arc<BakedGeometry>) -> ArmatureResult<NodeId> {
        let leaf = self.push(Node::new(
            NodeKind::Geometry(geometry),
            Transformation::from_position(at.position),
        ));
        self.add_child(at.node, leaf)?;
        Ok(leaf)
    }

    /// Compose ancestor local transforms, root first, with this node's own.
    pub fn global_transform(&self, id: NodeId) -> Mat4 {
        let local = self.transform(id).to_matrix();
        match self.parent(id) {
            Some(parent) => self.global_transform(parent) * local,
            None => local,
        }
    }

    /// Translation component of the global transform.
    pub fn global_position(&self, id: NodeId) -> Vec3 {
        self.global_transform(id).w_axis.truncate()
    }

    /// World-space position of a point.
    pub fn point_global_position(&self, point: Point) -> Vec3 {
        self.global_transform(point.node).transform_point3(point.position)
    }

    /// Express an anchor in `node`'s local frame.
    pub fn to_local(&self, node: NodeId, anchor: Anchor) -> ArmatureResult<Vec3> {
        match anchor {
            Anchor::Local(v) => Ok(v),
            Anchor::Point(p) if p.node == node => Ok(p.position),
            Anchor::Point(p) => {
                let world = self.point_global_position(p);
                let global = self.global_transform(node);
                let det = global.determinant();
                if !det.is_finite() || det.abs() < f32::MIN_POSITIVE {
                    return Err(ArmatureError::NonInvertibleTransform(node));
                }
                Ok(global.inverse().transform_point3(world))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Constraint operations
    // -----------------------------------------------------------------------

    /// Fix the rotation axis for subsequent `point_at` calls: the line
    /// through `node`'s origin and `anchor`.
    pub fn hold(&mut self, node: NodeId, anchor: impl Into<Anchor>) -> ArmatureResult<()> {
        let local = self.to_local(node, anchor.into())?;
        self.node_mut(node).held = Some(local);
        Ok(())
    }

    /// Record the coordinate that `point_at` will swing toward its target.
    pub fn grab(&mut self, node: NodeId, anchor: impl Into<Anchor>) -> ArmatureResult<()> {
        let local = self.to_local(node, anchor.into())?;
        self.node_mut(node).grabbed = Some(local);
        Ok(())
    }

    pub fn held(&self, node: NodeId) -> Option<Vec3> {
        self.node(node).held
    }

    pub fn grabbed(&self, node: NodeId) -> Option<Vec3> {
        self.node(node).grabbed
    }

    /// Rotate `node` so its grabbed point faces `target`.
    ///
    /// With a held point, the rotation is restricted to the axis from the
    /// origin to the held point: both the grabbed and target vectors are
    /// projected onto the plane perpendicular to that axis, and the node
    /// turns by the signed angle between the projections. Without a held
    /// point the node turns along the shortest arc. Degenerate inputs (a
    /// vector lying on the axis, or zero length) leave the rotation as is.
    pub fn point_at(&mut self, node: NodeId, target: impl Into<Anchor>) -> ArmatureResult<()> {
        let grabbed = self.grabbed(node).ok_or(ArmatureError::GrabRequired(node))?;
        let target = self.to_local(node, target.into())?;

        // Rotation is applied after scale, so align the scaled vectors.
        let scale = self.transform(node).scale;
        let correction = match self.held(node) {
            Some(held) => axis_rotation(scale * held, scale * grabbed, scale * target),
            None => shortest_arc(scale * grabbed, scale * target),
        };

        match correction {
            Some(q) => {
                let t = &mut self.node_mut(node).transform;
                t.rotation = (t.rotation * q).normalize();
            }
            None => {
                tracing::warn!(%node, ?grabbed, ?target, "point_at: degenerate alignment, rotation unchanged");
            }
        }
        Ok(())
    }

    /// Clear held and grabbed state.
    pub fn release(&mut self, node: NodeId) {
        let n = self.node_mut(node);
        n.held = None;
        n.grabbed = None;
    }
}

/// Rotation about the origin→`held` axis carrying `from`'s perpendicular
/// component onto `to`'s.
fn axis_rotation(held: Vec3, from: Vec3, to: Vec3) -> Option<Quat> {
    let axis = held.try_normalize()?;
    let from = (from - axis * from.dot(axis)).try_normalize()?;
    let to = (to - axis * to.dot(axis)).try_normalize()?;
    let angle = axis.dot(from.cross(to)).atan2(from.dot(to));
    Some(Quat::from_axis_angle(axis, angle))
}

fn shortest_arc(from: Vec3, to: Vec3) -> Option<Quat> {
    Some(Quat::from_rotation_arc(from.try_normalize()?, to.try_normalize()?))
}

/// Iterator over a node's ancestors, nearest first.
pub struct Ancestors<'a> {
    scene: &'a Scene,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.scene.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::f32::consts::FRAC_PI_2;

    const EPS: f32 = 1e-4;

    /// A node with `base` at its origin and `tip` one unit up.
    fn segment(scene: &mut Scene) -> NodeId {
        let n = scene.create_node();
        scene.create_point(n, "base", Vec3::ZERO).unwrap();
        scene.create_point(n, "tip", Vec3::Y).unwrap();
        n
    }

    #[test]
    fn stick_base_to_tip() {
        let mut scene = Scene::new();
        let a = segment(&mut scene);
        scene.add_child(scene.root(), a).unwrap();
        let b = segment(&mut scene);

        let base = scene.point(b, "base").unwrap();
        let tip = scene.point(a, "tip").unwrap();
        scene.stick_to(base, tip).unwrap();

        assert!(scene.global_position(b).abs_diff_eq(Vec3::Y, EPS));
        assert_eq!(scene.parent(b), Some(a));
        assert_eq!(scene.children(a), &[b]);
    }

    #[test]
    fn stick_to_makes_points_coincide_under_rotation() {
        let mut scene = Scene::new();
        let a = scene.create_node_with(Transformation {
            position: Vec3::new(2.0, 0.0, -1.0),
            rotation: Quat::from_rotation_x(0.4),
            scale: Vec3::ONE,
        });
        scene.add_child(scene.root(), a).unwrap();
        let pa = scene.create_point(a, "socket", Vec3::new(0.3, 1.2, 0.0)).unwrap();

        let b = scene.create_node_with(Transformation {
            position: Vec3::ZERO,
            rotation: Quat::from_rotation_z(1.1),
            scale: Vec3::splat(0.5),
        });
        let pb = scene.create_point(b, "plug", Vec3::new(0.0, -0.4, 0.2)).unwrap();
        scene.stick_to(pb, pa).unwrap();

        let wa = scene.point_global_position(pa);
        let wb = scene.point_global_position(pb);
        assert!(wa.abs_diff_eq(wb, EPS), "{wa} vs {wb}");
    }

    #[test]
    fn stick_to_same_node_fails() {
        let mut scene = Scene::new();
        let a = segment(&mut scene);
        let base = scene.point(a, "base").unwrap();
        let tip = scene.point(a, "tip").unwrap();
        let err = scene.stick_to(base, tip).unwrap_err();
        assert!(matches!(err, ArmatureError::SelfAttachment(n) if n == a));
        assert_eq!(scene.parent(a), None);
    }

    #[test]
    fn missing_point_is_not_found() {
        let scene = Scene::new();
        let err = scene.point(scene.root(), "nowhere").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_point_name_rejected() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        scene.create_point(n, "tip", Vec3::Y).unwrap();
        let err = scene.create_point(n, "tip", Vec3::X).unwrap_err();
        assert!(matches!(err, ArmatureError::DuplicatePoint { .. }));
        assert_eq!(scene.point(n, "tip").unwrap().position(), Vec3::Y);
    }

    #[test]
    fn add_child_rejects_reparenting_and_cycles() {
        let mut scene = Scene::new();
        let a = scene.create_node();
        let b = scene.create_node();
        let c = scene.create_node();
        scene.add_child(a, b).unwrap();
        scene.add_child(b, c).unwrap();

        assert!(matches!(
            scene.add_child(scene.root(), b),
            Err(ArmatureError::AlreadyAttached(_))
        ));
        assert!(matches!(
            scene.add_child(c, a),
            Err(ArmatureError::CycleDetected { .. })
        ));
        assert!(matches!(
            scene.add_child(a, a),
            Err(ArmatureError::SelfAttachment(_))
        ));
        assert!(matches!(
            scene.add_child(a, scene.root()),
            Err(ArmatureError::AlreadyAttached(_))
        ));
        // Failed links leave the graph untouched.
        assert_eq!(scene.parent(a), None);
        assert_eq!(scene.children(c), &[] as &[NodeId]);
    }

    #[test]
    fn parent_child_links_stay_consistent() {
        let mut scene = Scene::new();
        let mut last = scene.root();
        for _ in 0..5 {
            let n = segment(&mut scene);
            let base = scene.point(n, "base").unwrap();
            let tip = if last == scene.root() {
                scene.origin(last)
            } else {
                scene.point(last, "tip").unwrap()
            };
            scene.stick_to(base, tip).unwrap();
            last = n;
        }
        for i in 0..scene.node_count() {
            let id = NodeId::from_index(i);
            for &child in scene.children(id) {
                assert_eq!(scene.parent(child), Some(id));
            }
        }
        assert!(scene.global_position(last).abs_diff_eq(Vec3::new(0.0, 4.0, 0.0), EPS));
    }

    #[test]
    fn global_transform_is_product_of_ancestors() {
        let mut scene = Scene::new();
        let transforms = [
            Transformation {
                position: Vec3::new(1.0, 0.0, 0.0),
                rotation: Quat::from_rotation_y(0.3),
                scale: Vec3::splat(2.0),
            },
            Transformation {
                position: Vec3::new(0.0, 1.5, 0.0),
                rotation: Quat::from_rotation_z(-0.7),
                scale: Vec3::ONE,
            },
            Transformation {
                position: Vec3::new(0.2, 0.0, 0.9),
                rotation: Quat::from_rotation_x(1.2),
                scale: Vec3::new(1.0, 0.5, 1.0),
            },
        ];
        let mut parent = scene.root();
        let mut expected = Mat4::IDENTITY;
        for t in transforms {
            let n = scene.create_node_with(t);
            scene.add_child(parent, n).unwrap();
            expected *= t.to_matrix();
            assert!(scene.global_transform(n).abs_diff_eq(expected, EPS));
            parent = n;
        }
        assert_eq!(scene.ancestors(parent).count(), 3);
    }

    #[test]
    fn attach_places_leaf_at_point() {
        let mut scene = Scene::new();
        let a = segment(&mut scene);
        scene.add_child(scene.root(), a).unwrap();
        let tip = scene.point(a, "tip").unwrap();
        let leaf = scene.attach(tip, Arc::new(BakedGeometry::default())).unwrap();

        assert!(!scene.is_structural(leaf));
        assert_eq!(scene.parent(leaf), Some(a));
        assert!(scene.global_position(leaf).abs_diff_eq(Vec3::Y, EPS));
        assert_eq!(scene.descendants(scene.root()), vec![a, leaf]);
    }

    #[test]
    fn point_at_requires_grab() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        let err = scene.point_at(n, Vec3::X).unwrap_err();
        assert!(matches!(err, ArmatureError::GrabRequired(id) if id == n));
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    }

    #[test]
    fn point_at_rotates_about_held_axis() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        scene.add_child(scene.root(), n).unwrap();

        // Axis is +Y; swing +X around to face +Z (and a bit up, which the
        // projection ignores).
        scene.hold(n, Vec3::Y).unwrap();
        scene.grab(n, Vec3::X).unwrap();
        scene.point_at(n, Vec3::new(0.0, 5.0, 3.0)).unwrap();

        let rotated = scene.transform(n).rotation * Vec3::X;
        assert!(rotated.abs_diff_eq(Vec3::Z, EPS), "{rotated}");
        // The held axis itself does not move.
        let axis = scene.transform(n).rotation * Vec3::Y;
        assert!(axis.abs_diff_eq(Vec3::Y, EPS));
    }

    #[test]
    fn point_at_handles_opposite_direction() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        scene.hold(n, Vec3::Y).unwrap();
        scene.grab(n, Vec3::X).unwrap();
        scene.point_at(n, Vec3::NEG_X).unwrap();
        let rotated = scene.transform(n).rotation * Vec3::X;
        assert!(rotated.abs_diff_eq(Vec3::NEG_X, EPS), "{rotated}");
        let axis = scene.transform(n).rotation * Vec3::Y;
        assert!(axis.abs_diff_eq(Vec3::Y, EPS), "{axis}");
    }

    #[test]
    fn point_at_aligns_projected_vectors_in_world_space() {
        let mut scene = Scene::new();
        let parent = scene.create_node_with(Transformation {
            position: Vec3::new(3.0, 1.0, -2.0),
            rotation: Quat::from_rotation_z(0.5) * Quat::from_rotation_x(-0.3),
            scale: Vec3::ONE,
        });
        scene.add_child(scene.root(), parent).unwrap();
        let n = scene.create_node_with(Transformation {
            position: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::from_rotation_y(FRAC_PI_2),
            scale: Vec3::ONE,
        });
        scene.add_child(parent, n).unwrap();

        let held = Vec3::new(0.2, 1.0, 0.1);
        let grabbed = Vec3::new(1.0, 0.5, -0.3);
        let target_world = Vec3::new(-4.0, 6.0, 1.0);

        scene.hold(n, held).unwrap();
        scene.grab(n, grabbed).unwrap();
        let anchor = scene.create_node_with(Transformation::from_position(target_world));
        scene.point_at(n, scene.origin(anchor)).unwrap();

        let g = scene.global_transform(n);
        let origin = g.transform_point3(Vec3::ZERO);
        let axis = (g.transform_point3(held) - origin).normalize();
        let project = |p: Vec3| {
            let v = p - origin;
            (v - axis * v.dot(axis)).normalize()
        };
        let dot = project(g.transform_point3(grabbed)).dot(project(target_world));
        assert!((dot - 1.0).abs() < 1e-3, "dot = {dot}");
    }

    #[test]
    fn point_at_aligns_under_non_uniform_scale() {
        let mut scene = Scene::new();
        let n = scene.create_node_with(Transformation {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::new(3.0, 1.0, 1.0),
        });
        scene.add_child(scene.root(), n).unwrap();

        let grabbed = Vec3::new(1.0, 0.0, 1.0);
        let target_world = Vec3::new(0.0, 0.0, 5.0);
        scene.hold(n, Vec3::Y).unwrap();
        scene.grab(n, grabbed).unwrap();
        let anchor = scene.create_node_with(Transformation::from_position(target_world));
        scene.point_at(n, scene.origin(anchor)).unwrap();

        let g = scene.global_transform(n);
        let axis = g.transform_vector3(Vec3::Y).normalize();
        let project = |v: Vec3| (v - axis * v.dot(axis)).normalize();
        let dot = project(g.transform_point3(grabbed)).dot(project(target_world));
        assert!((dot - 1.0).abs() < 1e-3, "dot = {dot}");

        // Without a hold the scaled grabbed point lands on the target ray.
        let m = scene.create_node_with(Transformation {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::new(1.0, 4.0, 0.5),
        });
        scene.grab(m, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        scene.point_at(m, Vec3::new(0.0, 0.0, 2.0)).unwrap();
        let world = scene.global_transform(m).transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(world.normalize().abs_diff_eq(Vec3::Z, EPS), "{world}");
    }

    #[test]
    fn point_at_without_hold_uses_shortest_arc() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        scene.grab(n, Vec3::Y).unwrap();
        scene.point_at(n, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        let rotated = scene.transform(n).rotation * Vec3::Y;
        assert!(rotated.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0).normalize(), EPS));
    }

    #[test]
    fn point_at_degenerate_target_is_noop() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        scene.hold(n, Vec3::Y).unwrap();
        scene.grab(n, Vec3::X).unwrap();
        // Target on the axis has no perpendicular component.
        scene.point_at(n, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        assert_eq!(scene.transform(n).rotation, Quat::IDENTITY);
    }

    #[test]
    fn release_clears_constraints() {
        let mut scene = Scene::new();
        let n = scene.create_node();
        scene.hold(n, Vec3::Y).unwrap();
        scene.grab(n, Vec3::X).unwrap();
        scene.release(n);
        assert_eq!(scene.held(n), None);
        assert_eq!(scene.grabbed(n), None);
        assert!(scene.point_at(n, Vec3::Z).is_err());
    }

    #[test]
    fn hold_converts_foreign_points_to_local_frame() {
        let mut scene = Scene::new();
        let a = scene.create_node_with(Transformation::from_position(Vec3::new(0.0, 2.0, 0.0)));
        scene.add_child(scene.root(), a).unwrap();
        let b = scene.create_node_with(Transformation::from_position(Vec3::new(1.0, 0.0, 0.0)));
        let p = scene.create_point(b, "p", Vec3::new(0.0, 1.0, 0.0)).unwrap();

        scene.hold(a, p).unwrap();
        // b is unattached, so p sits at world (1,1,0); a's origin is (0,2,0).
        let held = scene.held(a).unwrap();
        assert!(held.abs_diff_eq(Vec3::new(1.0, -1.0, 0.0), EPS), "{held}");
    }

    #[test]
    fn singular_transform_is_reported() {
        let mut scene = Scene::new();
        let flat = scene.create_node_with(Transformation {
            scale: Vec3::new(1.0, 0.0, 1.0),
            ..Transformation::IDENTITY
        });
        let other = scene.create_node();
        let err = scene.grab(flat, scene.origin(other)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonInvertibleTransform);
    }
}
