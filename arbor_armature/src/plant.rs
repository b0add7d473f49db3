// Ready-made plant grammar.
//
// `PlantProfile` groups the knobs that shape a plant armature, with named
// presets (`sapling()`, `shrub()`) tuning the same parameter set into
// different growth habits. `plant_grammar()` turns a profile into a `Grammar`
// with four rules:
//   - `trunk`: one near-vertical segment at the attachment point, then a
//     `branch` and a `maybeBranch` at its tip;
//   - `branch` (weighted): continue with one slightly bent segment, fork into
//     two spread segments, or end in a bud (a leaf at the attachment point);
//   - `maybeBranch`: occasionally grow a strongly tilted side segment;
//   - `leaf`: occasionally hang the shared leaf quad at the attachment point.
//
// Every segment is a structural node with `base` and `tip` points. The base
// is stuck to the attachment point, so the segment starts out aligned with
// its parent. It is then twisted about its own long axis (hold the tip, swing
// +X) and tilted away from the parent direction (grab the tip, point it at a
// jittered target). Segment length decays geometrically with detail depth.
//
// See also: `grammar.rs` for the rule kinds and depth bound, `search.rs` for
// cost-guided selection over this grammar.

use std::f32::consts::TAU;
use std::sync::Arc;

use arbor_prng::ArmatureRng;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::drawables::BakedGeometry;
use crate::error::ArmatureResult;
use crate::grammar::{Expansion, Grammar};
use crate::scene::{Point, Scene};

/// Fraction of `spread` the trunk may lean by.
const TRUNK_LEAN: f32 = 0.25;

/// Parameters for `plant_grammar`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlantProfile {
    /// Length of the trunk segment.
    pub segment_length: f32,
    /// Multiplier applied to segment length per detail level.
    pub length_decay: f32,
    /// Maximum tilt of a branch away from its parent, in radians.
    pub spread: f32,
    pub continue_weight: f64,
    pub fork_weight: f64,
    /// Weight of ending a branch in a bud.
    pub bud_weight: f64,
    /// Probability that `maybeBranch` grows a side segment.
    pub branch_probability: f64,
    /// Probability that `leaf` attaches a leaf.
    pub leaf_probability: f64,
    pub leaf_size: f32,
    pub leaf_color: [f32; 3],
}

impl PlantProfile {
    /// Young upright plant: long internodes, narrow spread, few forks.
    pub fn sapling() -> Self {
        Self {
            segment_length: 1.0,
            length_decay: 0.85,
            spread: 0.5,
            continue_weight: 3.0,
            fork_weight: 1.0,
            bud_weight: 0.5,
            branch_probability: 0.3,
            leaf_probability: 0.6,
            leaf_size: 0.3,
            leaf_color: [0.25, 0.6, 0.2],
        }
    }

    /// Low bushy plant: short internodes, wide spread, frequent forks.
    pub fn shrub() -> Self {
        Self {
            segment_length: 0.6,
            length_decay: 0.75,
            spread: 1.1,
            continue_weight: 1.0,
            fork_weight: 2.0,
            bud_weight: 0.5,
            branch_probability: 0.6,
            leaf_probability: 0.8,
            leaf_size: 0.2,
            leaf_color: [0.2, 0.45, 0.15],
        }
    }

    /// Segment length for a rule running at `depth`.
    pub fn length_at(&self, depth: u32) -> f32 {
        self.segment_length * self.length_decay.powi(depth.min(i32::MAX as u32) as i32)
    }

    /// Two-triangle leaf quad rising from its attachment point along +Y.
    pub fn leaf_mesh(&self) -> BakedGeometry {
        let h = self.leaf_size * 0.5;
        let s = self.leaf_size;
        BakedGeometry {
            positions: vec![[-h, 0.0, 0.0], [h, 0.0, 0.0], [h, s, 0.0], [-h, s, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            indices: vec![[0, 1, 2], [0, 2, 3]],
            colors: vec![self.leaf_color; 4],
            shadeless: false,
        }
    }
}

impl Default for PlantProfile {
    fn default() -> Self {
        Self::sapling()
    }
}

/// Uniform value in `[-amount, amount)`. Zero when `amount` is zero.
fn jitter(rng: &mut ArmatureRng, amount: f32) -> f32 {
    (rng.next_f32() * 2.0 - 1.0) * amount
}

/// Grow one segment of `length` from `at`, twisted about its long axis and
/// tilted away from the parent direction. Returns the segment's tip.
pub fn grow_segment(
    scene: &mut Scene,
    at: Point,
    length: f32,
    twist: f32,
    tilt: f32,
) -> ArmatureResult<Point> {
    let node = scene.create_node();
    let base = scene.create_point(node, "base", Vec3::ZERO)?;
    let tip = scene.create_point(node, "tip", Vec3::Y * length)?;
    scene.stick_to(base, at)?;

    scene.hold(node, tip)?;
    scene.grab(node, Vec3::X)?;
    scene.point_at(node, Vec3::new(twist.cos(), 0.0, twist.sin()))?;
    scene.release(node);

    if tilt != 0.0 {
        scene.grab(node, tip)?;
        scene.point_at(node, Vec3::new(tilt.sin(), tilt.cos(), 0.0) * length)?;
        scene.release(node);
    }
    Ok(tip)
}

/// Draw a twist and grow a segment tilted by `tilt`, sized for the current
/// detail depth.
fn sprout(x: &mut Expansion<'_>, profile: &PlantProfile, at: Point, tilt: f32) -> ArmatureResult<Point> {
    let twist = x.rng().next_f32() * TAU;
    let length = profile.length_at(x.depth());
    grow_segment(x.scene(), at, length, twist, tilt)
}

/// Build the four-rule plant grammar for `profile`.
pub fn plant_grammar(profile: &PlantProfile) -> ArmatureResult<Grammar> {
    let p = *profile;
    let leaf = Arc::new(p.leaf_mesh());
    let mut g = Grammar::new();

    g.define("trunk", move |x, at| {
        let tilt = jitter(x.rng(), p.spread * TRUNK_LEAN);
        let tip = sprout(x, &p, at, tilt)?;
        x.add_detail("branch", tip)?;
        x.add_detail("maybeBranch", tip)
    })?;

    g.define_weighted("branch", p.continue_weight, move |x, at| {
        let tilt = jitter(x.rng(), p.spread * 0.5);
        let tip = sprout(x, &p, at, tilt)?;
        x.add_detail("branch", tip)?;
        x.add_detail("maybeBranch", tip)?;
        x.add_detail("leaf", tip)
    })?;

    g.define_weighted("branch", p.fork_weight, move |x, at| {
        for side in [-1.0f32, 1.0] {
            let tilt = side * p.spread * x.rng().range_f32(0.5, 1.0);
            let tip = sprout(x, &p, at, tilt)?;
            x.add_detail("branch", tip)?;
            x.add_detail("leaf", tip)?;
        }
        Ok(())
    })?;

    g.define_weighted("branch", p.bud_weight, |x, at| x.add_detail("leaf", at))?;

    g.define_maybe("maybeBranch", p.branch_probability, move |x, at| {
        let tilt = p.spread * x.rng().range_f32(0.6, 1.0);
        let tip = sprout(x, &p, at, tilt)?;
        x.add_detail("branch", tip)
    })?;

    g.define_maybe("leaf", p.leaf_probability, move |x, at| {
        x.scene().attach(at, Arc::clone(&leaf))?;
        Ok(())
    })?;

    Ok(g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArmatureError;
    use crate::grammar::GenerateOptions;

    const EPS: f32 = 1e-4;

    fn grow(profile: &PlantProfile, seed: u64, depth: u32) -> Scene {
        let g = plant_grammar(profile).unwrap();
        let mut scene = Scene::new();
        g.generate(
            &mut scene,
            &mut ArmatureRng::new(seed),
            &GenerateOptions::new("trunk", depth),
        )
        .unwrap();
        scene
    }

    fn world_points(scene: &Scene) -> Vec<Vec3> {
        (0..scene.node_count())
            .map(|i| scene.global_position(crate::scene::NodeId::from_index(i)))
            .collect()
    }

    #[test]
    fn registers_four_rules() {
        let g = plant_grammar(&PlantProfile::sapling()).unwrap();
        let names: Vec<&str> = g.rule_names().collect();
        assert_eq!(names, vec!["branch", "leaf", "maybeBranch", "trunk"]);
    }

    #[test]
    fn presets_differ_in_habit() {
        let sapling = PlantProfile::sapling();
        let shrub = PlantProfile::shrub();
        assert!(shrub.spread > sapling.spread);
        assert!(shrub.fork_weight > sapling.fork_weight);
        assert_eq!(PlantProfile::default(), sapling);
    }

    #[test]
    fn invalid_weight_is_rejected() {
        let profile = PlantProfile {
            fork_weight: -1.0,
            ..PlantProfile::sapling()
        };
        let err = plant_grammar(&profile).unwrap_err();
        assert!(matches!(err, ArmatureError::InvalidWeight { .. }), "{err}");
    }

    #[test]
    fn segment_keeps_length_and_tilt() {
        let mut scene = Scene::new();
        let root = scene.origin(scene.root());
        let tip = grow_segment(&mut scene, root, 2.0, 1.0, 0.3).unwrap();
        let world = scene.point_global_position(tip);
        assert!((world.length() - 2.0).abs() < EPS, "{world}");
        assert!((world.normalize().dot(Vec3::Y) - 0.3f32.cos()).abs() < EPS);
    }

    #[test]
    fn segments_chain_tip_to_base() {
        let mut scene = Scene::new();
        let root = scene.origin(scene.root());
        let first = grow_segment(&mut scene, root, 1.0, 0.4, 0.2).unwrap();
        let second = grow_segment(&mut scene, first, 0.5, 2.0, 0.6).unwrap();
        let base = scene.point(second.node(), "base").unwrap();
        assert!(
            scene
                .point_global_position(base)
                .abs_diff_eq(scene.point_global_position(first), EPS)
        );
    }

    #[test]
    fn same_seed_grows_same_plant() {
        let profile = PlantProfile::shrub();
        let a = grow(&profile, 11, 4);
        let b = grow(&profile, 11, 4);
        assert_eq!(a.node_count(), b.node_count());
        assert_eq!(world_points(&a), world_points(&b));
    }

    #[test]
    fn structure_respects_depth_bound() {
        let depth = 3;
        for seed in 0..8 {
            let scene = grow(&PlantProfile::shrub(), seed, depth);
            for i in 1..scene.node_count() {
                let id = crate::scene::NodeId::from_index(i);
                if scene.is_structural(id) {
                    let nesting = scene.ancestors(id).count();
                    assert!(nesting <= depth as usize + 1, "seed {seed}: {id} at {nesting}");
                }
            }
        }
    }

    #[test]
    fn leaves_appear_across_seeds() {
        let mut leaves = Vec::new();
        for seed in 0..10 {
            leaves.extend(grow(&PlantProfile::sapling(), seed, 4).drawables(false).geometry);
        }
        assert!(!leaves.is_empty());
        assert!(leaves.iter().all(|l| !l.shadeless));
        assert_eq!(leaves[0].geometry.indices.len(), 2);
    }

    #[test]
    fn profile_parses_from_json() {
        let json = serde_json::to_string(&PlantProfile::shrub()).unwrap();
        let back: PlantProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PlantProfile::shrub());
    }
}
