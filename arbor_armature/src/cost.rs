// Cost-function protocol and the guiding-curve reference implementation.
//
// A search strategy grows candidate expansions and asks a `CostFunction` to
// score each one: given the candidate's accumulated `Cost` and the nodes the
// latest expansion added, `get_cost` returns the updated cost. Costs are
// additive, so scoring a sequence of disjoint expansions step by step gives the
// same total as scoring them in any other order.
//
// `GuidingVectors` scores placement against one or more `GuidingCurve`s. For
// every structural node among the added nodes (and their structural
// descendants) it finds the curve closest to the node's parent origin and adds
//   alignment = (-dot(tangent, placement_dir) + offset) * alignment_multiplier
//   distance  = m0 + m1*d + m2*d^2
// where `placement_dir` is the unit vector parent origin -> node origin, and
// `tangent` is the curve's normalized derivative at the closest parameter.
// Following the curve earns a negative alignment term; straying from it costs
// quadratically. No look-ahead: `heuristic_cost` is always 0.
//
// Global positions are memoized per node in a cache owned by the session
// (one `GuidingVectors` value). The cache assumes nodes stop moving once
// scored, which holds while one tree keeps growing. Start a new session with
// `fresh_session()` for each independent tree or candidate; sessions are never
// shared between threads.
//
// `vector_field` and `curve_polylines` are read-only debug views over the
// same curve data.

use std::ops::Add;
use std::sync::Arc;

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::curve::{CurveShape, ParametricCurve, Projection};
use crate::scene::{NodeId, Scene};

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Accumulated cost of a candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Cost already incurred by the nodes placed so far.
    pub real_cost: f64,
    /// Estimate of cost still to come.
    pub heuristic_cost: f64,
}

impl Cost {
    pub const ZERO: Self = Self {
        real_cost: 0.0,
        heuristic_cost: 0.0,
    };

    pub fn new(real_cost: f64, heuristic_cost: f64) -> Self {
        Self {
            real_cost,
            heuristic_cost,
        }
    }

    pub fn total(&self) -> f64 {
        self.real_cost + self.heuristic_cost
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(
            self.real_cost + rhs.real_cost,
            self.heuristic_cost + rhs.heuristic_cost,
        )
    }
}

/// A candidate scene paired with its accumulated cost.
#[derive(Clone, Debug, Default)]
pub struct GeneratorInstance {
    pub scene: Scene,
    pub cost: Cost,
}

impl GeneratorInstance {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            cost: Cost::ZERO,
        }
    }
}

pub trait CostFunction {
    /// Updated cost of `instance` after `added` nodes were grown into it.
    fn get_cost(&mut self, instance: &GeneratorInstance, added: &[NodeId]) -> Cost;

    /// Same configuration, empty per-session state.
    fn fresh_session(&self) -> Self
    where
        Self: Sized;
}

// ---------------------------------------------------------------------------
// Guiding curves
// ---------------------------------------------------------------------------

/// A curve plus the weights that turn proximity and alignment into cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuidingCurve {
    pub shape: CurveShape,
    /// `[c0, c1, c2]` in `c0 + c1*d + c2*d^2`.
    pub distance_multiplier: [f32; 3],
    pub alignment_multiplier: f32,
    /// In [-1, 1]. Alignment above this value lowers cost.
    pub alignment_offset: f32,
}

impl GuidingCurve {
    pub fn distance_cost(&self, d: f32) -> f32 {
        let [c0, c1, c2] = self.distance_multiplier;
        c0 + d * (c1 + d * c2)
    }

    pub fn alignment_cost(&self, tangent: Vec3, direction: Vec3) -> f32 {
        (-tangent.dot(direction) + self.alignment_offset) * self.alignment_multiplier
    }
}

/// Per-node cost breakdown.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Penalty {
    pub alignment: f32,
    pub distance: f32,
}

impl Penalty {
    pub fn total(&self) -> f32 {
        self.alignment + self.distance
    }
}

/// One arrow of the debug vector field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSample {
    pub position: Vec3,
    pub direction: Vec3,
}

/// Reference cost function: alignment with and distance from guiding curves.
#[derive(Clone, Debug)]
pub struct GuidingVectors {
    curves: Arc<[GuidingCurve]>,
    positions: FxHashMap<NodeId, Vec3>,
}

impl GuidingVectors {
    pub fn new(curves: Vec<GuidingCurve>) -> Self {
        Self {
            curves: curves.into(),
            positions: FxHashMap::default(),
        }
    }

    pub fn curves(&self) -> &[GuidingCurve] {
        &self.curves
    }

    /// Number of node positions memoized in this session.
    pub fn cached_positions(&self) -> usize {
        self.positions.len()
    }

    fn position(&mut self, scene: &Scene, id: NodeId) -> Vec3 {
        *self
            .positions
            .entry(id)
            .or_insert_with(|| scene.global_position(id))
    }

    /// The curve nearest to `p`, and where on it.
    pub fn closest(&self, p: Vec3) -> Option<(&GuidingCurve, Projection)> {
        self.curves
            .iter()
            .map(|c| (c, c.shape.project(p)))
            .min_by(|(_, a), (_, b)| a.distance.total_cmp(&b.distance))
    }

    /// Cost of `node`'s placement relative to its parent. `None` for
    /// parentless nodes or when no curves are configured.
    pub fn node_penalty(&mut self, scene: &Scene, node: NodeId) -> Option<Penalty> {
        let parent = scene.parent(node)?;
        let here = self.position(scene, node);
        let from = self.position(scene, parent);
        let direction = (here - from).normalize_or_zero();

        let (curve, projection) = self.closest(from)?;
        let tangent = curve.shape.derivative(projection.t).normalize_or_zero();
        Some(Penalty {
            alignment: curve.alignment_cost(tangent, direction),
            distance: curve.distance_cost(projection.distance),
        })
    }

    /// Sampled guiding directions on a `steps`^3 grid spanning
    /// `center ± half_extent`.
    pub fn vector_field(&self, center: Vec3, half_extent: f32, steps: usize) -> Vec<FieldSample> {
        let steps = steps.max(1);
        let coord = |i: usize| {
            if steps == 1 {
                0.0
            } else {
                -half_extent + 2.0 * half_extent * i as f32 / (steps - 1) as f32
            }
        };

        let mut out = Vec::with_capacity(steps * steps * steps);
        for x in 0..steps {
            for y in 0..steps {
                for z in 0..steps {
                    let position = center + Vec3::new(coord(x), coord(y), coord(z));
                    if let Some((curve, projection)) = self.closest(position) {
                        out.push(FieldSample {
                            position,
                            direction: curve.shape.derivative(projection.t).normalize_or_zero(),
                        });
                    }
                }
            }
        }
        out
    }

    /// `samples + 1` points along each curve.
    pub fn curve_polylines(&self, samples: usize) -> Vec<Vec<Vec3>> {
        self.curves.iter().map(|c| c.shape.lut(samples)).collect()
    }
}

impl CostFunction for GuidingVectors {
    fn get_cost(&mut self, instance: &GeneratorInstance, added: &[NodeId]) -> Cost {
        let scene = &instance.scene;
        let mut seen = FxHashSet::default();
        let mut stack: Vec<NodeId> = added.iter().rev().copied().collect();
        let mut step = 0.0f64;

        while let Some(id) = stack.pop() {
            if !scene.is_structural(id) || !seen.insert(id) {
                continue;
            }
            if let Some(p) = self.node_penalty(scene, id) {
                step += f64::from(p.total());
            }
            stack.extend(scene.children(id).iter().rev().copied());
        }

        tracing::trace!(nodes = seen.len(), step, "scored expansion");
        Cost::new(instance.cost.real_cost + step, 0.0)
    }

    fn fresh_session(&self) -> Self {
        Self {
            curves: Arc::clone(&self.curves),
            positions: FxHashMap::default(),
        }
    }
}
