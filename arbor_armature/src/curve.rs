// Parametric guiding curves.
//
// The cost function only needs three things from a curve: its derivative at a
// parameter, the nearest point to a query position (parameter + distance),
// and a polyline of samples for debug drawing. `ParametricCurve` captures
// exactly that. `CurveShape` is the serde-tagged set of concrete curves a
// config file can name; every shape is parameterized over t in [0, 1] and
// projection clamps to that range.
//
// Bezier projection follows the usual two-pass approach: find the closest
// sample on a coarse lookup table, then scan a fine step across the two
// neighbouring intervals.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Samples in the coarse projection table.
const PROJECTION_STEPS: usize = 100;
/// Fine scan step, as a fraction of one coarse interval.
const REFINE_FRACTION: f32 = 0.1;

/// Closest point on a curve to some query position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub t: f32,
    pub point: Vec3,
    pub distance: f32,
}

pub trait ParametricCurve {
    fn point(&self, t: f32) -> Vec3;

    fn derivative(&self, t: f32) -> Vec3;

    /// Nearest point on the curve to `p`.
    fn project(&self, p: Vec3) -> Projection;

    /// `steps + 1` evenly spaced samples from t = 0 to t = 1.
    fn lut(&self, steps: usize) -> Vec<Vec3> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.point(i as f32 / steps as f32))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveShape {
    /// Straight segment from `start` to `end`.
    Line { start: Vec3, end: Vec3 },
    /// Cubic Bezier through control points `points[0..4]`.
    CubicBezier { points: [Vec3; 4] },
}

impl ParametricCurve for CurveShape {
    fn point(&self, t: f32) -> Vec3 {
        match *self {
            CurveShape::Line { start, end } => start.lerp(end, t),
            CurveShape::CubicBezier { points: [p0, p1, p2, p3] } => {
                let mt = 1.0 - t;
                p0 * (mt * mt * mt)
                    + p1 * (3.0 * mt * mt * t)
                    + p2 * (3.0 * mt * t * t)
                    + p3 * (t * t * t)
            }
        }
    }

    fn derivative(&self, t: f32) -> Vec3 {
        match *self {
            CurveShape::Line { start, end } => end - start,
            CurveShape::CubicBezier { points: [p0, p1, p2, p3] } => {
                let mt = 1.0 - t;
                (p1 - p0) * (3.0 * mt * mt) + (p2 - p1) * (6.0 * mt * t) + (p3 - p2) * (3.0 * t * t)
            }
        }
    }

    fn project(&self, p: Vec3) -> Projection {
        match *self {
            CurveShape::Line { start, end } => {
                let d = end - start;
                let len_sq = d.length_squared();
                let t = if len_sq > 0.0 {
                    ((p - start).dot(d) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let point = start + d * t;
                Projection {
                    t,
                    point,
                    distance: p.distance(point),
                }
            }
            CurveShape::CubicBezier { .. } => self.project_sampled(p),
        }
    }
}

impl CurveShape {
    fn project_sampled(&self, p: Vec3) -> Projection {
        let n = PROJECTION_STEPS;
        let closest = |t: f32| {
            let point = self.point(t);
            Projection {
                t,
                point,
                distance: p.distance(point),
            }
        };

        let mut best = closest(0.0);
        let mut best_index = 0;
        for i in 1..=n {
            let candidate = closest(i as f32 / n as f32);
            if candidate.distance < best.distance {
                best = candidate;
                best_index = i;
            }
        }

        let lo = best_index.saturating_sub(1) as f32 / n as f32;
        let hi = (best_index + 1).min(n) as f32 / n as f32;
        let step = REFINE_FRACTION / n as f32;
        let mut t = lo;
        while t <= hi {
            let candidate = closest(t);
            if candidate.distance < best.distance {
                best = candidate;
            }
            t += step;
        }
        best
    }
}
