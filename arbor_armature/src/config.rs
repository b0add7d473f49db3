// Data-driven growth configuration.
//
// Everything a guided growth run needs lives in `GrowthConfig`, loaded from
// JSON: the seed, the detail depth, how many rounds and candidates the search
// runs, the plant profile, and the guiding curves. Every field has a default
// (`#[serde(default)]`), so a config file only needs to name what it changes.
// The same seed and config always grow the same armature.
//
// See also: `plant.rs` for `PlantProfile`, `cost.rs` for `GuidingCurve`,
// `search.rs` for the `GrowthPlan` this config produces.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::cost::GuidingCurve;
use crate::curve::CurveShape;
use crate::error::{ArmatureError, ArmatureResult};
use crate::plant::PlantProfile;
use crate::search::GrowthPlan;

/// Rule expanded at the root in the first round.
pub const START_RULE: &str = "trunk";
/// Rule expanded at every open tip in later rounds.
pub const CONTINUE_RULE: &str = "branch";
/// Point that marks where a segment can keep growing.
pub const TIP_POINT: &str = "tip";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub seed: u64,
    /// Detail depth of each expansion.
    pub depth: u32,
    pub rounds: u32,
    /// Alternatives generated and scored per expansion.
    pub candidates: usize,
    /// Most open tips expanded per round.
    pub max_tips: usize,
    pub plant: PlantProfile,
    pub guides: Vec<GuidingCurve>,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            depth: 3,
            rounds: 3,
            candidates: 8,
            max_tips: 6,
            plant: PlantProfile::sapling(),
            guides: vec![GuidingCurve {
                shape: CurveShape::Line {
                    start: Vec3::ZERO,
                    end: Vec3::new(0.0, 10.0, 0.0),
                },
                distance_multiplier: [0.0, 0.0, 1.0],
                alignment_multiplier: 10.0,
                alignment_offset: 0.0,
            }],
        }
    }
}

impl GrowthConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> ArmatureResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn load(path: &Path) -> ArmatureResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ArmatureError::config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> ArmatureResult<()> {
        if self.candidates == 0 {
            return Err(ArmatureError::config("candidates must be at least 1"));
        }
        for (i, guide) in self.guides.iter().enumerate() {
            let finite = guide.alignment_multiplier.is_finite()
                && guide.distance_multiplier.iter().all(|m| m.is_finite());
            if !finite {
                return Err(ArmatureError::config(format!(
                    "guides[{i}] has a non-finite multiplier"
                )));
            }
            if !(-1.0..=1.0).contains(&guide.alignment_offset) {
                return Err(ArmatureError::config(format!(
                    "guides[{i}].alignment_offset {} is outside [-1, 1]",
                    guide.alignment_offset
                )));
            }
        }
        Ok(())
    }

    /// Search parameters for `grow_guided` over the plant grammar.
    pub fn plan(&self) -> GrowthPlan {
        GrowthPlan {
            start: START_RULE.into(),
            continue_with: CONTINUE_RULE.into(),
            tip_point: TIP_POINT.into(),
            depth: self.depth,
            rounds: self.rounds,
            candidates: self.candidates,
            max_tips: self.max_tips,
        }
    }
}
