// Cost-guided candidate selection.
//
// `select_best()` is the baseline search strategy around the cost protocol:
// it forks one RNG stream per candidate (in order, from the caller's RNG),
// expands each candidate from its own clone of the base instance, scores the
// new nodes with a fresh cost session, and keeps the lowest total cost. Ties go
// to the lowest candidate index.
//
// Candidates share nothing mutable (scene clone, RNG stream, and cost session
// are per candidate), so they run in parallel on rayon with no locking, and
// the result is identical to a sequential run with the same seed.
//
// `grow_guided()` chains selections into rounds: round 0 expands the start
// rule at the root, and each later round expands the continuation rule at
// every open tip (a structural node with no structural children) created in
// the round before.

use arbor_prng::ArmatureRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cost::{Cost, CostFunction, GeneratorInstance};
use crate::error::{ArmatureError, ArmatureResult};
use crate::grammar::{GenerateOptions, GenerationReport, Grammar};
use crate::scene::{NodeId, Scene};

/// One scored expansion.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub index: usize,
    pub instance: GeneratorInstance,
    pub report: GenerationReport,
}

/// Expand `candidates` alternatives of `options` from `base` and return the
/// cheapest.
#[tracing::instrument(skip_all, fields(start = %options.start, candidates = candidates))]
pub fn select_best<C>(
    base: &GeneratorInstance,
    grammar: &Grammar,
    options: &GenerateOptions,
    cost_fn: &C,
    candidates: usize,
    rng: &mut ArmatureRng,
) -> ArmatureResult<Candidate>
where
    C: CostFunction + Send + Sync,
{
    if candidates == 0 {
        return Err(ArmatureError::config("candidate count must be at least 1"));
    }
    let streams: Vec<ArmatureRng> = (0..candidates).map(|_| rng.fork()).collect();

    let scored: Vec<ArmatureResult<Candidate>> = streams
        .into_par_iter()
        .enumerate()
        .map(|(index, mut stream)| -> ArmatureResult<Candidate> {
            let mut instance = base.clone();
            let report = grammar.generate(&mut instance.scene, &mut stream, options)?;
            let mut session = cost_fn.fresh_session();
            instance.cost = session.get_cost(&instance, &report.created);
            Ok(Candidate {
                index,
                instance,
                report,
            })
        })
        .collect();

    let mut best: Option<Candidate> = None;
    for candidate in scored {
        let candidate = candidate?;
        let better = match &best {
            None => true,
            Some(b) => candidate.instance.cost.total() < b.instance.cost.total(),
        };
        if better {
            best = Some(candidate);
        }
    }
    let best = best.ok_or_else(|| ArmatureError::config("no candidate produced"))?;
    tracing::debug!(
        chosen = best.index,
        cost = best.instance.cost.total(),
        created = best.report.created.len(),
        "candidate selected"
    );
    Ok(best)
}

/// Parameters for `grow_guided`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthPlan {
    /// Rule expanded at the root in round 0.
    pub start: String,
    /// Rule expanded at each open tip in later rounds.
    pub continue_with: String,
    /// Name of the point on structural nodes where growth continues.
    pub tip_point: String,
    /// Detail depth per expansion.
    pub depth: u32,
    pub rounds: u32,
    pub candidates: usize,
    /// Most tips expanded per round; extra tips stay as they are.
    pub max_tips: usize,
}

/// Per-round summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub expansions: usize,
    pub nodes_created: usize,
    pub cost: Cost,
}

/// Result of `grow_guided`.
#[derive(Clone, Debug)]
pub struct GuidedGrowth {
    pub instance: GeneratorInstance,
    pub rounds: Vec<RoundSummary>,
}

/// Structural nodes in `created` that carry `tip_point` and have no
/// structural children yet.
fn open_tips(scene: &Scene, created: &[NodeId], tip_point: &str) -> Vec<NodeId> {
    created
        .iter()
        .copied()
        .filter(|&n| scene.is_structural(n))
        .filter(|&n| scene.point(n, tip_point).is_ok())
        .filter(|&n| !scene.children(n).iter().any(|&c| scene.is_structural(c)))
        .collect()
}

/// Grow a scene over several rounds of cost-guided selection.
#[tracing::instrument(skip_all, fields(rounds = plan.rounds))]
pub fn grow_guided<C>(
    grammar: &Grammar,
    plan: &GrowthPlan,
    cost_fn: &C,
    rng: &mut ArmatureRng,
) -> ArmatureResult<GuidedGrowth>
where
    C: CostFunction + Send + Sync,
{
    let mut instance = GeneratorInstance::new(Scene::new());
    let mut frontier: Vec<Option<NodeId>> = vec![None];
    let mut rounds = Vec::new();

    for round in 0..plan.rounds {
        if frontier.is_empty() {
            break;
        }
        let rule = if round == 0 { &plan.start } else { &plan.continue_with };
        let mut created = Vec::new();
        let mut expansions = 0;

        for tip in frontier.iter().copied() {
            let mut options = GenerateOptions::new(rule.clone(), plan.depth);
            if let Some(node) = tip {
                options = options.at(instance.scene.point(node, &plan.tip_point)?);
            }
            let best = select_best(&instance, grammar, &options, cost_fn, plan.candidates, rng)?;
            created.extend_from_slice(&best.report.created);
            instance = best.instance;
            expansions += 1;
        }

        rounds.push(RoundSummary {
            round,
            expansions,
            nodes_created: created.len(),
            cost: instance.cost,
        });

        frontier = open_tips(&instance.scene, &created, &plan.tip_point)
            .into_iter()
            .take(plan.max_tips)
            .map(Some)
            .collect();
    }

    Ok(GuidedGrowth { instance, rounds })
}
