// Stochastic production-rule grammar that grows scene graphs.
//
// A `Grammar` maps rule names to one of three rule kinds:
//   - `Plain`: a single deterministic body;
//   - `Weighted`: alternative bodies with positive relative weights, one of
//     which is drawn per application with probability proportional to weight;
//   - `Maybe`: a single body applied with a fixed probability, otherwise a
//     no-op.
//
// `generate()` seeds a FIFO queue with the start rule at an attachment point
// (the scene root's origin by default) and drains it. Each body receives an
// `Expansion` handle through which it edits the scene, draws randomness, and
// schedules further rule applications ("details") with `add_detail`. The start
// rule runs at depth 0; details scheduled by a rule at depth d run at d + 1,
// and any detail that would exceed the configured depth is dropped at
// scheduling time. That bound is the only thing stopping self-referential
// rules like `branch -> branch` from recursing forever.
//
// All randomness comes from the `ArmatureRng` passed to `generate()`, so the
// same grammar, seed, and options always grow the same scene. Rule bodies are
// `Send + Sync` so one grammar can drive independent candidates on several
// threads (see `search.rs`).
//
// See also: `scene.rs` for the node/point API rule bodies call into,
// `plant.rs` for a ready-made plant grammar.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use arbor_prng::ArmatureRng;

use crate::error::{ArmatureError, ArmatureResult};
use crate::scene::{NodeId, Point, Scene};

/// A rule body: builds structure at the given point.
pub type RuleBody = Arc<dyn Fn(&mut Expansion<'_>, Point) -> ArmatureResult<()> + Send + Sync>;

/// One alternative of a weighted rule.
#[derive(Clone)]
pub struct WeightedBody {
    pub weight: f64,
    pub body: RuleBody,
}

#[derive(Clone)]
pub enum Rule {
    Plain(RuleBody),
    Weighted(Vec<WeightedBody>),
    Maybe { probability: f64, body: RuleBody },
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Plain(_) => f.write_str("Plain"),
            Rule::Weighted(alts) => {
                let weights: Vec<f64> = alts.iter().map(|a| a.weight).collect();
                f.debug_tuple("Weighted").field(&weights).finish()
            }
            Rule::Maybe { probability, .. } => {
                f.debug_struct("Maybe").field("probability", probability).finish()
            }
        }
    }
}

/// Where and how deep to expand.
#[derive(Clone, Debug)]
pub struct GenerateOptions {
    pub start: String,
    pub depth: u32,
    /// Attachment point for the start rule. Defaults to the root's origin.
    pub at: Option<Point>,
}

impl GenerateOptions {
    pub fn new(start: impl Into<String>, depth: u32) -> Self {
        Self {
            start: start.into(),
            depth,
            at: None,
        }
    }

    pub fn at(mut self, point: Point) -> Self {
        self.at = Some(point);
        self
    }
}

/// Summary of one `generate()` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationReport {
    /// Every node created during this call, in creation order.
    pub created: Vec<NodeId>,
    /// Rule bodies actually run.
    pub applied: usize,
    /// `Maybe` rules whose draw came up empty.
    pub skipped: usize,
    /// Details discarded for exceeding the depth bound.
    pub dropped: usize,
}

struct Detail {
    rule: String,
    at: Point,
    depth: u32,
}

/// Handle passed to rule bodies during expansion.
pub struct Expansion<'a> {
    grammar: &'a Grammar,
    scene: &'a mut Scene,
    rng: &'a mut ArmatureRng,
    depth: u32,
    max_depth: u32,
    pending: Vec<Detail>,
    dropped: usize,
}

impl Expansion<'_> {
    pub fn scene(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    pub fn rng(&mut self) -> &mut ArmatureRng {
        &mut *self.rng
    }

    /// Depth of the rule currently running (the start rule is 0).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Schedule `component` to run at `at` one level deeper.
    ///
    /// Fails with `UnknownRule` if `component` is not registered, even when
    /// the detail would be dropped by the depth bound.
    pub fn add_detail(&mut self, component: &str, at: Point) -> ArmatureResult<()> {
        if !self.grammar.contains(component) {
            return Err(ArmatureError::UnknownRule(component.to_string()));
        }
        let depth = self.depth + 1;
        if depth > self.max_depth {
            tracing::trace!(component, depth, "detail dropped past depth bound");
            self.dropped += 1;
            return Ok(());
        }
        self.pending.push(Detail {
            rule: component.to_string(),
            at,
            depth,
        });
        Ok(())
    }
}

/// Registry of named production rules.
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    rules: BTreeMap<String, Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Register a plain rule.
    pub fn define<F>(&mut self, name: impl Into<String>, body: F) -> ArmatureResult<()>
    where
        F: Fn(&mut Expansion<'_>, Point) -> ArmatureResult<()> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(ArmatureError::DuplicateRule(name));
        }
        self.rules.insert(name, Rule::Plain(Arc::new(body)));
        Ok(())
    }

    /// Add one alternative to a weighted rule, creating it if needed.
    pub fn define_weighted<F>(
        &mut self,
        name: impl Into<String>,
        weight: f64,
        body: F,
    ) -> ArmatureResult<()>
    where
        F: Fn(&mut Expansion<'_>, Point) -> ArmatureResult<()> + Send + Sync + 'static,
    {
        let name = name.into();
        if !(weight.is_finite() && weight > 0.0) {
            return Err(ArmatureError::InvalidWeight { rule: name, weight });
        }
        let alternative = WeightedBody {
            weight,
            body: Arc::new(body),
        };
        match self.rules.get_mut(&name) {
            Some(Rule::Weighted(alts)) => alts.push(alternative),
            Some(_) => return Err(ArmatureError::RuleKindConflict(name)),
            None => {
                self.rules.insert(name, Rule::Weighted(vec![alternative]));
            }
        }
        Ok(())
    }

    /// Register a rule applied with `probability`, otherwise skipped.
    pub fn define_maybe<F>(
        &mut self,
        name: impl Into<String>,
        probability: f64,
        body: F,
    ) -> ArmatureResult<()>
    where
        F: Fn(&mut Expansion<'_>, Point) -> ArmatureResult<()> + Send + Sync + 'static,
    {
        let name = name.into();
        if !(0.0..=1.0).contains(&probability) {
            return Err(ArmatureError::InvalidProbability {
                rule: name,
                probability,
            });
        }
        if self.contains(&name) {
            return Err(ArmatureError::DuplicateRule(name));
        }
        self.rules.insert(
            name,
            Rule::Maybe {
                probability,
                body: Arc::new(body),
            },
        );
        Ok(())
    }

    /// Pick the body to run for one application of `rule`, if any.
    fn select<'r>(rule: &'r Rule, rng: &mut ArmatureRng) -> Option<&'r RuleBody> {
        match rule {
            Rule::Plain(body) => Some(body),
            Rule::Weighted(alts) => {
                let weights: Vec<f64> = alts.iter().map(|a| a.weight).collect();
                let idx = rng.weighted_index(&weights)?;
                tracing::trace!(idx, "weighted alternative drawn");
                Some(&alts[idx].body)
            }
            Rule::Maybe { probability, body } => rng.random_bool(*probability).then_some(body),
        }
    }

    /// Expand `options.start` into `scene`, breadth first, up to
    /// `options.depth` levels of details.
    #[tracing::instrument(skip(self, scene, rng), fields(start = %options.start, depth = options.depth))]
    pub fn generate(
        &self,
        scene: &mut Scene,
        rng: &mut ArmatureRng,
        options: &GenerateOptions,
    ) -> ArmatureResult<GenerationReport> {
        if !self.contains(&options.start) {
            return Err(ArmatureError::UnknownRule(options.start.clone()));
        }

        let mark = scene.node_count();
        let at = options.at.unwrap_or_else(|| scene.origin(scene.root()));
        let mut queue = VecDeque::from([Detail {
            rule: options.start.clone(),
            at,
            depth: 0,
        }]);
        let mut report = GenerationReport::default();

        while let Some(detail) = queue.pop_front() {
            let rule = self
                .rules
                .get(&detail.rule)
                .ok_or_else(|| ArmatureError::UnknownRule(detail.rule.clone()))?;
            let Some(body) = Self::select(rule, rng) else {
                report.skipped += 1;
                continue;
            };

            let mut expansion = Expansion {
                grammar: self,
                scene: &mut *scene,
                rng: &mut *rng,
                depth: detail.depth,
                max_depth: options.depth,
                pending: Vec::new(),
                dropped: 0,
            };
            body(&mut expansion, detail.at)?;
            let Expansion { pending, dropped, .. } = expansion;

            report.applied += 1;
            report.dropped += dropped;
            queue.extend(pending);
        }

        report.created = scene.nodes_since(mark).collect();
        tracing::debug!(
            created = report.created.len(),
            applied = report.applied,
            skipped = report.skipped,
            dropped = report.dropped,
            "expansion finished"
        );
        Ok(report)
    }
}
