// Arbor Armature — `grow` CLI entry point.
//
// Grows one cost-guided plant armature and prints a JSON summary to stdout.
// The pipeline: load config → apply flag overrides → build the plant grammar
// and guiding-vector cost function → guided growth rounds → drawable traversal.
//
// Usage:
//   cargo run -p arbor_armature --bin grow -- [--config PATH] [--seed N]
//     [--depth N] [--candidates N] [--rounds N] [--bones]
//
// Logging goes to stderr and is controlled by RUST_LOG, e.g.
// `RUST_LOG=arbor_armature=debug`.

use std::path::Path;

use arbor_armature::config::GrowthConfig;
use arbor_armature::cost::{Cost, GuidingVectors};
use arbor_armature::error::{ArmatureError, ArmatureResult};
use arbor_armature::plant::plant_grammar;
use arbor_armature::prng::ArmatureRng;
use arbor_armature::search::{RoundSummary, grow_guided};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct GeometrySummary {
    node: usize,
    /// Column-major world matrix.
    world: [f32; 16],
}

#[derive(Serialize)]
struct GrowSummary {
    seed: u64,
    nodes: usize,
    cost: Cost,
    rounds: Vec<RoundSummary>,
    bones: usize,
    geometry: Vec<GeometrySummary>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("grow: {e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> ArmatureResult<()> {
    let mut config = match parse_flag::<String>(args, "--config")? {
        Some(path) => GrowthConfig::load(Path::new(&path))?,
        None => GrowthConfig::default(),
    };
    if let Some(seed) = parse_flag(args, "--seed")? {
        config.seed = seed;
    }
    if let Some(depth) = parse_flag(args, "--depth")? {
        config.depth = depth;
    }
    if let Some(candidates) = parse_flag(args, "--candidates")? {
        config.candidates = candidates;
    }
    if let Some(rounds) = parse_flag(args, "--rounds")? {
        config.rounds = rounds;
    }
    config.validate()?;
    let include_bones = args.iter().any(|a| a == "--bones");

    tracing::info!(
        seed = config.seed,
        depth = config.depth,
        rounds = config.rounds,
        candidates = config.candidates,
        "growing"
    );

    let grammar = plant_grammar(&config.plant)?;
    let cost_fn = GuidingVectors::new(config.guides.clone());
    let mut rng = ArmatureRng::new(config.seed);
    let grown = grow_guided(&grammar, &config.plan(), &cost_fn, &mut rng)?;

    let scene = &grown.instance.scene;
    let drawables = scene.drawables(include_bones);
    let summary = GrowSummary {
        seed: config.seed,
        nodes: scene.node_count(),
        cost: grown.instance.cost,
        rounds: grown.rounds,
        bones: drawables.bones.len(),
        geometry: drawables
            .geometry
            .iter()
            .map(|g| GeometrySummary {
                node: g.node.index(),
                world: g.world.to_cols_array(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Value following `flag`, if the flag is present. A flag with a missing or
/// unparseable value is an error rather than a silent fallback.
fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> ArmatureResult<Option<T>> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    let value = args
        .get(i + 1)
        .ok_or_else(|| ArmatureError::config(format!("{flag} needs a value")))?;
    value
        .parse()
        .map(Some)
        .map_err(|_| ArmatureError::config(format!("{flag}: invalid value '{value}'")))
}
