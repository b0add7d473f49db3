// arbor_armature — procedural armature generation.
//
// This crate grows 3-D armatures (tree-like jointed structures such as plant
// skeletons): a stochastic grammar of production rules expands into a scene
// graph of rigid transforms, optionally steered by a cost function that scores
// each candidate expansion against guiding curves.
//
// Module overview:
// - `transform.rs`: Transformation (position, rotation, scale) and its matrix.
// - `scene.rs`:     Arena scene graph: nodes, named points, stick_to, and the
//                   hold/grab/point_at constraint operations.
// - `drawables.rs`: Read-only traversal to world-space geometry and bone instances.
// - `grammar.rs`:   Plain, weighted, and maybe rules; depth-bounded expansion.
// - `curve.rs`:     Parametric guiding curves (line, cubic Bezier) and projection.
// - `cost.rs`:      Cost protocol and the GuidingVectors cost function.
// - `search.rs`:    Parallel best-of-N candidate selection and guided growth rounds.
// - `plant.rs`:     PlantProfile presets and the ready-made plant grammar.
// - `config.rs`:    GrowthConfig, loaded from JSON.
// - `error.rs`:     ArmatureError and ArmatureResult.
// - `prng`:         Re-exported from `arbor_prng`, xoshiro256++ with SplitMix64 seeding.
//
// **Determinism.** All randomness comes from an explicitly passed, seeded
// `ArmatureRng`. Named points and rules live in `BTreeMap`s, and parallel
// candidates each get a stream forked in a fixed order, so the same seed and
// config always grow the same armature regardless of thread count.

pub mod config;
pub mod cost;
pub mod curve;
pub mod drawables;
pub mod error;
pub mod grammar;
pub mod plant;
pub use arbor_prng as prng;
pub mod scene;
pub mod search;
pub mod transform;
