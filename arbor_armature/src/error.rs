// Crate-wide error type.
//
// Every failure in this crate is a precondition or configuration bug in the
// caller (an unknown rule name, a `point_at` without a `grab`, a malformed
// config file). None of them are retried or recovered locally: they abort the
// current construction or generation step and bubble up with `?`.
//
// `ErrorKind` groups the variants into the coarse classes callers match on.

use crate::scene::NodeId;

pub type ArmatureResult<T> = Result<T, ArmatureError>;

/// Coarse classification of an `ArmatureError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A named point or grammar rule does not exist.
    NotFound,
    /// An operation was called in a state that forbids it.
    PreconditionViolation,
    /// A global transform was singular when converting between frames.
    NonInvertibleTransform,
    /// Configuration could not be parsed or failed validation.
    Configuration,
}

#[derive(thiserror::Error, Debug)]
pub enum ArmatureError {
    #[error("point '{name}' not found on {node}")]
    PointNotFound { node: NodeId, name: String },

    #[error("unknown rule '{0}'")]
    UnknownRule(String),

    #[error("point_at on {0} requires a prior grab")]
    GrabRequired(NodeId),

    #[error("cannot attach a point to another point on the same node ({0})")]
    SelfAttachment(NodeId),

    #[error("{0} already has a parent")]
    AlreadyAttached(NodeId),

    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },

    #[error("point '{name}' is already registered on {node}")]
    DuplicatePoint { node: NodeId, name: String },

    #[error("rule '{0}' is already registered")]
    DuplicateRule(String),

    #[error("rule '{0}' is registered with a different kind")]
    RuleKindConflict(String),

    #[error("weight for rule '{rule}' must be finite and positive, got {weight}")]
    InvalidWeight { rule: String, weight: f64 },

    #[error("probability for rule '{rule}' must be within [0, 1], got {probability}")]
    InvalidProbability { rule: String, probability: f64 },

    #[error("global transform of {0} is not invertible")]
    NonInvertibleTransform(NodeId),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ArmatureError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PointNotFound { .. } | Self::UnknownRule(_) => ErrorKind::NotFound,
            Self::GrabRequired(_)
            | Self::SelfAttachment(_)
            | Self::AlreadyAttached(_)
            | Self::CycleDetected { .. }
            | Self::DuplicatePoint { .. }
            | Self::DuplicateRule(_)
            | Self::RuleKindConflict(_)
            | Self::InvalidWeight { .. }
            | Self::InvalidProbability { .. } => ErrorKind::PreconditionViolation,
            Self::NonInvertibleTransform(_) => ErrorKind::NonInvertibleTransform,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

impl From<serde_json::Error> for ArmatureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
