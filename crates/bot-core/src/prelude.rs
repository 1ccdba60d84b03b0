//! BoT Core Prelude — convenient imports for common usage.
//!
//! ```rust
//! use bot_core::prelude::*;
//! ```

pub use crate::action::Action;
pub use crate::buffer::{MetaBuffer, Retrieval};
pub use crate::config::{BufferConfig, DistillerConfig, SimilarityWeights};
pub use crate::distiller::ProblemDistiller;
pub use crate::error::{BufferError, BufferResult};
pub use crate::manager::{BufferManager, BufferStats, ConsolidationOutcome, Selection};
pub use crate::similarity::similarity;
pub use crate::snapshot::BufferSnapshot;
pub use crate::template::ThoughtTemplate;
pub use crate::trace::{EpisodeTrace, TraceEntry};
pub use crate::types::{
    CellKind, Direction, FeatureSummary, GoalLocation, GridObservation, GridOffset, GridPos,
    NearbyObject, ObservedCell,
};
