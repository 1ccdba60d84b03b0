//! # BoT Core
//!
//! The thought-template buffer behind a Buffer-of-Thoughts navigation agent.
//!
//! - **ProblemDistiller** — observation → [`FeatureSummary`] (pure, deterministic)
//! - **MetaBuffer** — named [`ThoughtTemplate`]s, similarity retrieval, reinforcement, eviction
//! - **BufferManager** — `select` a template for an observation, `consolidate` a finished episode
//!
//! ## Quick Start
//!
//! ```rust
//! use bot_core::prelude::*;
//!
//! let manager = BufferManager::new(BufferConfig::default(), DistillerConfig::default()).unwrap();
//! let obs = GridObservation::new(GridPos::new(1, 1), Direction::East)
//!     .with_cell(GridPos::new(1, 4), CellKind::Goal);
//!
//! let selection = manager.select(&obs).unwrap();
//! assert!(selection.template.is_none()); // empty buffer, nothing to reuse
//! assert_eq!(selection.summary.goal_ahead_right(), Some((3, 0)));
//! ```

pub mod action;
pub mod buffer;
pub mod config;
pub mod distiller;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod similarity;
pub mod snapshot;
pub mod template;
pub mod trace;
pub mod types;
