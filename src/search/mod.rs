//! Hyperparameter search
//!
//! Cross-validated grid search over a [`ParameterGrid`](crate::training::ParameterGrid),
//! repeated on a grid narrowed around the winner until the rounded AUC stops improving.

mod engine;
mod grid;
pub mod refine;

pub use engine::{round2, SearchConfig, SearchEngine, SearchOutcome, SearchState, StopReason, MAX_ACCEPTED_STATES};
pub use grid::{CandidateScore, GridSearch, GridSearchResult};
pub use refine::{generate_interval, modify_grid_params, next_number, previous_number, refine_values};
