#![deny(missing_docs)]
//! The Operator Runner: direct evaluation of non-LM formulas, and the LM
//! sampling retry loop with feedback accumulation, grounded on
//! `original_source/simulation_utils.py::run_formula`.

mod assign;
mod error;
mod feedback;
mod format;
mod runner;

pub use assign::{assignment_path, extract_single_quoted_keys, split_assignment};
pub use error::RunnerError;
pub use feedback::{shape_mismatch_message, type_mismatch_message, AttemptCtx};
pub use format::{render_assignment, render_exhaustion};
pub use runner::{Runner, DEFAULT_MAX_ATTEMPTS};
