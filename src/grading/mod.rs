//! Compilation, verification and scoring of staged submissions

pub mod lateness;
pub mod orchestrator;
pub mod score;

pub use orchestrator::{Grader, GradingPlan, VerifierPlan};
