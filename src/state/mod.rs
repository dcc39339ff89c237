//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunState`: the phases of a single pipeline run and the allowed
//!   transitions between them

mod run_state;

pub use run_state::{InvalidTransition, RunState};
