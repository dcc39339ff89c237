//! Output module for run reports and statistics
//!
//! This module handles:
//! - The structured report returned after every run
//! - Storage statistics for `--stats`

mod report;
pub mod stats;

pub use report::{RunReport, RunSummary, SeedResult, SeedStatus};
pub use stats::{load_statistics, print_statistics, PipelineStatistics};
