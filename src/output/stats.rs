//! Statistics from the pipeline database
//!
//! This module extracts and displays what past runs have stored.

use crate::storage::{RunRecord, Storage};
use crate::SeedlineError;

/// Number of recent runs shown by `--stats`
const RECENT_RUNS: usize = 10;

/// Storage statistics summary
#[derive(Debug, Clone)]
pub struct PipelineStatistics {
    /// Stored items
    pub scraped_items: u64,

    /// URLs with revalidation state
    pub fetch_meta: u64,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<PipelineStatistics, SeedlineError> {
    Ok(PipelineStatistics {
        scraped_items: storage.count_scraped_items()?,
        fetch_meta: storage.count_fetch_meta()?,
        recent_runs: storage.get_recent_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &PipelineStatistics) {
    println!("=== Pipeline Statistics ===\n");

    println!("Overview:");
    println!("  Stored items: {}", stats.scraped_items);
    println!("  URLs with fetch metadata: {}", stats.fetch_meta);
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} [{}] urls={} items={} bytes={} duration={}ms",
            run.id,
            run.started_at,
            run.status.to_db_string(),
            run.totals.urls_processed,
            run.totals.total_items,
            run.totals.total_bytes,
            run.totals.duration_ms
        );
    }
    println!();

    let completed = stats
        .recent_runs
        .iter()
        .filter(|r| r.status == crate::storage::RunStatus::Completed)
        .count();
    println!(
        "Completed: {}/{} of the last {} runs",
        completed,
        stats.recent_runs.len(),
        RECENT_RUNS
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, RunTotals, SqliteStorage};

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_fetch_meta("https://example.com/a", None, None).unwrap();
        let run_id = storage.create_run("hash").unwrap();
        storage
            .finish_run(run_id, RunStatus::Completed, &RunTotals::default())
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.scraped_items, 0);
        assert_eq!(stats.fetch_meta, 1);
        assert_eq!(stats.recent_runs.len(), 1);
        assert_eq!(stats.recent_runs[0].status, RunStatus::Completed);
    }
}
