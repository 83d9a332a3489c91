//! Statistics & health (C9, §4.9): rolling, process-lifetime counters per
//! source, updated under a single lock at the end of each run so the hot
//! path (per-chunk embedding/upsert) stays lock-free, per §5.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use indexmesh_common::{RunReport, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceStats {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub items_processed: u64,
    pub items_stored: u64,
    pub items_errored: u64,
    pub requests_used: u64,
    pub rate_limit_occurrences: u64,
    pub last_successful_run_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct StatsRegistry {
    microblog: Mutex<SourceStats>,
    groupchat: Mutex<SourceStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, source: Source) -> &Mutex<SourceStats> {
        match source {
            Source::Microblog => &self.microblog,
            Source::Groupchat => &self.groupchat,
        }
    }

    pub fn record_run_start(&self, source: Source) {
        self.lock_for(source).lock().unwrap().runs_started += 1;
    }

    /// Folds one finished run's report into the rolling counters. Called
    /// exactly once per run, never per chunk.
    pub fn record_run_end(&self, report: &RunReport) {
        let mut stats = self.lock_for(report.source).lock().unwrap();
        if report.success {
            stats.runs_completed += 1;
            stats.last_successful_run_at = Some(report.finished_at);
        } else {
            stats.runs_failed += 1;
        }
        stats.items_processed += report.processed;
        stats.items_stored += report.stored;
        stats.items_errored += report.errors;
        stats.requests_used += report.requests_used as u64;
        if report.rate_limited {
            stats.rate_limit_occurrences += 1;
        }
    }

    pub fn snapshot(&self, source: Source) -> SourceStats {
        self.lock_for(source).lock().unwrap().clone()
    }

    pub fn reset(&self) {
        *self.microblog.lock().unwrap() = SourceStats::default();
        *self.groupchat.lock().unwrap() = SourceStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn empty_report(source: Source, success: bool) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            source,
            processed: 5,
            embedded: 5,
            stored: 4,
            errors: 1,
            processing_time_ms: 10,
            requests_used: 3,
            rate_limited: false,
            has_more_data: false,
            accounts: Vec::new(),
            success,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn records_accumulate_across_runs() {
        let registry = StatsRegistry::new();
        registry.record_run_start(Source::Microblog);
        registry.record_run_end(&empty_report(Source::Microblog, true));
        registry.record_run_end(&empty_report(Source::Microblog, true));

        let stats = registry.snapshot(Source::Microblog);
        assert_eq!(stats.runs_started, 1);
        assert_eq!(stats.runs_completed, 2);
        assert_eq!(stats.items_stored, 8);
    }

    #[test]
    fn reset_zeroes_all_counters() {
        let registry = StatsRegistry::new();
        registry.record_run_end(&empty_report(Source::Groupchat, true));
        registry.reset();
        let stats = registry.snapshot(Source::Groupchat);
        assert_eq!(stats.runs_completed, 0);
    }

    #[test]
    fn sources_are_tracked_independently() {
        let registry = StatsRegistry::new();
        registry.record_run_end(&empty_report(Source::Microblog, true));
        assert_eq!(registry.snapshot(Source::Groupchat).runs_completed, 0);
    }
}
