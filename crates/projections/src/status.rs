//! Observable state of the aggregation worker.

use common::AggregateSnapshot;
use serde::Serialize;

/// Counters and last outcome published by the worker after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStatus {
    /// Requests accepted into the queue.
    pub runs_requested: u64,
    /// Requests folded into a run that was already pending.
    pub requests_coalesced: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub last_snapshot: Option<AggregateSnapshot>,
    pub last_error: Option<String>,
}

impl AggregationStatus {
    /// Number of runs that have finished, successfully or not.
    pub fn runs_finished(&self) -> u64 {
        self.runs_succeeded + self.runs_failed
    }

    /// True when every accepted request has been run.
    pub fn is_idle(&self) -> bool {
        self.runs_finished() == self.runs_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_idle() {
        let status = AggregationStatus::default();
        assert!(status.is_idle());
        assert_eq!(status.runs_finished(), 0);
    }

    #[test]
    fn pending_request_is_not_idle() {
        let status = AggregationStatus {
            runs_requested: 2,
            runs_succeeded: 1,
            ..Default::default()
        };
        assert!(!status.is_idle());
    }

    #[test]
    fn failed_runs_count_as_finished() {
        let status = AggregationStatus {
            runs_requested: 3,
            runs_succeeded: 1,
            runs_failed: 2,
            last_error: Some("statement failed".to_string()),
            ..Default::default()
        };
        assert!(status.is_idle());
        assert_eq!(status.runs_finished(), 3);
    }
}
