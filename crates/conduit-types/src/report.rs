//! Run reports: per-element metrics and the aggregate stats surfaced by the
//! CLI and HTTP drivers.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Counters collected for one pipeline stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementMetrics {
    /// Dotted element id.
    pub element_id: String,
    /// Items consumed from upstream.
    pub items_in: u64,
    /// Items emitted downstream.
    pub items_out: u64,
    /// Per-item errors recorded under the continue policy.
    pub errors: u64,
    /// Wall time spent inside the element, in seconds.
    pub duration: f64,
}

impl ElementMetrics {
    /// Create zeroed metrics for an element.
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            ..Self::default()
        }
    }

    /// Items per second, 0 when no time was measured.
    pub fn throughput(&self) -> f64 {
        if self.duration > 0.0 {
            self.items_out as f64 / self.duration
        } else {
            0.0
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Total wall time of the run, in seconds.
    pub duration: f64,
    /// Items that reached the end of the chain.
    pub total_items_processed: u64,
    /// `total_items_processed / duration`, 0 when no time was measured.
    pub throughput: f64,
    /// Per-stage counters in pipeline order.
    pub element_metrics: Vec<ElementMetrics>,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether the run completed without aborting.
    pub success: bool,
    /// Values collected from the final stage.
    pub results: Vec<Value>,
    /// Lines captured from `Console` renderings.
    pub stdout: Vec<String>,
    /// Per-item errors recorded under the continue policy.
    pub stderr: Vec<String>,
    /// Aggregate statistics.
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_handles_zero_duration() {
        let m = ElementMetrics::new("conduit.Identity");
        assert_eq!(m.throughput(), 0.0);

        let m = ElementMetrics {
            items_out: 10,
            duration: 2.0,
            ..ElementMetrics::new("conduit.Identity")
        };
        assert_eq!(m.throughput(), 5.0);
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = RunReport {
            success: true,
            results: vec![serde_json::json!({"a": 1})],
            stdout: vec!["a=1".into()],
            stderr: vec![],
            stats: RunStats {
                duration: 0.5,
                total_items_processed: 1,
                throughput: 2.0,
                element_metrics: vec![ElementMetrics::new("conduit.Input")],
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert!(back.success);
        assert_eq!(back.stats.element_metrics[0].element_id, "conduit.Input");
    }
}
