//! Duplicate-collapse for batch upserts.
//!
//! The underlying SQL upsert cannot touch the same primary key twice in one
//! statement, so every batch must be folded *before* it reaches storage:
//! gauges keep their last occurrence, counters sum all occurrences.
//! `vitals-collector` calls [`fold_duplicates`] once, at the single
//! boundary both the HTTP and gRPC ingress paths pass through, so the rule
//! can't drift between the two backends or the two transports.

use std::collections::HashMap;

use crate::metric::{Metric, MetricKind};

/// A batch folded into one entry per id, ready for an atomic multi-row
/// upsert.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FoldedBatch {
    /// Gauge id -> value to write (last occurrence in iteration order).
    pub gauges: HashMap<String, f64>,
    /// Counter id -> summed delta to add.
    pub counters: HashMap<String, i64>,
}

/// Collapse duplicate ids within one batch per the spec's duplicate rule:
/// gauges keep the *last* occurrence, counters *sum* all occurrences.
///
/// Input order matters only for gauges (last write wins); counter order is
/// irrelevant since addition is commutative.
pub fn fold_duplicates<'a>(metrics: impl IntoIterator<Item = &'a Metric>) -> FoldedBatch {
    let mut folded = FoldedBatch::default();
    for metric in metrics {
        match metric.kind {
            MetricKind::Gauge { value } => {
                folded.gauges.insert(metric.id.clone(), value);
            }
            MetricKind::Counter { delta } => {
                *folded.counters.entry(metric.id.clone()).or_insert(0) += delta;
            }
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_keeps_last_counter_sums() {
        let batch = vec![
            Metric::counter("c", 35_154_714).unwrap(),
            Metric::gauge("g", 18032.25).unwrap(),
            Metric::counter("c", 1_872_525_169).unwrap(),
            Metric::gauge("g", 37453.22).unwrap(),
        ];
        let folded = fold_duplicates(&batch);
        assert_eq!(folded.gauges["g"], 37453.22);
        assert_eq!(folded.counters["c"], 1_907_679_883);
    }

    #[test]
    fn empty_batch_folds_to_empty() {
        let folded = fold_duplicates(&[]);
        assert!(folded.gauges.is_empty());
        assert!(folded.counters.is_empty());
    }
}
