//! Generated `Metrics` gRPC service (spec §6) plus conversions between
//! the generated `Metric` message and `vitals_core::Metric` — the single
//! point where the two representations meet, so the server/agent gRPC
//! code never hand-rolls field mapping.

#![allow(clippy::all)]

tonic::include_proto!("vitals.metrics.v1");

use vitals_core::error::{Error, Result};
use vitals_core::metric::{Metric as CoreMetric, MetricKind};

/// Canonical wire name for a gauge's `mtype` field.
pub const GAUGE: &str = "gauge";
/// Canonical wire name for a counter's `mtype` field.
pub const COUNTER: &str = "counter";

impl TryFrom<Metric> for CoreMetric {
    type Error = Error;

    fn try_from(wire: Metric) -> Result<Self> {
        let kind = match wire.mtype.as_str() {
            GAUGE => MetricKind::Gauge {
                value: wire
                    .value
                    .ok_or_else(|| Error::MalformedInput("gauge metric missing value".into()))?,
            },
            COUNTER => MetricKind::Counter {
                delta: wire
                    .delta
                    .ok_or_else(|| Error::MalformedInput("counter metric missing delta".into()))?,
            },
            other => return Err(Error::MalformedInput(format!("unknown metric type: {other}"))),
        };
        Ok(CoreMetric { id: wire.id, kind })
    }
}

impl From<&CoreMetric> for Metric {
    fn from(metric: &CoreMetric) -> Self {
        match metric.kind {
            MetricKind::Gauge { value } => Metric {
                id: metric.id.clone(),
                mtype: GAUGE.to_string(),
                value: Some(value),
                delta: None,
            },
            MetricKind::Counter { delta } => Metric {
                id: metric.id.clone(),
                mtype: COUNTER.to_string(),
                value: None,
                delta: Some(delta),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_wire_roundtrip() {
        let core = CoreMetric::gauge("Alloc", 1.5).unwrap();
        let wire: Metric = (&core).into();
        let back: CoreMetric = wire.try_into().unwrap();
        assert_eq!(core, back);
    }

    #[test]
    fn counter_wire_roundtrip() {
        let core = CoreMetric::counter("PollCount", 7).unwrap();
        let wire: Metric = (&core).into();
        let back: CoreMetric = wire.try_into().unwrap();
        assert_eq!(core, back);
    }

    #[test]
    fn unknown_mtype_is_malformed_input() {
        let wire = Metric {
            id: "x".into(),
            mtype: "histogram".into(),
            value: None,
            delta: None,
        };
        let result: Result<CoreMetric> = wire.try_into();
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }
}
