//! HTTP/JSON wire shapes (spec §6).
//!
//! `vitals_core::Metric`'s internally-tagged `#[serde(flatten)]` encoding
//! already *is* the spec's JSON metric object
//! (`{"id":..., "type":"gauge"|"counter", "value":..}`/`{..,"delta":..}`),
//! so this module doesn't redeclare it — it only adds the list alias the
//! batch endpoints pass around and the plain-text value rendering the
//! single-metric endpoints use.

use vitals_core::metric::{Metric, MetricKind};

/// `POST /updates` body / `GetAllMetrics` payload: a JSON array of
/// [`Metric`].
pub type MetricBatch = Vec<Metric>;

/// Render a metric's value the way the plain-text endpoints do
/// (`GET /value/{kind}/{name}`, `GET /`): no quoting, no trailing zeros
/// beyond what `f64`'s `Display` already trims.
pub fn render_value(kind: &MetricKind) -> String {
    match kind {
        MetricKind::Gauge { value } => format!("{value}"),
        MetricKind::Counter { delta } => format!("{delta}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_json_shape_matches_spec() {
        let metric = Metric::gauge("Alloc", 123.456).unwrap();
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["id"], "Alloc");
        assert_eq!(json["type"], "gauge");
        assert_eq!(json["value"], 123.456);
        assert!(json.get("delta").is_none());
    }

    #[test]
    fn render_value_matches_plain_text_endpoints() {
        assert_eq!(render_value(&MetricKind::Gauge { value: 123.456 }), "123.456");
        assert_eq!(render_value(&MetricKind::Counter { delta: 20 }), "20");
    }
}
