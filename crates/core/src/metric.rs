//! The `Metric` tagged union — the one data shape every layer converts
//! to and from at its boundary instead of re-declaring.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length, in bytes, of a metric id.
pub const MAX_ID_LEN: usize = 64;

/// A single metric reading.
///
/// `Gauge` carries an absolute 64-bit float value (last-writer-wins at the
/// store). `Counter` carries a delta on the wire; the store turns it into
/// an absolute value by summing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric id. Case-sensitive, printable, at most [`MAX_ID_LEN`] bytes.
    pub id: String,
    /// Discriminates gauge vs. counter and carries the value/delta.
    #[serde(flatten)]
    pub kind: MetricKind,
}

/// The gauge/counter discriminant, carrying its payload.
///
/// This mirrors the wire JSON shape from the spec
/// (`{"type":"gauge","value":...}` / `{"type":"counter","delta":...}`)
/// directly: `vitals-wire` maps its `JsonMetric` to/from this type rather
/// than duplicating the enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricKind {
    /// Last-writer-wins absolute value.
    Gauge {
        /// The new absolute value.
        value: f64,
    },
    /// Additive delta applied to the stored absolute value.
    Counter {
        /// The delta to add.
        delta: i64,
    },
}

impl Metric {
    /// Build a validated gauge metric.
    pub fn gauge(id: impl Into<String>, value: f64) -> Result<Self> {
        let id = id.into();
        Self::validate_id(&id)?;
        Ok(Metric {
            id,
            kind: MetricKind::Gauge { value },
        })
    }

    /// Build a validated counter metric.
    pub fn counter(id: impl Into<String>, delta: i64) -> Result<Self> {
        let id = id.into();
        Self::validate_id(&id)?;
        Ok(Metric {
            id,
            kind: MetricKind::Counter { delta },
        })
    }

    /// Validate a metric id: non-empty, printable, at most
    /// [`MAX_ID_LEN`] bytes.
    ///
    /// The domain layer stays permissive (as in the reference
    /// implementation); only the storage boundary enforces this, via
    /// `Store::set_batch`/`set_gauge`/`set_counter`.
    pub fn validate_id(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::MalformedInput("metric id is empty".into()));
        }
        if id.len() > MAX_ID_LEN {
            return Err(Error::MalformedInput(format!(
                "metric id {id:?} exceeds {MAX_ID_LEN} bytes"
            )));
        }
        if !id.chars().all(|c| !c.is_control()) {
            return Err(Error::MalformedInput(format!(
                "metric id {id:?} contains non-printable characters"
            )));
        }
        Ok(())
    }

    /// True if this metric is a gauge.
    pub fn is_gauge(&self) -> bool {
        matches!(self.kind, MetricKind::Gauge { .. })
    }

    /// True if this metric is a counter.
    pub fn is_counter(&self) -> bool {
        matches!(self.kind, MetricKind::Counter { .. })
    }
}
