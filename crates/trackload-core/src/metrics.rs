//! Best-effort metric samples.
//!
//! Workers report the duration of every successful backend operation through a
//! [`MetricsSink`]. Recording is fire-and-forget: a sink never returns an
//! error and must not block, so a broken exporter cannot stall a worker or
//! delay an acknowledgement.

use core::time::Duration;
use std::sync::Arc;

/// A single named measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub unit: &'static str,
    pub value: f64,
}

impl MetricSample {
    /// A duration sample, in milliseconds.
    pub fn duration(name: &'static str, elapsed: Duration) -> Self {
        Self {
            name,
            unit: "ms",
            value: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Destination for [`MetricSample`]s.
pub trait MetricsSink: Send + Sync {
    fn record(&self, sample: MetricSample);
}

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn record(&self, sample: MetricSample) {
        (**self).record(sample);
    }
}

/// Sink used when no metrics profile is selected.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _sample: MetricSample) {}
}
