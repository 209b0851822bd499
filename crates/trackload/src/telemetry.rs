//! # Telemetry
//!
//! Both binaries log through `tracing`, formatted by `tracing_subscriber::fmt`
//! with a local RFC 3339 timestamp. The level defaults to `info` and can be
//! overridden with `RUST_LOG`.
//!
//! Timing samples from the workers are optional and exported through
//! OpenTelemetry.
//!
//! ## Feature matrix
//!
//! - `metrics`: Enables the OpenTelemetry [`OtelSink`] (one `f64` histogram
//!   per sample name).
//! - `honeycomb`: Enables the Honeycomb OTLP exporter.
//! - `stdout`: Enables the stdout exporter.
//!
//! ## Feature constraints
//!
//! - Exporters require `metrics`.
//! - Both `honeycomb` and `stdout` exporters can be enabled at the same time.
//!
//! ## Runtime selection
//!
//! Samples are only emitted when a `--metrics-profile` is given; the profile
//! name becomes the instrumentation scope of every histogram. Without the
//! `metrics` feature a profile is accepted but ignored with a warning.
//!
//! ```bash
//! cargo run --bin insert-simulator --features metrics,stdout -- \
//!     --host 127.0.0.1 --metrics-profile staging
//! ```

// Disallow using `honeycomb` without `metrics`
#[cfg(all(feature = "honeycomb", not(feature = "metrics")))]
compile_error!("The 'honeycomb' feature requires the 'metrics' feature to be enabled.");

// Disallow using `stdout` without `metrics`
#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires the 'metrics' feature to be enabled.");

use std::sync::Arc;
use trackload_core::{MetricsSink, NoopSink};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Honeycomb-specific imports
#[cfg(feature = "honeycomb")]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};
#[cfg(feature = "honeycomb")]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(feature = "honeycomb")]
use tonic::metadata::MetadataMap;
#[cfg(feature = "honeycomb")]
use tonic::transport::ClientTlsConfig;

// Metrics-specific imports
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::Resource;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::collections::HashMap;
#[cfg(feature = "metrics")]
use trackload_core::MetricSample;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending samples and stops the exporters.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = {
        let provider = init_metrics()?;
        opentelemetry::global::set_meter_provider(provider.clone());
        provider
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .compact(),
        )
        .try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Picks the sink the workers report into.
///
/// `None` disables emission entirely.
pub fn metrics_sink(profile: Option<&str>) -> Arc<dyn MetricsSink> {
    match profile {
        None => Arc::new(NoopSink),
        #[cfg(feature = "metrics")]
        Some(profile) => {
            tracing::info!("Emitting metrics under profile {profile}");
            Arc::new(OtelSink::new(profile))
        }
        #[cfg(not(feature = "metrics"))]
        Some(profile) => {
            tracing::warn!(
                "Metrics profile {profile} ignored: built without the `metrics` feature"
            );
            Arc::new(NoopSink)
        }
    }
}

/// [`MetricsSink`] backed by OpenTelemetry histograms.
///
/// Histograms are created lazily, one per sample name, and cached. Recording
/// only touches the in-process aggregator; exporting happens on the SDK's
/// periodic reader, off the worker's path.
#[cfg(feature = "metrics")]
pub struct OtelSink {
    meter: Meter,
    histograms: parking_lot::Mutex<HashMap<&'static str, Histogram<f64>>>,
}

#[cfg(feature = "metrics")]
impl OtelSink {
    pub fn new(profile: &str) -> Self {
        let scope = InstrumentationScope::builder(profile.to_owned())
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        Self {
            meter: opentelemetry::global::meter_with_scope(scope),
            histograms: parking_lot::Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(feature = "metrics")]
impl MetricsSink for OtelSink {
    fn record(&self, sample: MetricSample) {
        let mut histograms = self.histograms.lock();
        let histogram = histograms.entry(sample.name).or_insert_with(|| {
            self.meter
                .f64_histogram(sample.name)
                .with_unit(sample.unit)
                .with_description("Backend operation duration")
                .build()
        });
        histogram.record(sample.value, &[]);
    }
}

#[cfg(feature = "honeycomb")]
fn get_metadata() -> anyhow::Result<MetadataMap> {
    use anyhow::Context;

    let mut map = MetadataMap::new();
    let api_key = std::env::var("HONEYCOMB_API_KEY").context("missing `HONEYCOMB_API_KEY`")?;
    let dataset = std::env::var("HONEYCOMB_DATASET").context("missing `HONEYCOMB_DATASET`")?;
    map.insert(
        "x-honeycomb-team",
        api_key.parse().context("invalid API key")?,
    );
    map.insert(
        "x-honeycomb-dataset",
        dataset.parse().context("invalid dataset")?,
    );
    Ok(map)
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("trackload")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;
        use std::str::FromStr;

        let metadata = get_metadata()?;
        let endpoint =
            std::env::var("HONEYCOMB_ENDPOINT").context("missing `HONEYCOMB_ENDPOINT`")?;
        let raw = std::env::var("HONEYCOMB_COMPRESSION")
            .context("missing `HONEYCOMB_COMPRESSION`")?
            .to_ascii_lowercase();
        let compression = Compression::from_str(&raw)?;
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_metadata(metadata)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(compression)
            .with_endpoint(endpoint)
            .with_protocol(Protocol::Grpc)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}
