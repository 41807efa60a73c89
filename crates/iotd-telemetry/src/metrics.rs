//! Prometheus metrics of a publisher.
//!
//! All metrics follow the naming convention: `iotd_<area>_<metric>_<unit>`
//! and live on a registry owned by [`PublisherMetrics`], so several
//! publishers in one process do not collide.
//!
//! ## Metric Types
//!
//! - **Counter**: discovery publications and identity decisions
//! - **Gauge**: size of the publisher directory
//! - **Histogram**: duration of a publication cycle

use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

/// Discovery entity label values.
pub mod kind {
    pub const NODE: &str = "node";
    pub const INPUT: &str = "input";
    pub const IDENTITY: &str = "identity";
}

/// Metrics of one publisher.
#[derive(Clone)]
pub struct PublisherMetrics {
    registry: Registry,
    discovery_published: CounterVec,
    discovery_retired: CounterVec,
    identities_accepted: Counter,
    identities_rejected: CounterVec,
    known_publishers: Gauge,
    publish_duration: Histogram,
}

fn metrics_err(e: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsInit(e.to_string())
}

impl PublisherMetrics {
    /// Create and register all metrics on a fresh registry.
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let discovery_published = CounterVec::new(
            Opts::new(
                "iotd_discovery_published_total",
                "Discovery messages published",
            ),
            &["kind"], // node/input/identity
        )
        .map_err(metrics_err)?;

        let discovery_retired = CounterVec::new(
            Opts::new(
                "iotd_discovery_retired_total",
                "Discovery addresses cleared after deletion",
            ),
            &["kind"],
        )
        .map_err(metrics_err)?;

        let identities_accepted = Counter::new(
            "iotd_identities_accepted_total",
            "Publisher identities accepted into the directory",
        )
        .map_err(metrics_err)?;

        let identities_rejected = CounterVec::new(
            Opts::new(
                "iotd_identities_rejected_total",
                "Publisher identities rejected by the trust chain",
            ),
            &["reason"],
        )
        .map_err(metrics_err)?;

        let known_publishers = Gauge::new(
            "iotd_directory_publishers",
            "Publishers currently in the directory",
        )
        .map_err(metrics_err)?;

        let buckets = exponential_buckets(0.0001, 2.0, 14).map_err(metrics_err)?;
        let publish_duration = Histogram::with_opts(
            HistogramOpts::new(
                "iotd_publish_cycle_duration_seconds",
                "Time spent publishing pending discovery updates",
            )
            .buckets(buckets),
        )
        .map_err(metrics_err)?;

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(discovery_published.clone()),
            Box::new(discovery_retired.clone()),
            Box::new(identities_accepted.clone()),
            Box::new(identities_rejected.clone()),
            Box::new(known_publishers.clone()),
            Box::new(publish_duration.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(metrics_err)?;
        }

        Ok(Self {
            registry,
            discovery_published,
            discovery_retired,
            identities_accepted,
            identities_rejected,
            known_publishers,
            publish_duration,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_published(&self, kind: &str, count: usize) {
        self.discovery_published
            .with_label_values(&[kind])
            .inc_by(count as f64);
    }

    pub fn record_retired(&self, kind: &str, count: usize) {
        self.discovery_retired
            .with_label_values(&[kind])
            .inc_by(count as f64);
    }

    pub fn record_identity_accepted(&self) {
        self.identities_accepted.inc();
    }

    pub fn record_identity_rejected(&self, reason: &str) {
        self.identities_rejected.with_label_values(&[reason]).inc();
    }

    pub fn set_known_publishers(&self, count: usize) {
        self.known_publishers.set(count as f64);
    }

    /// Time a publication cycle. Observed when the timer drops.
    #[must_use]
    pub fn publish_timer(&self) -> HistogramTimer {
        HistogramTimer::new(&self.publish_duration)
    }

    #[must_use]
    pub fn published(&self, kind: &str) -> f64 {
        self.discovery_published.with_label_values(&[kind]).get()
    }

    #[must_use]
    pub fn identities_accepted(&self) -> f64 {
        self.identities_accepted.get()
    }

    #[must_use]
    pub fn identities_rejected(&self, reason: &str) -> f64 {
        self.identities_rejected.with_label_values(&[reason]).get()
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metrics_err)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
