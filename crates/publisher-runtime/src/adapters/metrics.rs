//! Trust chain decisions recorded as Prometheus metrics.

use iotd_03_publishers::{DomainPublishers, IdentityObserver, TrustState};
use iotd_telemetry::PublisherMetrics;
use shared_types::CommandError;
use std::sync::Arc;

/// `IdentityObserver` that counts accepted and rejected identities.
pub struct MetricsObserver {
    metrics: PublisherMetrics,
    directory: Arc<DomainPublishers>,
}

impl MetricsObserver {
    pub fn new(metrics: PublisherMetrics, directory: Arc<DomainPublishers>) -> Self {
        Self { metrics, directory }
    }
}

impl IdentityObserver for MetricsObserver {
    fn on_accepted(&self, _address: &str, _trust: TrustState) {
        self.metrics.record_identity_accepted();
        self.metrics.set_known_publishers(self.directory.len());
    }

    fn on_rejected(&self, _address: &str, error: &CommandError) {
        self.metrics.record_identity_rejected(error.kind());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_labelled_by_kind() {
        let metrics = PublisherMetrics::new().unwrap();
        let observer = MetricsObserver::new(metrics.clone(), Arc::new(DomainPublishers::new()));

        observer.on_rejected(
            "dom/pub1/$identity",
            &CommandError::TrustRejected {
                address: "dom/pub1/$identity".into(),
            },
        );
        observer.on_accepted("dom/pub2/$identity", TrustState::AddressProtectionOnly);

        assert_eq!(metrics.identities_rejected("trust_rejected"), 1.0);
        assert_eq!(metrics.identities_accepted(), 1.0);
    }
}
