//! # Outbound Ports (Driven Ports)

use crate::domain::trust::TrustState;
use shared_types::CommandError;

/// Told about every identity announcement received over the bus.
pub trait IdentityObserver: Send + Sync {
    /// The identity was stored under `trust`.
    fn on_accepted(&self, address: &str, trust: TrustState);

    /// The identity was rejected and the directory left unchanged.
    fn on_rejected(&self, address: &str, error: &CommandError);
}
