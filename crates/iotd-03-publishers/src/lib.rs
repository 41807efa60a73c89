//! # Publisher Directory Subsystem (IOTD-03)
//!
//! Publisher identities of the domain and the trust chain that admits them.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `DomainPublishers` directory, `TrustState`
//!   and DSS countersignatures
//! - **Ports Layer** (`ports/`): `IdentityObserver` for trust decisions
//! - **Service Layer** (`service.rs`): `TrustChain` handling `$identity`
//!   announcements
//!
//! ## Trust Levels
//!
//! Without a domain security service (DSS) every well formed identity is
//! accepted and the bus is trusted to protect addresses. Once the DSS
//! identity is seen, identities must be countersigned by the DSS. There is
//! no way back.
//!
//! The directory implements `shared_crypto::PublicKeyProvider`, so message
//! signers resolve command senders through it.

pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::directory::DomainPublishers;
pub use domain::trust::{canonical_identity, sign_identity, verify_identity, TrustState};
pub use ports::outbound::IdentityObserver;
pub use service::TrustChain;
