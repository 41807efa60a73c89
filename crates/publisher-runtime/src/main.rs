//! # IoT Domain Publisher
//!
//! Runs a publisher on an in-process message bus until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`IOTD_CONFIG` TOML file, then `IOTD_*` overrides)
//! 2. Initialize logging
//! 3. Load the signing key (`IOTD_SIGNING_KEY`, base64url) or generate one
//! 4. Start the publisher and its publication loop

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::{info, warn};

use iotd_telemetry::{init_telemetry, TelemetryConfig};
use publisher_runtime::{Publisher, PublisherConfig};
use shared_bus::InMemoryMessageBus;
use shared_crypto::Secp256k1KeyPair;

/// Load configuration from file and environment.
fn load_config() -> Result<PublisherConfig> {
    let config = match std::env::var("IOTD_CONFIG") {
        Ok(path) => PublisherConfig::from_toml_file(&PathBuf::from(path))?,
        Err(_) => PublisherConfig::default(),
    };
    let config = config.with_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Signing key from the environment, or a fresh one.
fn load_keypair() -> Result<Secp256k1KeyPair> {
    let Ok(encoded) = std::env::var("IOTD_SIGNING_KEY") else {
        warn!("IOTD_SIGNING_KEY not set, generating an ephemeral signing key");
        return Ok(Secp256k1KeyPair::generate());
    };
    let raw = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .context("IOTD_SIGNING_KEY is not base64url")?;
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| anyhow::anyhow!("IOTD_SIGNING_KEY must be 32 bytes"))?;
    Secp256k1KeyPair::from_bytes(bytes).context("IOTD_SIGNING_KEY is not a valid secp256k1 key")
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    let _telemetry = init_telemetry(TelemetryConfig::for_publisher(&config.publisher_id))?;
    let keypair = load_keypair()?;

    let bus = Arc::new(InMemoryMessageBus::new());
    let publisher = Arc::new(Publisher::new(config, bus, keypair)?);
    publisher.start()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = {
        let publisher = Arc::clone(&publisher);
        tokio::spawn(async move { publisher.run(shutdown_rx).await })
    };

    info!("Publisher is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    shutdown_tx.send(true)?;
    runner.await??;
    publisher.stop()?;
    Ok(())
}
