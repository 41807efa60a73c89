//! # Publisher
//!
//! Wires the registries, command ingestors and trust chain of one publisher
//! onto a message transport and runs the discovery publication loop.
//!
//! ## Startup Sequence
//!
//! 1. Load the node list (if configured and present)
//! 2. Subscribe the trust chain to `domain/+/$identity`
//! 3. Start the configure and set command ingestors
//! 4. Publish the own identity (signed, retained)
//!
//! ## Publication
//!
//! ```text
//! RegisteredNodes ──┐
//!                   ├──→ publish_updates ──→ signed, retained discovery
//! RegisteredInputs ─┘          │              (retirement: empty retained)
//!                              └──→ save node list
//! ```
//!
//! ## Renaming Nodes
//!
//! `set_node_id` renames in the node registry and then rebinds the node's
//! inputs. Between the two steps set commands for the old input addresses
//! are still accepted.

use crate::adapters::MetricsObserver;
use crate::config::PublisherConfig;
use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use iotd_01_nodes::{NodeUpdate, ReceiveNodeConfigure, RegisteredNodes};
use iotd_02_inputs::{InputFromSetCommands, InputHandler, InputUpdate, RegisteredInputs};
use iotd_03_publishers::{DomainPublishers, TrustChain};
use iotd_telemetry::metrics::kind;
use iotd_telemetry::{log_event, PublisherMetrics};
use serde::Serialize;
use shared_bus::{MessageTransport, SenderTimestampTable};
use shared_crypto::{MessageSigner, PublicKeyProvider, Secp256k1KeyPair};
use shared_types::address;
use shared_types::entities::{InputDiscoveryMessage, PublisherIdentity, PublisherIdentityMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const COMPONENT: &str = "publisher";

/// Outcome of one publication cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishCounts {
    /// Node discovery messages published.
    pub nodes: usize,
    /// Input discovery messages published.
    pub inputs: usize,
    /// Addresses cleared for deleted or renamed entities.
    pub retired: usize,
    /// Messages that could not be signed or published.
    pub failed: usize,
}

impl PublishCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.nodes + self.inputs + self.retired
    }
}

/// One publisher of the domain.
pub struct Publisher {
    config: PublisherConfig,
    transport: Arc<dyn MessageTransport>,
    signer: MessageSigner,
    directory: Arc<DomainPublishers>,
    nodes: Arc<RegisteredNodes>,
    inputs: Arc<RegisteredInputs>,
    configure: Arc<ReceiveNodeConfigure>,
    set_commands: Arc<InputFromSetCommands>,
    trust: Arc<TrustChain>,
    metrics: PublisherMetrics,
}

impl Publisher {
    /// Create a publisher. Nothing is subscribed until [`Publisher::start`].
    pub fn new(
        config: PublisherConfig,
        transport: Arc<dyn MessageTransport>,
        keypair: Secp256k1KeyPair,
    ) -> Result<Self> {
        config.validate().context("Invalid publisher configuration")?;
        let domain = config.domain.clone();
        let publisher_id = config.publisher_id.clone();

        let directory = Arc::new(DomainPublishers::new());
        let keys: Arc<dyn PublicKeyProvider> = directory.clone();
        let signer = MessageSigner::new(Arc::new(keypair), keys);

        let nodes = Arc::new(RegisteredNodes::new(&domain, &publisher_id));
        let inputs = Arc::new(RegisteredInputs::new(&domain, &publisher_id));

        let configure = Arc::new(ReceiveNodeConfigure::new(
            &domain,
            &publisher_id,
            None,
            signer.clone(),
            nodes.clone(),
            transport.clone(),
        ));

        let replay = match config.max_future_skew_secs {
            Some(secs) => {
                let skew = i64::try_from(secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .context("max_future_skew_secs is out of range")?;
                SenderTimestampTable::with_max_future_skew(skew)
            }
            None => SenderTimestampTable::new(),
        };
        let set_commands = InputFromSetCommands::with_replay_table(
            &domain,
            &publisher_id,
            signer.clone(),
            inputs.clone(),
            transport.clone(),
            replay,
        );

        let trust = Arc::new(TrustChain::new(
            &domain,
            config.require_signed_identity,
            directory.clone(),
            transport.clone(),
        ));

        let metrics = PublisherMetrics::new().context("Failed to create publisher metrics")?;
        trust.set_observer(Some(Arc::new(MetricsObserver::new(
            metrics.clone(),
            directory.clone(),
        ))));

        Ok(Self {
            config,
            transport,
            signer,
            directory,
            nodes,
            inputs,
            configure,
            set_commands,
            trust,
            metrics,
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    #[must_use]
    pub fn nodes(&self) -> &Arc<RegisteredNodes> {
        &self.nodes
    }

    #[must_use]
    pub fn inputs(&self) -> &Arc<RegisteredInputs> {
        &self.inputs
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<DomainPublishers> {
        &self.directory
    }

    /// Configure command ingestor, for installing a configure handler.
    #[must_use]
    pub fn configure_commands(&self) -> &Arc<ReceiveNodeConfigure> {
        &self.configure
    }

    #[must_use]
    pub fn set_commands(&self) -> &Arc<InputFromSetCommands> {
        &self.set_commands
    }

    #[must_use]
    pub fn trust_chain(&self) -> &Arc<TrustChain> {
        &self.trust
    }

    #[must_use]
    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn signer(&self) -> &MessageSigner {
        &self.signer
    }

    /// Identity address of this publisher.
    #[must_use]
    pub fn identity_address(&self) -> String {
        address::make_publisher_identity_address(&self.config.domain, &self.config.publisher_id)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Load state, subscribe to the bus and announce this publisher.
    pub fn start(&self) -> Result<()> {
        if let Some(path) = &self.config.nodes_file {
            if path.exists() {
                let count = self
                    .nodes
                    .load_nodes(path)
                    .with_context(|| format!("Failed to load nodes from {}", path.display()))?;
                info!(path = %path.display(), nodes = count, "Restored nodes");
            } else {
                info!(path = %path.display(), "No node file yet, starting empty");
            }
        }

        self.trust
            .start()
            .context("Failed to subscribe to publisher identities")?;
        self.configure
            .start()
            .context("Failed to subscribe to configure commands")?;
        self.set_commands
            .start()
            .context("Failed to subscribe to set commands")?;

        self.publish_identity()?;
        log_event!(
            info,
            COMPONENT,
            "Publisher started",
            domain = %self.config.domain,
            publisher_id = %self.config.publisher_id
        );
        Ok(())
    }

    /// Unsubscribe everything and save the node list.
    pub fn stop(&self) -> Result<()> {
        self.set_commands.stop();
        self.configure.stop();
        self.trust.stop();

        if let Some(path) = &self.config.nodes_file {
            self.nodes
                .save_nodes(path)
                .with_context(|| format!("Failed to save nodes to {}", path.display()))?;
        }
        log_event!(info, COMPONENT, "Publisher stopped", publisher_id = %self.config.publisher_id);
        Ok(())
    }

    /// Publish the signed identity of this publisher, retained.
    pub fn publish_identity(&self) -> Result<()> {
        let address = self.identity_address();
        let identity = PublisherIdentityMessage {
            identity: PublisherIdentity {
                address: address.clone(),
                domain: self.config.domain.clone(),
                publisher_id: self.config.publisher_id.clone(),
                public_signing_key: self.signer.public_key().to_base64url(),
                timestamp: Utc::now(),
            },
            identity_signature: None,
        };
        let message = self
            .signer
            .sign(&identity)
            .context("Failed to sign publisher identity")?;
        self.transport
            .publish(&address, &message, true)
            .context("Failed to publish publisher identity")?;
        self.metrics.record_published(kind::IDENTITY, 1);
        info!(address = %address, "Publisher identity published");
        Ok(())
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Create an input of a node that accepts set commands.
    pub fn create_input(
        &self,
        node_id: &str,
        input_type: &str,
        instance: &str,
        handler: Arc<dyn InputHandler>,
    ) -> Result<Arc<InputDiscoveryMessage>> {
        self.set_commands
            .create_input(node_id, input_type, instance, handler)
            .with_context(|| format!("Failed to subscribe input {node_id}/{input_type}/{instance}"))
    }

    /// Rename a node and move its inputs to the new address.
    ///
    /// Returns false when the node is unknown or the ID is taken.
    pub fn set_node_id(&self, hw_id: &str, new_node_id: &str) -> Result<bool> {
        let Some(node) = self.nodes.get_node_by_hw_id(hw_id) else {
            warn!(hw_id = hw_id, "Cannot rename unknown node");
            return Ok(false);
        };
        if !self.nodes.set_node_id(&node, new_node_id) {
            return Ok(false);
        }
        let Some(renamed) = self.nodes.get_node_by_hw_id(hw_id) else {
            return Ok(false);
        };
        self.set_commands
            .rebind_node(&node.node_id, &renamed.node_id)
            .with_context(|| format!("Failed to rebind inputs of node {hw_id}"))?;
        Ok(true)
    }

    /// Publish pending node and input discovery updates.
    ///
    /// A message that fails to sign or publish is logged and counted in
    /// `failed`; the rest of the cycle continues.
    pub fn publish_updates(&self) -> Result<PublishCounts> {
        let _timer = self.metrics.publish_timer();
        let mut counts = PublishCounts::default();

        let node_updates = self.nodes.get_updated_nodes(true);
        for update in &node_updates {
            match update {
                NodeUpdate::Published(node) => {
                    if self.publish_discovery(&node.address, node.as_ref()) {
                        counts.nodes += 1;
                    } else {
                        counts.failed += 1;
                    }
                }
                NodeUpdate::Retired { address } => {
                    if self.retire(address) {
                        counts.retired += 1;
                        self.metrics.record_retired(kind::NODE, 1);
                    } else {
                        counts.failed += 1;
                    }
                }
            }
        }

        for update in self.inputs.get_updated_inputs(true) {
            match update {
                InputUpdate::Published(input) => {
                    if self.publish_discovery(&input.address, input.as_ref()) {
                        counts.inputs += 1;
                    } else {
                        counts.failed += 1;
                    }
                }
                InputUpdate::Retired { address } => {
                    if self.retire(&address) {
                        counts.retired += 1;
                        self.metrics.record_retired(kind::INPUT, 1);
                    } else {
                        counts.failed += 1;
                    }
                }
            }
        }

        self.metrics.record_published(kind::NODE, counts.nodes);
        self.metrics.record_published(kind::INPUT, counts.inputs);

        if !node_updates.is_empty() && self.config.save_on_update {
            if let Some(path) = &self.config.nodes_file {
                self.nodes
                    .save_nodes(path)
                    .with_context(|| format!("Failed to save nodes to {}", path.display()))?;
            }
        }

        if counts.total() > 0 || counts.failed > 0 {
            log_event!(
                info,
                COMPONENT,
                "Discovery updates published",
                nodes = counts.nodes,
                inputs = counts.inputs,
                retired = counts.retired,
                failed = counts.failed
            );
        }
        Ok(counts)
    }

    /// Publish updates every `publish_interval_ms` until `shutdown` turns
    /// true or its sender is dropped, then publish once more.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.publish_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.publish_updates() {
                        log_event!(error, COMPONENT, "Publication cycle failed", error = %e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(publisher_id = %self.config.publisher_id, "Publication loop stopping");
        self.publish_updates()?;
        Ok(())
    }

    fn publish_discovery<T: Serialize>(&self, address: &str, discovery: &T) -> bool {
        let message = match self.signer.sign(discovery) {
            Ok(message) => message,
            Err(e) => {
                warn!(address = address, error = %e, "Failed to sign discovery message");
                return false;
            }
        };
        match self.transport.publish(address, &message, true) {
            Ok(_) => true,
            Err(e) => {
                warn!(address = address, error = %e, "Failed to publish discovery message");
                false
            }
        }
    }

    fn retire(&self, address: &str) -> bool {
        match self.transport.publish(address, "", true) {
            Ok(_) => true,
            Err(e) => {
                warn!(address = address, error = %e, "Failed to clear retired address");
                false
            }
        }
    }
}
