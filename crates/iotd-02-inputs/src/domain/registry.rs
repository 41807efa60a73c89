//! # Registered Inputs
//!
//! Inputs of the publisher's nodes, each with the handler that receives its
//! set commands. Discovery records are immutable `Arc` snapshots, like nodes.

use crate::ports::outbound::InputHandler;
use chrono::Utc;
use parking_lot::Mutex;
use shared_types::address;
use shared_types::entities::InputDiscoveryMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A pending input publication.
#[derive(Debug, Clone, PartialEq)]
pub enum InputUpdate {
    Published(Arc<InputDiscoveryMessage>),
    Retired { address: String },
}

impl InputUpdate {
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Published(input) => &input.address,
            Self::Retired { address } => address,
        }
    }
}

struct RegisteredInput {
    discovery: Arc<InputDiscoveryMessage>,
    handler: Arc<dyn InputHandler>,
}

#[derive(Default)]
struct InputIndex {
    /// discovery address -> input
    inputs: HashMap<String, RegisteredInput>,
    updated: HashMap<String, InputUpdate>,
}

/// Registry of the inputs managed by a publisher.
pub struct RegisteredInputs {
    domain: String,
    publisher_id: String,
    index: Mutex<InputIndex>,
}

impl RegisteredInputs {
    pub fn new(domain: impl Into<String>, publisher_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            publisher_id: publisher_id.into(),
            index: Mutex::new(InputIndex::default()),
        }
    }

    /// Discovery address of an input of this publisher.
    #[must_use]
    pub fn input_address(&self, node_id: &str, input_type: &str, instance: &str) -> String {
        address::make_input_discovery_address(
            &self.domain,
            &self.publisher_id,
            node_id,
            input_type,
            instance,
        )
    }

    /// Set command address of an input of this publisher.
    #[must_use]
    pub fn set_address(&self, node_id: &str, input_type: &str, instance: &str) -> String {
        address::make_set_input_address(
            &self.domain,
            &self.publisher_id,
            node_id,
            input_type,
            instance,
        )
    }

    /// Create an input, replacing an existing one at the same address.
    pub fn create_input(
        &self,
        node_id: &str,
        input_type: &str,
        instance: &str,
        handler: Arc<dyn InputHandler>,
    ) -> Arc<InputDiscoveryMessage> {
        let discovery = Arc::new(InputDiscoveryMessage {
            address: self.input_address(node_id, input_type, instance),
            node_id: node_id.to_string(),
            publisher_id: self.publisher_id.clone(),
            input_type: input_type.to_string(),
            instance: instance.to_string(),
            timestamp: Utc::now(),
        });

        let mut index = self.index.lock();
        index.updated.insert(
            discovery.address.clone(),
            InputUpdate::Published(discovery.clone()),
        );
        index.inputs.insert(
            discovery.address.clone(),
            RegisteredInput {
                discovery: discovery.clone(),
                handler,
            },
        );
        info!(address = %discovery.address, "Input created");
        discovery
    }

    /// Delete an input and retire its discovery address.
    pub fn delete_input(&self, node_id: &str, input_type: &str, instance: &str) -> bool {
        let address = self.input_address(node_id, input_type, instance);
        let mut index = self.index.lock();
        if index.inputs.remove(&address).is_none() {
            return false;
        }
        index
            .updated
            .insert(address.clone(), InputUpdate::Retired { address: address.clone() });
        info!(address = %address, "Input deleted");
        true
    }

    #[must_use]
    pub fn get_input_by_address(&self, address: &str) -> Option<Arc<InputDiscoveryMessage>> {
        self.index
            .lock()
            .inputs
            .get(address)
            .map(|input| input.discovery.clone())
    }

    /// All inputs, ordered by address.
    #[must_use]
    pub fn get_all_inputs(&self) -> Vec<Arc<InputDiscoveryMessage>> {
        let index = self.index.lock();
        let mut inputs: Vec<_> = index.inputs.values().map(|i| i.discovery.clone()).collect();
        inputs.sort_by(|a, b| a.address.cmp(&b.address));
        inputs
    }

    /// Inputs of one node together with their handlers.
    #[must_use]
    pub fn get_node_inputs(
        &self,
        node_id: &str,
    ) -> Vec<(Arc<InputDiscoveryMessage>, Arc<dyn InputHandler>)> {
        self.index
            .lock()
            .inputs
            .values()
            .filter(|i| i.discovery.node_id == node_id)
            .map(|i| (i.discovery.clone(), i.handler.clone()))
            .collect()
    }

    /// Invoke the handler of an input. Returns false for an unknown input.
    ///
    /// The handler runs after the registry lock is released.
    pub fn notify_input_handler(&self, input_address: &str, sender: &str, value: &str) -> bool {
        let handler = {
            let index = self.index.lock();
            match index.inputs.get(input_address) {
                Some(input) => input.handler.clone(),
                None => return false,
            }
        };
        debug!(address = input_address, sender = sender, "Notifying input handler");
        handler.on_set(input_address, sender, value);
        true
    }

    /// Pending publications, optionally clearing them.
    pub fn get_updated_inputs(&self, clear: bool) -> Vec<InputUpdate> {
        let mut index = self.index.lock();
        if clear {
            std::mem::take(&mut index.updated).into_values().collect()
        } else {
            index.updated.values().cloned().collect()
        }
    }
}
