//! # Input Set Commands
//!
//! Receives `$set` commands for the inputs of this publisher and passes the
//! value to the input's handler. The registry itself is never modified by a
//! set command.
//!
//! ## Security
//!
//! - Encrypted to this publisher and signed by a known sender, or rejected
//! - Per-sender replay guard: the command timestamp must be strictly newer
//!   than the last accepted command from the same sender
//!
//! ## Subscriptions
//!
//! Each input has its own `$set` subscription. They are active between
//! `start()` and `stop()`; inputs created while running are subscribed
//! immediately.

use crate::domain::registry::RegisteredInputs;
use crate::ports::outbound::InputHandler;
use parking_lot::Mutex;
use shared_bus::{
    BusError, MessageHandler, MessageTransport, SenderTimestampTable, SubscriptionId,
};
use shared_crypto::{DecodedMessage, MessageSigner};
use shared_types::address::{self, MessageType};
use shared_types::entities::InputDiscoveryMessage;
use shared_types::{CommandError, SetInputMessage};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{info, warn};

#[derive(Default)]
struct SubscriptionState {
    running: bool,
    /// set address -> active subscription (None while stopped)
    topics: HashMap<String, Option<SubscriptionId>>,
}

/// Ingestor of input set commands.
pub struct InputFromSetCommands {
    domain: String,
    publisher_id: String,
    signer: MessageSigner,
    inputs: Arc<RegisteredInputs>,
    transport: Arc<dyn MessageTransport>,
    state: Mutex<SubscriptionState>,
    replay: Mutex<SenderTimestampTable>,
    this: Weak<Self>,
}

impl InputFromSetCommands {
    pub fn new(
        domain: impl Into<String>,
        publisher_id: impl Into<String>,
        signer: MessageSigner,
        inputs: Arc<RegisteredInputs>,
        transport: Arc<dyn MessageTransport>,
    ) -> Arc<Self> {
        Self::with_replay_table(
            domain,
            publisher_id,
            signer,
            inputs,
            transport,
            SenderTimestampTable::new(),
        )
    }

    /// Create with a preconfigured replay table, for example one with a
    /// future-skew bound.
    pub fn with_replay_table(
        domain: impl Into<String>,
        publisher_id: impl Into<String>,
        signer: MessageSigner,
        inputs: Arc<RegisteredInputs>,
        transport: Arc<dyn MessageTransport>,
        replay: SenderTimestampTable,
    ) -> Arc<Self> {
        let domain = domain.into();
        let publisher_id = publisher_id.into();
        Arc::new_cyclic(|this| Self {
            domain,
            publisher_id,
            signer,
            inputs,
            transport,
            state: Mutex::new(SubscriptionState::default()),
            replay: Mutex::new(replay),
            this: this.clone(),
        })
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    // =========================================================================
    // INPUT LIFECYCLE
    // =========================================================================

    /// Create an input that responds to set commands.
    ///
    /// Replaces an existing input at the same address.
    pub fn create_input(
        &self,
        node_id: &str,
        input_type: &str,
        instance: &str,
        handler: Arc<dyn InputHandler>,
    ) -> Result<Arc<InputDiscoveryMessage>, BusError> {
        let mut state = self.state.lock();
        let input = self
            .inputs
            .create_input(node_id, input_type, instance, handler);
        let set_address = self.inputs.set_address(node_id, input_type, instance);
        self.track(&mut state, set_address)?;
        Ok(input)
    }

    /// Delete an input and drop its set subscription.
    pub fn delete_input(&self, node_id: &str, input_type: &str, instance: &str) -> bool {
        let mut state = self.state.lock();
        let set_address = self.inputs.set_address(node_id, input_type, instance);
        self.untrack(&mut state, &set_address);
        self.inputs.delete_input(node_id, input_type, instance)
    }

    /// Move every input of a renamed node to its new address.
    ///
    /// Handlers are kept. Returns the number of inputs moved.
    pub fn rebind_node(&self, old_node_id: &str, new_node_id: &str) -> Result<usize, BusError> {
        if old_node_id == new_node_id {
            return Ok(0);
        }
        let mut state = self.state.lock();
        let moved = self.inputs.get_node_inputs(old_node_id);
        for (input, handler) in &moved {
            let old_set = self
                .inputs
                .set_address(old_node_id, &input.input_type, &input.instance);
            self.untrack(&mut state, &old_set);
            self.inputs
                .delete_input(old_node_id, &input.input_type, &input.instance);

            self.inputs.create_input(
                new_node_id,
                &input.input_type,
                &input.instance,
                handler.clone(),
            );
            let new_set = self
                .inputs
                .set_address(new_node_id, &input.input_type, &input.instance);
            self.track(&mut state, new_set)?;
        }
        if !moved.is_empty() {
            info!(
                old_node_id = old_node_id,
                new_node_id = new_node_id,
                inputs = moved.len(),
                "Inputs rebound to renamed node"
            );
        }
        Ok(moved.len())
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Subscribe to the set address of every input. Does nothing when running.
    pub fn start(&self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if state.running {
            return Ok(());
        }
        let pending: Vec<String> = state
            .topics
            .iter()
            .filter(|(_, id)| id.is_none())
            .map(|(topic, _)| topic.clone())
            .collect();
        for topic in pending {
            let id = self.subscribe(&topic)?;
            state.topics.insert(topic, Some(id));
        }
        state.running = true;
        info!(
            publisher_id = %self.publisher_id,
            inputs = state.topics.len(),
            "Listening for set commands"
        );
        Ok(())
    }

    /// Remove all set subscriptions. Does nothing when stopped.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        for id in state.topics.values_mut() {
            if let Some(id) = id.take() {
                self.transport.unsubscribe(id);
            }
        }
        if state.running {
            state.running = false;
            info!(publisher_id = %self.publisher_id, "Stopped listening for set commands");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn track(&self, state: &mut SubscriptionState, set_address: String) -> Result<(), BusError> {
        if state.topics.get(&set_address).is_some_and(Option::is_some) {
            return Ok(());
        }
        let id = if state.running {
            Some(self.subscribe(&set_address)?)
        } else {
            None
        };
        state.topics.insert(set_address, id);
        Ok(())
    }

    fn untrack(&self, state: &mut SubscriptionState, set_address: &str) {
        if let Some(Some(id)) = state.topics.remove(set_address) {
            self.transport.unsubscribe(id);
        }
    }

    fn subscribe(&self, set_address: &str) -> Result<SubscriptionId, BusError> {
        let weak = self.this.clone();
        let on_message: MessageHandler = Arc::new(move |address: &str, message: &str| {
            if let Some(this) = weak.upgrade() {
                if let Err(e) = this.decode_set_command(address, message) {
                    warn!(address = address, kind = e.kind(), error = %e, "Set command rejected");
                }
            }
        });
        self.transport.subscribe(set_address, on_message)
    }

    // =========================================================================
    // COMMAND HANDLING
    // =========================================================================

    /// Decode, verify and dispatch one set command.
    pub fn decode_set_command(&self, address: &str, message: &str) -> Result<(), CommandError> {
        if !address::split_address(address).is_some_and(|p| p.instance.is_some()) {
            return Err(CommandError::DecodeFailure {
                address: address.to_string(),
                reason: "set address is incomplete".into(),
            });
        }
        let input_address = address::replace_message_type(address, MessageType::InputDiscovery)
            .ok_or_else(|| CommandError::DecodeFailure {
                address: address.to_string(),
                reason: "set address is incomplete".into(),
            })?;

        let decoded: DecodedMessage<SetInputMessage> = self.signer.decode_message(message);
        if !decoded.is_encrypted {
            return Err(CommandError::PolicyViolation {
                address: address.to_string(),
                reason: "set command is not encrypted".into(),
            });
        }
        let command = decoded.payload.map_err(|e| CommandError::DecodeFailure {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        if !decoded.is_signed {
            return Err(CommandError::PolicyViolation {
                address: address.to_string(),
                reason: "set command is not signed".into(),
            });
        }

        if self.inputs.get_input_by_address(&input_address).is_none() {
            return Err(CommandError::NotFound {
                address: input_address,
            });
        }

        self.replay
            .lock()
            .check_and_record(&command.sender, command.timestamp)
            .map_err(|e| {
                warn!(address = address, error = %e, "Replay guard rejected set command");
                CommandError::ReplayRejected {
                    address: address.to_string(),
                    sender: command.sender.clone(),
                }
            })?;

        info!(address = address, sender = %command.sender, "Set command accepted");
        if !self
            .inputs
            .notify_input_handler(&input_address, &command.sender, &command.value)
        {
            // deleted between lookup and dispatch
            return Err(CommandError::NotFound {
                address: input_address,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use shared_bus::InMemoryMessageBus;
    use shared_crypto::{encrypt_for, PublicKeyProvider, Secp256k1KeyPair, Secp256k1PublicKey};

    const SENDER: &str = "dom/admin/$identity";
    const SET_ADDR: &str = "dom/pub1/node1/switch/0/$set";

    struct Directory(HashMap<String, Secp256k1PublicKey>);

    impl PublicKeyProvider for Directory {
        fn public_key(&self, address: &str) -> Option<Secp256k1PublicKey> {
            self.0.get(address).copied()
        }
    }

    type Calls = Arc<Mutex<Vec<(String, String, String)>>>;

    struct Fixture {
        bus: Arc<InMemoryMessageBus>,
        ingestor: Arc<InputFromSetCommands>,
        admin: MessageSigner,
        publisher_key: Secp256k1PublicKey,
        calls: Calls,
    }

    fn recorder(calls: &Calls) -> Arc<dyn InputHandler> {
        let sink = calls.clone();
        Arc::new(move |input: &str, sender: &str, value: &str| {
            sink.lock()
                .push((input.to_string(), sender.to_string(), value.to_string()));
        })
    }

    fn fixture() -> Fixture {
        let publisher = Arc::new(Secp256k1KeyPair::generate());
        let admin_keys = Arc::new(Secp256k1KeyPair::generate());
        let publisher_key = publisher.public_key();

        let mut keys = HashMap::new();
        keys.insert(SENDER.to_string(), admin_keys.public_key());
        let directory: Arc<dyn PublicKeyProvider> = Arc::new(Directory(keys));

        let bus = Arc::new(InMemoryMessageBus::new());
        let inputs = Arc::new(RegisteredInputs::new("dom", "pub1"));
        let ingestor = InputFromSetCommands::new(
            "dom",
            "pub1",
            MessageSigner::new(publisher, directory.clone()),
            inputs,
            bus.clone(),
        );
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        ingestor
            .create_input("node1", "switch", "0", recorder(&calls))
            .unwrap();

        Fixture {
            bus,
            ingestor,
            admin: MessageSigner::new(admin_keys, directory),
            publisher_key,
            calls,
        }
    }

    fn set_command(f: &Fixture, value: &str, timestamp: DateTime<Utc>) -> String {
        let command = SetInputMessage {
            sender: SENDER.to_string(),
            timestamp,
            value: value.to_string(),
        };
        f.admin.sign_and_encrypt(&command, &f.publisher_key).unwrap()
    }

    #[test]
    fn test_accepted_command_reaches_handler() {
        let f = fixture();
        let message = set_command(&f, "on", Utc::now());

        f.ingestor.decode_set_command(SET_ADDR, &message).unwrap();

        assert_eq!(
            *f.calls.lock(),
            vec![(
                "dom/pub1/node1/switch/0/$input".to_string(),
                SENDER.to_string(),
                "on".to_string()
            )]
        );
    }

    /// Test: A command older than the last accepted one is a replay
    #[test]
    fn test_replay_older_rejected() {
        let f = fixture();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(1);
        let second = set_command(&f, "off", t2);
        let first = set_command(&f, "on", t1);

        f.ingestor.decode_set_command(SET_ADDR, &second).unwrap();
        let result = f.ingestor.decode_set_command(SET_ADDR, &first);

        assert!(matches!(result, Err(CommandError::ReplayRejected { .. })));
        assert_eq!(f.calls.lock().len(), 1);
    }

    #[test]
    fn test_in_order_commands_accepted() {
        let f = fixture();
        let t1 = Utc::now();
        let first = set_command(&f, "on", t1);
        let second = set_command(&f, "off", t1 + Duration::seconds(1));

        f.ingestor.decode_set_command(SET_ADDR, &first).unwrap();
        f.ingestor.decode_set_command(SET_ADDR, &second).unwrap();

        assert_eq!(f.calls.lock().len(), 2);
    }

    /// Test: Replaying the identical message is rejected
    #[test]
    fn test_identical_replay_rejected() {
        let f = fixture();
        let message = set_command(&f, "on", Utc::now());

        f.ingestor.decode_set_command(SET_ADDR, &message).unwrap();
        assert!(f.ingestor.decode_set_command(SET_ADDR, &message).is_err());
        assert_eq!(f.calls.lock().len(), 1);
    }

    #[test]
    fn test_unsigned_rejected() {
        let f = fixture();
        let json = serde_json::json!({
            "sender": SENDER,
            "timestamp": Utc::now(),
            "value": "on",
        })
        .to_string();
        let message = encrypt_for(json.as_bytes(), &f.publisher_key).unwrap();

        let result = f.ingestor.decode_set_command(SET_ADDR, &message);
        assert!(matches!(result, Err(CommandError::PolicyViolation { .. })));
        assert!(f.calls.lock().is_empty());
    }

    #[test]
    fn test_unencrypted_rejected() {
        let f = fixture();
        let message = f
            .admin
            .sign(&SetInputMessage {
                sender: SENDER.to_string(),
                timestamp: Utc::now(),
                value: "on".to_string(),
            })
            .unwrap();

        let result = f.ingestor.decode_set_command(SET_ADDR, &message);
        assert!(matches!(result, Err(CommandError::PolicyViolation { .. })));
    }

    #[test]
    fn test_incomplete_address() {
        let f = fixture();
        let message = set_command(&f, "on", Utc::now());
        let result = f.ingestor.decode_set_command("dom/pub1/node1/$set", &message);
        assert!(matches!(result, Err(CommandError::DecodeFailure { .. })));
    }

    #[test]
    fn test_unknown_input() {
        let f = fixture();
        let message = set_command(&f, "on", Utc::now());
        let result = f
            .ingestor
            .decode_set_command("dom/pub1/node1/switch/9/$set", &message);
        assert!(matches!(result, Err(CommandError::NotFound { .. })));
    }

    #[test]
    fn test_start_stop_subscriptions() {
        let f = fixture();
        assert_eq!(f.bus.subscription_count(), 0);

        f.ingestor.start().unwrap();
        f.ingestor.start().unwrap();
        assert_eq!(f.bus.subscriptions_for(SET_ADDR), 1);

        // created while running: subscribed immediately
        f.ingestor
            .create_input("node1", "dimmer", "0", recorder(&f.calls))
            .unwrap();
        assert_eq!(f.bus.subscription_count(), 2);

        assert!(f.ingestor.delete_input("node1", "dimmer", "0"));
        assert_eq!(f.bus.subscription_count(), 1);

        f.ingestor.stop();
        f.ingestor.stop();
        assert_eq!(f.bus.subscription_count(), 0);
        assert!(!f.ingestor.is_running());
    }

    #[test]
    fn test_command_over_bus() {
        let f = fixture();
        f.ingestor.start().unwrap();

        let message = set_command(&f, "on", Utc::now());
        f.bus.publish(SET_ADDR, &message, false).unwrap();

        assert_eq!(f.calls.lock().len(), 1);
    }

    #[test]
    fn test_rebind_node() {
        let f = fixture();
        f.ingestor.start().unwrap();

        assert_eq!(f.ingestor.rebind_node("node1", "kitchen").unwrap(), 1);
        assert_eq!(f.bus.subscriptions_for(SET_ADDR), 0);
        assert_eq!(
            f.bus
                .subscriptions_for("dom/pub1/kitchen/switch/0/$set"),
            1
        );

        let message = set_command(&f, "on", Utc::now());
        f.bus
            .publish("dom/pub1/kitchen/switch/0/$set", &message, false)
            .unwrap();

        let calls = f.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "dom/pub1/kitchen/switch/0/$input");
    }
}
