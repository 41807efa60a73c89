//! # Command Flows
//!
//! Configure and set commands sent from one publisher to another.
//!
//! ## Flow Tested
//!
//! ```text
//! admin ──$identity──→ device trust chain ──→ directory
//! admin ──sign+encrypt──→ $configure / $set ──→ device registries
//! device ──publish_updates──→ retained $node discovery
//! ```

#[cfg(test)]
mod tests {
    use super::super::support::{config, started};
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use publisher_runtime::Publisher;
    use shared_bus::{InMemoryMessageBus, MessageTransport};
    use shared_crypto::{encrypt_for, SignedEnvelope};
    use shared_types::entities::{attr, DataType, NodeAttrMap};
    use shared_types::{Node, NodeConfigureMessage, SetInputMessage};
    use std::sync::Arc;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Domain {
        bus: Arc<InMemoryMessageBus>,
        device: Publisher,
        admin: Publisher,
    }

    /// A device publisher with node `dev1` and an admin publisher both
    /// discovered by each other.
    fn domain() -> Domain {
        let bus = Arc::new(InMemoryMessageBus::new());
        let device = started(&bus, config("device"));
        let admin = started(&bus, config("admin"));
        device.nodes().create_node("dev1", "sensor").unwrap();
        Domain { bus, device, admin }
    }

    fn configure(admin: &Publisher, attrs: &[(&str, &str)]) -> NodeConfigureMessage {
        NodeConfigureMessage {
            sender: admin.identity_address(),
            timestamp: Utc::now(),
            attr: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<NodeAttrMap>(),
        }
    }

    fn set(admin: &Publisher, value: &str, age_secs: i64) -> SetInputMessage {
        SetInputMessage {
            sender: admin.identity_address(),
            timestamp: Utc::now() - Duration::seconds(age_secs),
            value: value.to_string(),
        }
    }

    /// Create input `dev1/switch/0` that records received values.
    fn recording_input(device: &Publisher) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        device
            .create_input(
                "dev1",
                "switch",
                "0",
                Arc::new(move |_: &str, _: &str, value: &str| sink.lock().push(value.to_string())),
            )
            .unwrap();
        seen
    }

    const CONFIGURE: &str = "test/device/dev1/$configure";
    const SET: &str = "test/device/dev1/switch/0/$set";

    // =============================================================================
    // CONFIGURE COMMANDS
    // =============================================================================

    #[test]
    fn test_configure_applied_and_republished() {
        let d = domain();
        d.device.publish_updates().unwrap();

        let command = configure(&d.admin, &[(attr::NAME, "porch light")]);
        let message = d
            .admin
            .signer()
            .sign_and_encrypt(&command, &d.device.signer().public_key())
            .unwrap();
        d.bus.publish(CONFIGURE, &message, false).unwrap();

        assert_eq!(
            d.device.nodes().get_node_attr("dev1", attr::NAME).as_deref(),
            Some("porch light")
        );

        let counts = d.device.publish_updates().unwrap();
        assert_eq!(counts.nodes, 1);
        let retained = d.bus.retained("test/device/dev1/$node").unwrap();
        let node: Node =
            serde_json::from_slice(SignedEnvelope::parse(&retained).unwrap().payload()).unwrap();
        assert_eq!(node.attr.get(attr::NAME).map(String::as_str), Some("porch light"));
    }

    /// Test: Config default applies until a configure command sets a value
    #[test]
    fn test_config_precedence() {
        let d = domain();
        d.device
            .nodes()
            .create_node_config("dev1", "pollInterval", DataType::Int, "Poll interval", "10")
            .unwrap();
        assert_eq!(
            d.device.nodes().get_node_config_int("dev1", "pollInterval", 5).value,
            10
        );

        let command = configure(&d.admin, &[("pollInterval", "42"), ("unknownKey", "1")]);
        let message = d
            .admin
            .signer()
            .sign_and_encrypt(&command, &d.device.signer().public_key())
            .unwrap();
        d.bus.publish(CONFIGURE, &message, false).unwrap();

        let value = d.device.nodes().get_node_config_int("dev1", "pollInterval", 5);
        assert!(value.is_ok());
        assert_eq!(value.value, 42);
        assert_eq!(d.device.nodes().get_node_attr("dev1", "unknownKey"), None);
    }

    /// Test: Unencrypted or unsigned configure commands change nothing
    #[test]
    fn test_configure_security_gate() {
        let d = domain();
        let command = configure(&d.admin, &[(attr::NAME, "intruder")]);

        let signed_only = d.admin.signer().sign(&command).unwrap();
        d.bus.publish(CONFIGURE, &signed_only, false).unwrap();

        let json = serde_json::to_vec(&command).unwrap();
        let encrypted_only = encrypt_for(&json, &d.device.signer().public_key()).unwrap();
        d.bus.publish(CONFIGURE, &encrypted_only, false).unwrap();

        assert_eq!(d.device.nodes().get_node_attr("dev1", attr::NAME), None);
    }

    #[test]
    fn test_configure_from_undiscovered_sender_rejected() {
        let d = domain();
        let mut command = configure(&d.admin, &[(attr::NAME, "intruder")]);
        command.sender = "test/stranger/$identity".to_string();
        let message = d
            .admin
            .signer()
            .sign_and_encrypt(&command, &d.device.signer().public_key())
            .unwrap();
        d.bus.publish(CONFIGURE, &message, false).unwrap();

        assert_eq!(d.device.nodes().get_node_attr("dev1", attr::NAME), None);
    }

    // =============================================================================
    // SET COMMANDS
    // =============================================================================

    /// Test: A newer command followed by an older one only applies the newer
    #[test]
    fn test_set_replay_rejected() {
        let d = domain();
        let seen = recording_input(&d.device);
        let key = d.device.signer().public_key();

        let newer = d.admin.signer().sign_and_encrypt(&set(&d.admin, "on", 0), &key).unwrap();
        let older = d.admin.signer().sign_and_encrypt(&set(&d.admin, "off", 10), &key).unwrap();
        d.bus.publish(SET, &newer, false).unwrap();
        d.bus.publish(SET, &older, false).unwrap();
        d.bus.publish(SET, &newer, false).unwrap();

        assert_eq!(*seen.lock(), vec!["on".to_string()]);
    }

    #[test]
    fn test_set_in_order_accepted() {
        let d = domain();
        let seen = recording_input(&d.device);
        let key = d.device.signer().public_key();

        let first = d.admin.signer().sign_and_encrypt(&set(&d.admin, "off", 10), &key).unwrap();
        let second = d.admin.signer().sign_and_encrypt(&set(&d.admin, "on", 0), &key).unwrap();
        d.bus.publish(SET, &first, false).unwrap();
        d.bus.publish(SET, &second, false).unwrap();

        assert_eq!(*seen.lock(), vec!["off".to_string(), "on".to_string()]);
    }

    #[test]
    fn test_set_security_gate() {
        let d = domain();
        let seen = recording_input(&d.device);
        let command = set(&d.admin, "on", 0);

        let signed_only = d.admin.signer().sign(&command).unwrap();
        d.bus.publish(SET, &signed_only, false).unwrap();

        let json = serde_json::to_vec(&command).unwrap();
        let encrypted_only = encrypt_for(&json, &d.device.signer().public_key()).unwrap();
        d.bus.publish(SET, &encrypted_only, false).unwrap();

        assert!(seen.lock().is_empty());
    }

    /// Test: Set commands do not mutate the node registry
    #[test]
    fn test_set_leaves_registry_untouched() {
        let d = domain();
        let _seen = recording_input(&d.device);
        d.device.publish_updates().unwrap();

        let message = d
            .admin
            .signer()
            .sign_and_encrypt(&set(&d.admin, "on", 0), &d.device.signer().public_key())
            .unwrap();
        d.bus.publish(SET, &message, false).unwrap();

        assert!(d.device.nodes().get_updated_nodes(false).is_empty());
        assert!(d.device.inputs().get_updated_inputs(false).is_empty());
    }
}
