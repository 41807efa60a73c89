//! # Publisher Flows
//!
//! Identity trust across publishers, node renames with input rebinding and
//! node list persistence across restarts.

#[cfg(test)]
mod tests {
    use super::super::support::{config, started};
    use chrono::Utc;
    use iotd_03_publishers::{sign_identity, TrustState};
    use parking_lot::Mutex;
    use publisher_runtime::{Publisher, PublisherConfig};
    use shared_bus::{InMemoryMessageBus, MessageTransport};
    use shared_crypto::{sign_payload, Secp256k1KeyPair};
    use shared_types::entities::{attr, NodeAttrMap, PublisherIdentity, PublisherIdentityMessage};
    use shared_types::SetInputMessage;
    use std::sync::Arc;

    fn announcement(
        publisher_id: &str,
        keys: &Secp256k1KeyPair,
        dss: Option<&Secp256k1KeyPair>,
    ) -> (String, String) {
        let address = format!("test/{publisher_id}/$identity");
        let identity = PublisherIdentity {
            address: address.clone(),
            domain: "test".to_string(),
            publisher_id: publisher_id.to_string(),
            public_signing_key: keys.public_key().to_base64url(),
            timestamp: Utc::now(),
        };
        let identity_signature = dss.map(|dss| sign_identity(&identity, dss).unwrap());
        let message = PublisherIdentityMessage {
            identity,
            identity_signature,
        };
        let signed = sign_payload(&serde_json::to_vec(&message).unwrap(), keys).unwrap();
        (address, signed)
    }

    // =============================================================================
    // TRUST CHAIN
    // =============================================================================

    /// Test: Identities are trusted by address until the DSS appears, then
    /// only DSS-countersigned identities are accepted
    #[test]
    fn test_trust_escalation_across_publishers() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let device = started(&bus, config("device"));

        let early = Secp256k1KeyPair::generate();
        let (early_address, message) = announcement("early", &early, None);
        bus.publish(&early_address, &message, true).unwrap();
        assert_eq!(
            device.directory().get_publisher_key(&early_address),
            Some(early.public_key())
        );

        let dss_keys = Secp256k1KeyPair::generate();
        let dss_signing = Secp256k1KeyPair::from_bytes(dss_keys.to_bytes()).unwrap();
        let dss = Publisher::new(config("dss"), bus.clone(), dss_keys).unwrap();
        dss.start().unwrap();
        assert_eq!(
            device.trust_chain().trust_state(),
            TrustState::DssVerified {
                dss_key: dss_signing.public_key()
            }
        );

        // Unsigned rotation of a known publisher is refused
        let rotated = Secp256k1KeyPair::generate();
        let (_, message) = announcement("early", &rotated, None);
        bus.publish(&early_address, &message, true).unwrap();
        assert_eq!(
            device.directory().get_publisher_key(&early_address),
            Some(early.public_key())
        );
        assert_eq!(device.metrics().identities_rejected("trust_rejected"), 1.0);

        let late = Secp256k1KeyPair::generate();
        let (late_address, message) = announcement("late", &late, Some(&dss_signing));
        bus.publish(&late_address, &message, true).unwrap();
        assert_eq!(
            device.directory().get_publisher_key(&late_address),
            Some(late.public_key())
        );
    }

    /// Test: A publisher started after the DSS picks it up from the retained identity
    #[test]
    fn test_late_joiner_sees_retained_dss() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let dss = started(&bus, config("dss"));
        let device = started(&bus, config("device"));

        assert_eq!(
            device.trust_chain().trust_state().dss_key(),
            Some(dss.signer().public_key())
        );
    }

    #[test]
    fn test_signed_identities_required() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let device = started(
            &bus,
            PublisherConfig {
                require_signed_identity: true,
                ..config("device")
            },
        );

        let keys = Secp256k1KeyPair::generate();
        let message = PublisherIdentityMessage {
            identity: PublisherIdentity {
                address: "test/plain/$identity".to_string(),
                domain: "test".to_string(),
                publisher_id: "plain".to_string(),
                public_signing_key: keys.public_key().to_base64url(),
                timestamp: Utc::now(),
            },
            identity_signature: None,
        };
        bus.publish(
            "test/plain/$identity",
            &serde_json::to_string(&message).unwrap(),
            true,
        )
        .unwrap();

        assert!(device.directory().get_publisher("test/plain/$identity").is_none());
        assert_eq!(device.metrics().identities_rejected("policy_violation"), 1.0);
    }

    // =============================================================================
    // RENAMES
    // =============================================================================

    /// Test: After a rename, set commands reach the input at its new address only
    #[test]
    fn test_rename_moves_set_subscription() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let device = started(&bus, config("device"));
        let admin = started(&bus, config("admin"));
        device.nodes().create_node("dev1", "switch").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        device
            .create_input(
                "dev1",
                "switch",
                "0",
                Arc::new(move |input: &str, _: &str, value: &str| {
                    sink.lock().push((input.to_string(), value.to_string()));
                }),
            )
            .unwrap();

        assert!(device.set_node_id("dev1", "hall").unwrap());

        let key = device.signer().public_key();
        let command = |value: &str| SetInputMessage {
            sender: admin.identity_address(),
            timestamp: Utc::now(),
            value: value.to_string(),
        };
        let old = admin.signer().sign_and_encrypt(&command("old"), &key).unwrap();
        assert_eq!(
            bus.publish("test/device/dev1/switch/0/$set", &old, false)
                .unwrap(),
            0
        );
        let new = admin.signer().sign_and_encrypt(&command("new"), &key).unwrap();
        bus.publish("test/device/hall/switch/0/$set", &new, false)
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(
                "test/device/hall/switch/0/$input".to_string(),
                "new".to_string()
            )]
        );
    }

    #[test]
    fn test_rename_to_taken_id_refused() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let device = started(&bus, config("device"));
        device.nodes().create_node("dev1", "switch").unwrap();
        device.nodes().create_node("dev2", "switch").unwrap();

        assert!(!device.set_node_id("dev2", "dev1").unwrap());
        assert_eq!(
            device.nodes().get_node_by_node_id("dev1").unwrap().hw_id,
            "dev1"
        );
    }

    // =============================================================================
    // PERSISTENCE
    // =============================================================================

    /// Test: Node IDs and attributes survive a restart
    #[test]
    fn test_restart_restores_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-nodes.json");
        let config = PublisherConfig {
            nodes_file: Some(path.clone()),
            ..config("device")
        };

        let bus = Arc::new(InMemoryMessageBus::new());
        let first = started(&bus, config.clone());
        first.nodes().create_node("dev1", "sensor").unwrap();
        first.set_node_id("dev1", "porch").unwrap();
        let mut attrs = NodeAttrMap::new();
        attrs.insert(attr::MANUFACTURER.to_string(), "Acme".to_string());
        first.nodes().update_node_attr("dev1", &attrs);
        first.publish_updates().unwrap();
        first.stop().unwrap();

        let bus = Arc::new(InMemoryMessageBus::new());
        let second = started(&bus, config);
        let node = second.nodes().get_node_by_hw_id("dev1").unwrap();
        assert_eq!(node.node_id, "porch");
        assert_eq!(node.address, "test/device/porch/$node");
        assert_eq!(node.attr.get(attr::MANUFACTURER).map(String::as_str), Some("Acme"));

        // Restored nodes are published again on the new bus
        second.publish_updates().unwrap();
        assert!(bus.retained("test/device/porch/$node").is_some());
    }

    // =============================================================================
    // PUBLISH LOOP
    // =============================================================================

    /// Test: Nodes created while the loop runs are published by the next tick
    #[tokio::test]
    async fn test_run_loop_publishes_new_nodes() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let device = Arc::new(started(&bus, config("device")));
        let (shutdown, signal) = tokio::sync::watch::channel(false);

        let runner = device.clone();
        let task = tokio::spawn(async move { runner.run(signal).await });

        device.nodes().create_node("dev1", "sensor").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(bus.retained("test/device/dev1/$node").is_some());

        shutdown.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
