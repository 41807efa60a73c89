//! # Registered Nodes
//!
//! Copy-on-write registry of the nodes owned by one publisher.
//!
//! ## Concurrency
//!
//! One mutex guards the device map, the node map and the pending updates.
//! Every public method holds it for its whole duration, so a
//! read-clone-modify-replace-mark sequence is atomic per node.
//!
//! ## Immutability
//!
//! Registered nodes are `Arc<Node>` snapshots. A change clones the current
//! snapshot, modifies the clone and swaps it into both maps. Callers holding
//! an older snapshot keep seeing the old values.

use super::node::{new_node, parse_bool, ConfigValue};
use crate::adapters::json_file;
use crate::domain::errors::PersistenceError;
use chrono::Utc;
use parking_lot::Mutex;
use shared_types::address;
use shared_types::entities::{
    status, ConfigAttr, DataType, Node, NodeAttrMap, NodeStatusMap,
};
use shared_types::RegistryError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A pending publication produced by a registry change.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeUpdate {
    /// The node was created or changed; publish the snapshot.
    Published(Arc<Node>),
    /// The address is no longer in use (node deleted or renamed).
    Retired { address: String },
}

impl NodeUpdate {
    /// Discovery address this update applies to.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Published(node) => &node.address,
            Self::Retired { address } => address,
        }
    }
}

#[derive(Default)]
struct NodeIndex {
    /// hwID -> node
    device_map: HashMap<String, Arc<Node>>,
    /// nodeID -> node
    node_map: HashMap<String, Arc<Node>>,
    /// discovery address -> pending publication
    updated: HashMap<String, NodeUpdate>,
}

impl NodeIndex {
    /// Register a new snapshot and mark it for publication.
    fn replace(&mut self, mut node: Node) -> Arc<Node> {
        node.timestamp = Utc::now();
        let node = Arc::new(node);
        self.device_map.insert(node.hw_id.clone(), node.clone());
        self.node_map.insert(node.node_id.clone(), node.clone());
        self.updated
            .insert(node.address.clone(), NodeUpdate::Published(node.clone()));
        node
    }

    fn retire(&mut self, address: String) {
        self.updated
            .insert(address.clone(), NodeUpdate::Retired { address });
    }

    /// Clone the node with `hw_id`, let `change` modify the clone and
    /// register it when `change` reports a difference.
    fn modify(&mut self, hw_id: &str, change: impl FnOnce(&mut Node) -> bool) -> bool {
        let Some(current) = self.device_map.get(hw_id) else {
            debug!(hw_id = hw_id, "Update of unknown node ignored");
            return false;
        };
        let mut next = Node::clone(current);
        if !change(&mut next) {
            return false;
        }
        self.replace(next);
        true
    }
}

/// Registry of the nodes managed by a publisher.
pub struct RegisteredNodes {
    domain: String,
    publisher_id: String,
    index: Mutex<NodeIndex>,
}

impl RegisteredNodes {
    /// Create an empty registry for a publisher.
    pub fn new(domain: impl Into<String>, publisher_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            publisher_id: publisher_id.into(),
            index: Mutex::new(NodeIndex::default()),
        }
    }

    /// Domain of the owning publisher.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// ID of the owning publisher.
    #[must_use]
    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    // =========================================================================
    // CREATION AND REMOVAL
    // =========================================================================

    /// Copy of a node with its own attribute, config and status maps.
    ///
    /// The only sanctioned starting point for building a modified node.
    #[must_use]
    pub fn clone_node(&self, node: &Node) -> Node {
        node.clone()
    }

    /// Create a node for a device or service.
    ///
    /// Idempotent: an existing node with the same hardware ID is returned
    /// unchanged. Returns `None` for an empty hardware ID or node type.
    pub fn create_node(&self, hw_id: &str, node_type: &str) -> Option<Arc<Node>> {
        let mut index = self.index.lock();
        if let Some(existing) = index.device_map.get(hw_id) {
            return Some(existing.clone());
        }
        let node = new_node(&self.domain, &self.publisher_id, hw_id, node_type)?;
        let node = index.replace(node);
        info!(hw_id = hw_id, node_type = node_type, address = %node.address, "Node created");
        Some(node)
    }

    /// Create or update a configuration descriptor of a node.
    ///
    /// An existing descriptor has its datatype, description and default
    /// replaced. Returns `None` when the node does not exist.
    pub fn create_node_config(
        &self,
        hw_id: &str,
        attr_name: &str,
        data_type: DataType,
        description: &str,
        default_value: &str,
    ) -> Option<ConfigAttr> {
        let config = ConfigAttr::new(data_type, description, default_value);
        let mut index = self.index.lock();
        let created = index.modify(hw_id, |node| {
            node.config.insert(attr_name.to_string(), config.clone());
            true
        });
        created.then_some(config)
    }

    /// Remove a node and retire its discovery address.
    pub fn delete_node(&self, hw_id: &str) -> bool {
        let mut index = self.index.lock();
        let Some(node) = index.device_map.remove(hw_id) else {
            return false;
        };
        if index
            .node_map
            .get(&node.node_id)
            .is_some_and(|n| n.hw_id == node.hw_id)
        {
            index.node_map.remove(&node.node_id);
        }
        index.retire(node.address.clone());
        info!(hw_id = hw_id, address = %node.address, "Node deleted");
        true
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// All registered nodes, ordered by hardware ID.
    #[must_use]
    pub fn get_all_nodes(&self) -> Vec<Arc<Node>> {
        let index = self.index.lock();
        let mut nodes: Vec<Arc<Node>> = index.device_map.values().cloned().collect();
        nodes.sort_by(|a, b| a.hw_id.cmp(&b.hw_id));
        nodes
    }

    /// Attribute value of a node. `None` if the node or attribute is unknown.
    #[must_use]
    pub fn get_node_attr(&self, hw_id: &str, attr_name: &str) -> Option<String> {
        let index = self.index.lock();
        index
            .device_map
            .get(hw_id)
            .and_then(|node| node.attr.get(attr_name).cloned())
    }

    /// Node addressed by any address whose third segment is the node ID.
    #[must_use]
    pub fn get_node_by_address(&self, address: &str) -> Option<Arc<Node>> {
        let node_id = address::node_id_from_address(address)?;
        self.get_node_by_node_id(node_id)
    }

    #[must_use]
    pub fn get_node_by_hw_id(&self, hw_id: &str) -> Option<Arc<Node>> {
        self.index.lock().device_map.get(hw_id).cloned()
    }

    #[must_use]
    pub fn get_node_by_node_id(&self, node_id: &str) -> Option<Arc<Node>> {
        self.index.lock().node_map.get(node_id).cloned()
    }

    // =========================================================================
    // CONFIGURATION VALUES
    // =========================================================================

    /// Configuration value of a node as a string.
    ///
    /// Precedence: the attribute value, then the configuration default, then
    /// `default`. An unknown node or configuration key yields `default` with
    /// a `NotFound` error.
    #[must_use]
    pub fn get_node_config_string(
        &self,
        hw_id: &str,
        attr_name: &str,
        default: &str,
    ) -> ConfigValue<String> {
        let index = self.index.lock();
        let Some(node) = index.device_map.get(hw_id) else {
            return ConfigValue::fallback(
                default.to_string(),
                RegistryError::NotFound(format!("device '{hw_id}'")),
            );
        };
        let Some(config) = node.config.get(attr_name) else {
            return ConfigValue::fallback(
                default.to_string(),
                RegistryError::NotFound(format!("configuration '{attr_name}' of '{hw_id}'")),
            );
        };
        let value = match node.attr.get(attr_name) {
            Some(v) if !v.is_empty() => v.as_str(),
            _ => config.default_value.as_str(),
        };
        if value.is_empty() {
            ConfigValue::ok(default.to_string())
        } else {
            ConfigValue::ok(value.to_string())
        }
    }

    #[must_use]
    pub fn get_node_config_bool(&self, hw_id: &str, attr_name: &str, default: bool) -> ConfigValue<bool> {
        self.get_node_config_parsed(hw_id, attr_name, default, "boolean", parse_bool)
    }

    #[must_use]
    pub fn get_node_config_int(&self, hw_id: &str, attr_name: &str, default: i64) -> ConfigValue<i64> {
        self.get_node_config_parsed(hw_id, attr_name, default, "integer", |v| v.parse().ok())
    }

    #[must_use]
    pub fn get_node_config_float(&self, hw_id: &str, attr_name: &str, default: f32) -> ConfigValue<f32> {
        self.get_node_config_parsed(hw_id, attr_name, default, "float", |v| v.parse().ok())
    }

    fn get_node_config_parsed<T>(
        &self,
        hw_id: &str,
        attr_name: &str,
        default: T,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> ConfigValue<T> {
        let raw = self.get_node_config_string(hw_id, attr_name, "");
        if let Some(error) = raw.error {
            return ConfigValue::fallback(default, error);
        }
        if raw.value.is_empty() {
            return ConfigValue::ok(default);
        }
        match parse(&raw.value) {
            Some(value) => ConfigValue::ok(value),
            None => ConfigValue::fallback(
                default,
                RegistryError::ValueFormat {
                    hw_id: hw_id.to_string(),
                    attr: attr_name.to_string(),
                    expected,
                    value: raw.value,
                },
            ),
        }
    }

    // =========================================================================
    // UPDATES
    // =========================================================================

    /// Merge attribute values. Republishes only when a value differs.
    pub fn update_node_attr(&self, hw_id: &str, attrs: &NodeAttrMap) -> bool {
        self.index.lock().modify(hw_id, |node| merge(&mut node.attr, attrs))
    }

    /// Merge status values. Republishes only when a value differs.
    pub fn update_node_status(&self, hw_id: &str, statuses: &NodeStatusMap) -> bool {
        self.index
            .lock()
            .modify(hw_id, |node| merge(&mut node.status, statuses))
    }

    /// Set the run state and last error together.
    pub fn update_error_status(&self, hw_id: &str, run_state: &str, error_msg: &str) -> bool {
        let mut statuses = NodeStatusMap::new();
        statuses.insert(status::RUN_STATE.to_string(), run_state.to_string());
        statuses.insert(status::LAST_ERROR.to_string(), error_msg.to_string());
        self.update_node_status(hw_id, &statuses)
    }

    /// Apply configuration values.
    ///
    /// Only keys with a configuration descriptor are applied; others are
    /// logged and ignored. Returns true when a value changed.
    pub fn update_node_config_values(&self, hw_id: &str, params: &NodeAttrMap) -> bool {
        self.index.lock().modify(hw_id, |node| {
            let mut changed = false;
            for (key, value) in params {
                if !node.config.contains_key(key) {
                    warn!(hw_id = hw_id, attr = %key, "Attribute is not a configuration, ignored");
                    continue;
                }
                if node.attr.get(key) != Some(value) {
                    node.attr.insert(key.clone(), value.clone());
                    changed = true;
                }
            }
            changed
        })
    }

    /// Replace a configuration descriptor, keeping the current value.
    pub fn update_node_config(&self, hw_id: &str, attr_name: &str, config: ConfigAttr) -> bool {
        if attr_name.is_empty() {
            return false;
        }
        self.index.lock().modify(hw_id, |node| {
            node.config.insert(attr_name.to_string(), config);
            true
        })
    }

    /// Register a batch of nodes, replacing those with the same hardware ID.
    ///
    /// Missing node IDs, addresses and publisher IDs are filled in. Nodes
    /// with an invalid node ID, or a node ID owned by another hardware ID,
    /// are skipped. Returns the number of nodes registered.
    pub fn update_nodes(&self, nodes: Vec<Node>) -> usize {
        let mut index = self.index.lock();
        let mut registered = 0;
        for mut node in nodes {
            if node.hw_id.is_empty() {
                warn!(address = %node.address, "Skipping node without hardware ID");
                continue;
            }
            if node.node_id.is_empty() {
                node.node_id = node.hw_id.clone();
            }
            if !address::is_valid_segment(&node.node_id) {
                warn!(hw_id = %node.hw_id, node_id = %node.node_id, "Skipping node with invalid node ID");
                continue;
            }
            if let Some(holder) = index.node_map.get(&node.node_id) {
                if holder.hw_id != node.hw_id {
                    warn!(
                        hw_id = %node.hw_id,
                        node_id = %node.node_id,
                        owner = %holder.hw_id,
                        "Skipping node, node ID already in use"
                    );
                    continue;
                }
            }
            if node.publisher_id.is_empty() {
                node.publisher_id = self.publisher_id.clone();
            }
            if node.address.is_empty() {
                node.address =
                    address::make_node_discovery_address(&self.domain, &self.publisher_id, &node.node_id);
            }
            if let Some(previous) = index.device_map.get(&node.hw_id).cloned() {
                if previous.node_id != node.node_id {
                    index.node_map.remove(&previous.node_id);
                }
                if previous.address != node.address {
                    index.retire(previous.address.clone());
                }
            }
            index.replace(node);
            registered += 1;
        }
        registered
    }

    /// Change the node ID, and so the address, of a node.
    ///
    /// An empty ID restores the hardware ID. Fails when the node is unknown,
    /// the ID is not a valid address segment or another node already uses it. On success the old address is
    /// retired and the node is republished under the new one.
    pub fn set_node_id(&self, node: &Node, new_node_id: &str) -> bool {
        let mut index = self.index.lock();
        let Some(current) = index.device_map.get(&node.hw_id).cloned() else {
            return false;
        };
        let target = if new_node_id.is_empty() {
            current.hw_id.as_str()
        } else {
            new_node_id
        };
        if target == current.node_id {
            return true;
        }
        if !address::is_valid_segment(target) {
            warn!(hw_id = %current.hw_id, node_id = target, "Invalid node ID");
            return false;
        }
        if let Some(holder) = index.node_map.get(target) {
            if holder.hw_id != current.hw_id {
                warn!(
                    hw_id = %current.hw_id,
                    node_id = target,
                    owner = %holder.hw_id,
                    "Node ID already in use"
                );
                return false;
            }
        }

        index.node_map.remove(&current.node_id);
        index.retire(current.address.clone());

        let mut renamed = Node::clone(&current);
        renamed.node_id = target.to_string();
        renamed.address =
            address::make_node_discovery_address(&self.domain, &self.publisher_id, target);
        let renamed = index.replace(renamed);
        info!(
            hw_id = %renamed.hw_id,
            old_node_id = %current.node_id,
            new_node_id = %renamed.node_id,
            "Node ID changed"
        );
        true
    }

    /// Pending publications, optionally clearing them.
    pub fn get_updated_nodes(&self, clear: bool) -> Vec<NodeUpdate> {
        let mut index = self.index.lock();
        if clear {
            std::mem::take(&mut index.updated).into_values().collect()
        } else {
            index.updated.values().cloned().collect()
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Load nodes saved by [`RegisteredNodes::save_nodes`].
    pub fn load_nodes(&self, path: &Path) -> Result<usize, PersistenceError> {
        let nodes = json_file::read_nodes(path)?;
        let read = nodes.len();
        let count = self.update_nodes(nodes);
        info!(path = %path.display(), nodes = count, skipped = read - count, "Node list loaded");
        Ok(count)
    }

    /// Save all nodes as a JSON array, replacing the file.
    pub fn save_nodes(&self, path: &Path) -> Result<usize, PersistenceError> {
        let nodes = self.get_all_nodes();
        json_file::write_nodes(path, &nodes)?;
        info!(path = %path.display(), nodes = nodes.len(), "Node list saved");
        Ok(nodes.len())
    }
}

fn merge(target: &mut HashMap<String, String>, values: &HashMap<String, String>) -> bool {
    let mut changed = false;
    for (key, value) in values {
        if target.get(key) != Some(value) {
            target.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}
