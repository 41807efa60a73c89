//! # Address Scheme
//!
//! Builds and parses bus addresses.
//!
//! ```text
//! node level:   domain/publisherID/nodeID[/messageType]
//! io level:     domain/publisherID/nodeID/ioType/instance/messageType
//! identity:     domain/publisherID/$identity
//! ```
//!
//! All functions are pure; malformed input yields `None`, never a panic.

use std::fmt;

/// Single level wildcard token for subscriptions.
pub const WILDCARD: &str = "+";

/// Multi level wildcard token for subscriptions (last segment only).
pub const MULTI_WILDCARD: &str = "#";

/// Address separator.
pub const SEPARATOR: char = '/';

/// Publisher ID of the Domain Security Service.
pub const DSS_PUBLISHER_ID: &str = "dss";

/// Reserved message type tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Node discovery
    NodeDiscovery,
    /// Input discovery
    InputDiscovery,
    /// Configure command aimed at a node
    Configure,
    /// Set command aimed at an input
    Set,
    /// Publisher identity announcement
    Identity,
}

impl MessageType {
    /// Wire token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeDiscovery => "$node",
            Self::InputDiscovery => "$input",
            Self::Configure => "$configure",
            Self::Set => "$set",
            Self::Identity => "$identity",
        }
    }

    /// Parse a wire token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "$node" => Some(Self::NodeDiscovery),
            "$input" => Some(Self::InputDiscovery),
            "$configure" => Some(Self::Configure),
            "$set" => Some(Self::Set),
            "$identity" => Some(Self::Identity),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segments of an address. Missing trailing segments are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParts<'a> {
    pub domain: &'a str,
    pub publisher_id: &'a str,
    pub node_id: &'a str,
    pub message_type: Option<&'a str>,
    pub io_type: Option<&'a str>,
    pub instance: Option<&'a str>,
}

/// Split an address into its parts.
///
/// Node level addresses carry the message type in the fourth segment, io
/// level addresses carry it in the sixth. Returns `None` when fewer than
/// three segments are present.
#[must_use]
pub fn split_address(address: &str) -> Option<AddressParts<'_>> {
    let segments: Vec<&str> = address.split(SEPARATOR).collect();
    if segments.len() < 3 {
        return None;
    }
    let mut parts = AddressParts {
        domain: segments[0],
        publisher_id: segments[1],
        node_id: segments[2],
        message_type: None,
        io_type: None,
        instance: None,
    };
    match segments.len() {
        3 => {}
        4 | 5 => parts.message_type = Some(segments[3]),
        _ => {
            parts.io_type = Some(segments[3]);
            parts.instance = Some(segments[4]);
            parts.message_type = Some(segments[5]);
        }
    }
    Some(parts)
}

/// Node ID segment of an address.
#[must_use]
pub fn node_id_from_address(address: &str) -> Option<&str> {
    address.split(SEPARATOR).nth(2)
}

/// True when `segment` can be used as one address segment, such as a node ID.
///
/// Empty segments, separators and wildcards are refused, as is a leading `$`
/// which marks message type tokens.
#[must_use]
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('$')
        && !segment.contains([SEPARATOR, '+', '#'])
}

/// Replace the trailing segment with the given message type.
///
/// Used to derive a discovery address from a command address.
#[must_use]
pub fn replace_message_type(address: &str, message_type: MessageType) -> Option<String> {
    let (prefix, _) = address.rsplit_once(SEPARATOR)?;
    Some(format!("{prefix}{SEPARATOR}{message_type}"))
}

/// Address of a node: `domain/publisherID/nodeID[/messageType]`.
#[must_use]
pub fn make_node_address(
    domain: &str,
    publisher_id: &str,
    node_id: &str,
    message_type: Option<MessageType>,
) -> String {
    match message_type {
        Some(mt) => format!("{domain}/{publisher_id}/{node_id}/{mt}"),
        None => format!("{domain}/{publisher_id}/{node_id}"),
    }
}

/// Discovery address of a node: `domain/publisherID/nodeID/$node`.
#[must_use]
pub fn make_node_discovery_address(domain: &str, publisher_id: &str, node_id: &str) -> String {
    make_node_address(domain, publisher_id, node_id, Some(MessageType::NodeDiscovery))
}

/// Address to configure a node: `domain/publisherID/nodeID/$configure`.
#[must_use]
pub fn make_node_configure_address(domain: &str, publisher_id: &str, node_id: &str) -> String {
    make_node_address(domain, publisher_id, node_id, Some(MessageType::Configure))
}

/// Address of a node input or output.
#[must_use]
pub fn make_io_address(
    domain: &str,
    publisher_id: &str,
    node_id: &str,
    io_type: &str,
    instance: &str,
    message_type: MessageType,
) -> String {
    format!("{domain}/{publisher_id}/{node_id}/{io_type}/{instance}/{message_type}")
}

/// Discovery address of an input: `.../inputType/instance/$input`.
#[must_use]
pub fn make_input_discovery_address(
    domain: &str,
    publisher_id: &str,
    node_id: &str,
    input_type: &str,
    instance: &str,
) -> String {
    make_io_address(domain, publisher_id, node_id, input_type, instance, MessageType::InputDiscovery)
}

/// Address to set an input value: `.../inputType/instance/$set`.
#[must_use]
pub fn make_set_input_address(
    domain: &str,
    publisher_id: &str,
    node_id: &str,
    input_type: &str,
    instance: &str,
) -> String {
    make_io_address(domain, publisher_id, node_id, input_type, instance, MessageType::Set)
}

/// Identity address of a publisher: `domain/publisherID/$identity`.
#[must_use]
pub fn make_publisher_identity_address(domain: &str, publisher_id: &str) -> String {
    format!("{domain}/{publisher_id}/{}", MessageType::Identity)
}

/// Identity address of the domain's security service.
#[must_use]
pub fn make_dss_identity_address(domain: &str) -> String {
    make_publisher_identity_address(domain, DSS_PUBLISHER_ID)
}
