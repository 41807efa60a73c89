//! # Outbound Ports (Driven Ports)

/// Receives the value of an accepted set command.
///
/// Called with the input's discovery address, the sender's identity address
/// and the requested value. Authorization beyond the signature check is the
/// handler's responsibility.
pub trait InputHandler: Send + Sync {
    fn on_set(&self, input_address: &str, sender: &str, value: &str);
}

impl<F> InputHandler for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn on_set(&self, input_address: &str, sender: &str, value: &str) {
        self(input_address, sender, value)
    }
}
