//! # Topic Matching
//!
//! Subscription patterns follow the usual pub/sub conventions:
//!
//! - `+` matches exactly one segment
//! - `#` matches any number of trailing segments (including none) and must be
//!   the last segment
//!
//! Wildcards must occupy a whole segment; `a/b+/c` is rejected.

use crate::BusError;

/// Single-level wildcard.
pub const SINGLE_LEVEL: &str = "+";
/// Multi-level wildcard.
pub const MULTI_LEVEL: &str = "#";

const SEPARATOR: char = '/';

/// Check that a publish address is concrete.
pub fn validate_address(address: &str) -> Result<(), BusError> {
    if address.is_empty() {
        return Err(BusError::InvalidAddress("empty address".into()));
    }
    if address.contains(['+', '#']) {
        return Err(BusError::InvalidAddress(format!(
            "wildcards not allowed in publish address '{address}'"
        )));
    }
    Ok(())
}

/// Check that a subscription pattern is well formed.
pub fn validate_pattern(pattern: &str) -> Result<(), BusError> {
    if pattern.is_empty() {
        return Err(BusError::InvalidPattern("empty pattern".into()));
    }
    let segments: Vec<&str> = pattern.split(SEPARATOR).collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            SINGLE_LEVEL => {}
            MULTI_LEVEL if i == last => {}
            MULTI_LEVEL => {
                return Err(BusError::InvalidPattern(format!(
                    "'#' must be the last segment in '{pattern}'"
                )))
            }
            s if s.contains(['+', '#']) => {
                return Err(BusError::InvalidPattern(format!(
                    "wildcard must be a whole segment in '{pattern}'"
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Returns true when `address` matches the subscription `pattern`.
#[must_use]
pub fn matches(pattern: &str, address: &str) -> bool {
    let mut pattern_segments = pattern.split(SEPARATOR);
    let mut address_segments = address.split(SEPARATOR);

    loop {
        match (pattern_segments.next(), address_segments.next()) {
            (Some(MULTI_LEVEL), _) => return true,
            (Some(SINGLE_LEVEL), Some(_)) => {}
            (Some(p), Some(a)) if p == a => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
