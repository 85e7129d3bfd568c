//! Worker registry entity and validation.
//!
//! A worker is a remote machine that runs the client half of the system.
//! Its identity (name, addresses) is persistent; `online` and `command_id`
//! are liveness fields written only by the protocol layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::DbId;

/// Maximum length of a worker name.
const MAX_NAME_LEN: usize = 200;

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: DbId,
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub online: bool,
    /// Id of the pending `online` handshake command, if any.
    pub command_id: Option<Uuid>,
}

/// DTO for registering a worker.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorker {
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
}

impl CreateWorker {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_worker_name(&self.name)?;
        parse_mac_address(&self.mac_address)?;
        self.ip_address
            .parse::<std::net::IpAddr>()
            .map_err(|_| CoreError::Validation(format!("Invalid IP address: {}", self.ip_address)))?;
        Ok(())
    }
}

/// Validate a worker name.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_NAME_LEN` characters.
pub fn validate_worker_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Worker name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Worker name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Parse a colon separated MAC address (`aa:bb:cc:dd:ee:ff`).
///
/// Exactly six groups of two hex digits are accepted.
pub fn parse_mac_address(mac: &str) -> Result<[u8; 6], CoreError> {
    let invalid = || CoreError::Validation(format!("Enter a valid MAC address: {mac}"));

    let mut bytes = [0u8; 6];
    let mut parts = mac.split(':');
    for byte in bytes.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_mac() {
        assert_eq!(
            parse_mac_address("00:1A:2b:3c:4D:ff").unwrap(),
            [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0xff]
        );
    }

    #[test]
    fn rejects_short_mac() {
        assert!(parse_mac_address("00:1a:2b:3c:4d").is_err());
    }

    #[test]
    fn rejects_long_mac() {
        assert!(parse_mac_address("00:1a:2b:3c:4d:5e:6f").is_err());
    }

    #[test]
    fn rejects_non_hex_group() {
        assert!(parse_mac_address("00:1a:2b:3c:4d:zz").is_err());
        assert!(parse_mac_address("00:1a:2b:3c:4d:5").is_err());
    }

    #[test]
    fn empty_worker_name_rejected() {
        assert!(validate_worker_name("  ").is_err());
    }

    #[test]
    fn create_worker_checks_ip() {
        let input = CreateWorker {
            name: "node-a".to_string(),
            ip_address: "not-an-ip".to_string(),
            mac_address: "00:00:00:00:00:01".to_string(),
        };
        assert!(input.validate().is_err());

        let input = CreateWorker {
            ip_address: "10.0.0.5".to_string(),
            ..input
        };
        assert!(input.validate().is_ok());
    }
}
