// src/config.rs

//! Simulator configuration.
//!
//! One target UPF at a time: a single remote peer, the UPF N3 address used
//! for uplink F-TEIDs, and the local interface PFCP is sourced from. The
//! struct is set by the Configure operation and can also be loaded from a
//! YAML file by the CLI driver.

use crate::error::SimError;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::Path;

/// Connection parameters for the simulated control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Address of the PFCP peer, `host` or `host:port`. Port defaults to
    /// the PFCP port when omitted.
    pub remote_peer: String,
    /// N3 address of the target UPF, carried in uplink F-TEIDs.
    pub upf_n3: Ipv4Addr,
    /// Local network interface whose first IPv4 address sources PFCP.
    #[serde(default = "SimConfig::default_interface")]
    pub interface: String,
}

impl SimConfig {
    fn default_interface() -> String {
        "lo".to_string()
    }

    /// Builds a configuration from string-typed inputs, validating that the
    /// N3 address parses as IPv4.
    pub fn from_args(remote_peer: &str, upf_n3: &str, interface: &str) -> Result<Self, SimError> {
        if remote_peer.is_empty() {
            return Err(SimError::invalid_argument("remote peer address is empty"));
        }
        let upf_n3: Ipv4Addr = upf_n3.parse().map_err(|_| {
            SimError::invalid_argument(format!("'{upf_n3}' is not a valid IPv4 UPF N3 address"))
        })?;
        Ok(SimConfig {
            remote_peer: remote_peer.to_string(),
            upf_n3,
            interface: interface.to_string(),
        })
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SimError::invalid_argument(format!(
                "cannot read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        serde_yaml_ng::from_str(&raw)
            .map_err(|e| SimError::invalid_argument(format!("malformed config file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_parses_n3() {
        let cfg = SimConfig::from_args("10.0.0.1", "10.0.0.2", "eth0").unwrap();
        assert_eq!(cfg.remote_peer, "10.0.0.1");
        assert_eq!(cfg.upf_n3, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(cfg.interface, "eth0");
    }

    #[test]
    fn test_from_args_rejects_bad_n3() {
        let err = SimConfig::from_args("10.0.0.1", "not-an-ip", "eth0").unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn test_yaml_round_trip() {
        let cfg: SimConfig =
            serde_yaml_ng::from_str("remote_peer: 192.168.0.5\nupf_n3: 192.168.0.6\n").unwrap();
        assert_eq!(cfg.interface, "lo");
        assert_eq!(cfg.upf_n3, Ipv4Addr::new(192, 168, 0, 6));
    }
}
