// src/session/filter.rs

//! Application filter descriptors.
//!
//! One descriptor per application flow, in the form
//!
//! ```text
//! <allow|deny> <proto> <src> to <dst> [; precedence=<n>]
//! ```
//!
//! where `<proto>` is one of `ip`, `tcp`, `udp`, `icmp` and the endpoints
//! are `any`, an IPv4 address, or an IPv4 prefix such as `8.8.8.8/32`.
//! Parsing is pure; malformed input is rejected with the invalid-argument
//! kind and never reaches the wire.

use crate::error::SimError;
use rs_pfcp::ie::gate_status::GateStatusValue;
use std::net::Ipv4Addr;

pub const DEFAULT_PRECEDENCE: u32 = 100;

/// A parsed application filter: the SDF flow description forwarded opaquely
/// to the codec, the gate the matching QER applies, and the PDR precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFilter {
    pub flow_description: String,
    pub gate: GateStatusValue,
    pub precedence: u32,
}

impl AppFilter {
    /// The implicit wildcard filter used when a request names none.
    pub fn allow_all() -> Self {
        AppFilter {
            flow_description: "permit out ip from any to any".to_string(),
            gate: GateStatusValue::Open,
            precedence: DEFAULT_PRECEDENCE,
        }
    }

    /// Parses one filter descriptor.
    pub fn parse(descriptor: &str) -> Result<Self, SimError> {
        let mut parts = descriptor.split(';');
        let rule = parts.next().unwrap_or_default().trim();

        let tokens: Vec<&str> = rule.split_whitespace().collect();
        let (verb, proto, src, kw, dst) = match tokens.as_slice() {
            [verb, proto, src, kw, dst] => (*verb, *proto, *src, *kw, *dst),
            _ => {
                return Err(malformed(
                    descriptor,
                    "expected '<allow|deny> <proto> <src> to <dst>'",
                ))
            }
        };
        if kw != "to" {
            return Err(malformed(descriptor, "expected 'to' between endpoints"));
        }

        let gate = match verb {
            "allow" => GateStatusValue::Open,
            "deny" => GateStatusValue::Closed,
            _ => return Err(malformed(descriptor, "action must be 'allow' or 'deny'")),
        };

        if !matches!(proto, "ip" | "tcp" | "udp" | "icmp") {
            return Err(malformed(descriptor, "protocol must be ip, tcp, udp or icmp"));
        }

        let src = endpoint(src).ok_or_else(|| malformed(descriptor, "bad source endpoint"))?;
        let dst = endpoint(dst).ok_or_else(|| malformed(descriptor, "bad destination endpoint"))?;

        let mut precedence = DEFAULT_PRECEDENCE;
        for option in parts {
            let option = option.trim();
            if option.is_empty() {
                continue;
            }
            match option.split_once('=') {
                Some(("precedence", value)) => {
                    precedence = value
                        .trim()
                        .parse()
                        .map_err(|_| malformed(descriptor, "precedence is not a number"))?;
                }
                _ => return Err(malformed(descriptor, "unknown filter option")),
            }
        }

        Ok(AppFilter {
            flow_description: format!("permit out {proto} from {src} to {dst}"),
            gate,
            precedence,
        })
    }
}

fn malformed(descriptor: &str, reason: &str) -> SimError {
    SimError::invalid_argument(format!("malformed application filter '{descriptor}': {reason}"))
}

/// Validates an endpoint token and returns it in canonical form.
fn endpoint(token: &str) -> Option<String> {
    if token == "any" {
        return Some("any".to_string());
    }
    match token.split_once('/') {
        Some((addr, len)) => {
            let addr: Ipv4Addr = addr.parse().ok()?;
            let len: u8 = len.parse().ok()?;
            if len > 32 {
                return None;
            }
            Some(format!("{addr}/{len}"))
        }
        None => {
            let addr: Ipv4Addr = token.parse().ok()?;
            Some(addr.to_string())
        }
    }
}
