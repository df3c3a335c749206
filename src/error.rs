// src/error.rs

//! Simulator error taxonomy.
//!
//! Every fallible operation in the crate surfaces one of four semantic
//! kinds. The RPC-facing status mapping lives in [`crate::service`]; this
//! module only carries the kind and a human-readable message.

use std::fmt;

/// Semantic error kind used across the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A caller violated an operation precondition: the service is not
    /// configured or associated, the registry is too small for the request,
    /// or a rule builder was driven without a required field.
    Precondition(String),
    /// The request itself cannot be acted on: unparseable address pool,
    /// malformed application filter, too many filters.
    InvalidArgument(String),
    /// The PFCP peer or the transport failed. The message carries whatever
    /// the client adapter reported, unchanged.
    Remote(String),
    /// Internal inconsistency, e.g. a registry miss for a session the
    /// controller believes it installed.
    Internal(String),
}

impl SimError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        SimError::Precondition(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        SimError::InvalidArgument(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        SimError::Remote(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SimError::Internal(msg.into())
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            SimError::Precondition(m)
            | SimError::InvalidArgument(m)
            | SimError::Remote(m)
            | SimError::Internal(m) => m,
        }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Precondition(m) => write!(f, "precondition violation: {m}"),
            SimError::InvalidArgument(m) => write!(f, "invalid argument: {m}"),
            SimError::Remote(m) => write!(f, "remote failure: {m}"),
            SimError::Internal(m) => write!(f, "internal error: {m}"),
        }
    }
}

impl std::error::Error for SimError {}
