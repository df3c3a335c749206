//! # rs-pfcpsim
//!
//! A control-plane PFCP simulator for exercising UPF implementations. It
//! impersonates the SMF side of the N4 reference point and drives a remote
//! UPF (or UPF-agent) through the full lifecycle: node association, session
//! establishment, modification and deletion.
//!
//! The wire codec and message framing come from the [`rs-pfcp`] crate; this
//! crate contributes what a load generator needs on top of a codec:
//!
//! - fluent per-rule builders ([`session`]) that assemble the PDR/FAR/QER/URR
//!   graph of a session for any lifecycle phase,
//! - a deterministic identifier scheme packing every session into a fixed
//!   band of TEIDs and rule IDs,
//! - a batched [`controller`] that validates state, allocates UE addresses
//!   and drives the [`client`] adapter,
//! - a serialized [`service`] façade returning RPC-style status codes.
//!
//! ## Quick start
//!
//! ```no_run
//! use rs_pfcpsim::client::N4Client;
//! use rs_pfcpsim::controller::CreateSessionRequest;
//! use rs_pfcpsim::service::Service;
//!
//! let service = Service::new(N4Client::new());
//! service.configure("192.168.0.10", "192.168.0.20", "eth0");
//! service.associate();
//! let response = service.create_session(&CreateSessionRequest {
//!     base_id: 1,
//!     count: 2,
//!     node_b_address: "140.0.0.1".parse().unwrap(),
//!     ue_address_pool: "17.0.0.0/24".to_string(),
//!     ul_tunnel_dst: None,
//!     dl_tunnel_dst: None,
//!     teid_allocation: false,
//!     qfi: 9,
//!     app_filters: vec!["allow ip any to 8.8.8.8/32; precedence=100".to_string()],
//! });
//! assert!(response.is_ok());
//! ```
//!
//! [`rs-pfcp`]: https://docs.rs/rs-pfcp

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod registry;
pub mod service;
pub mod session;
