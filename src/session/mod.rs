// src/session/mod.rs

//! Session rule builders and the application filter grammar.
//!
//! Each builder assembles one grouped PFCP Information Element (PDR, FAR,
//! QER or URR) for a lifecycle phase, wiring typed leaf IEs from `rs_pfcp`
//! into the Create/Update/Remove wrapper the wire contract expects.

pub mod far;
pub mod filter;
pub mod pdr;
pub mod qer;
pub mod urr;

pub use far::FarBuilder;
pub use filter::AppFilter;
pub use pdr::PdrBuilder;
pub use qer::QerBuilder;
pub use urr::{ReportingTrigger, UrrBuilder, UsageVolume};

use rs_pfcp::ie::{Ie, IeType};

/// Lifecycle phase a rule builder emits.
///
/// Create wraps the rule in its `Create*` IE, Update in its `Update*` IE,
/// and Delete in a `Remove*` IE embedding a Create populated with whatever
/// values the builder holds, so the rule stays addressable by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleMethod {
    #[default]
    Create,
    Update,
    Delete,
}

/// Concatenates child IEs into a grouped IE payload.
pub(crate) fn grouped(ie_type: IeType, children: &[Ie]) -> Ie {
    let mut payload = Vec::new();
    for child in children {
        payload.extend_from_slice(&child.marshal());
    }
    Ie::new(ie_type, payload)
}
