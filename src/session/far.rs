// src/session/far.rs

//! Forwarding Action Rule builder.

use crate::error::SimError;
use crate::session::{grouped, RuleMethod};
use rs_pfcp::ie::apply_action::ApplyAction;
use rs_pfcp::ie::destination_interface::{DestinationInterface, Interface};
use rs_pfcp::ie::far_id::FarId;
use rs_pfcp::ie::outer_header_creation::OuterHeaderCreation;
use rs_pfcp::ie::pfcpsm_req_flags::PfcpsmReqFlags;
use rs_pfcp::ie::{Ie, IeType};
use std::net::Ipv4Addr;

/// Assembles a Create/Update/Remove FAR grouped IE.
///
/// The action is a raw [`ApplyAction`] mask. When the mask includes BUFF or
/// NOCP, a previously set tunnel TEID is silently zeroed: a buffering FAR
/// must not point at a downlink tunnel.
#[derive(Debug, Clone, Default)]
pub struct FarBuilder {
    id: Option<u32>,
    method: RuleMethod,
    action: Option<ApplyAction>,
    dst_interface: Option<Interface>,
    tunnel_dst: Option<Ipv4Addr>,
    teid: Option<u32>,
    end_marker: bool,
}

impl FarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn method(mut self, method: RuleMethod) -> Self {
        self.method = method;
        self
    }

    pub fn action(mut self, action: ApplyAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn dst_interface(mut self, interface: Interface) -> Self {
        self.dst_interface = Some(interface);
        self
    }

    /// Outer GTP-U tunnel destination: the core-side peer for uplink FARs,
    /// the eNodeB/gNodeB for downlink FARs.
    pub fn tunnel_dst(mut self, address: Ipv4Addr) -> Self {
        self.tunnel_dst = Some(address);
        self
    }

    /// Downlink tunnel TEID.
    pub fn teid(mut self, teid: u32) -> Self {
        self.teid = Some(teid);
        self
    }

    /// Ask the UPF to send a GTP-U end marker on the old path.
    pub fn end_marker(mut self, enabled: bool) -> Self {
        self.end_marker = enabled;
        self
    }

    pub fn build(self) -> Result<Ie, SimError> {
        let id = self
            .id
            .ok_or_else(|| SimError::precondition("FAR ID is required"))?;

        if let RuleMethod::Delete = self.method {
            let create = grouped(
                IeType::CreateFar,
                &[
                    FarId::new(id).to_ie(),
                    apply_action_ie(self.action.unwrap_or_else(ApplyAction::empty)),
                ],
            );
            return Ok(grouped(IeType::RemoveFar, &[create]));
        }

        let action = self
            .action
            .ok_or_else(|| SimError::precondition("FAR action is required"))?;

        // A buffering or notifying FAR keeps its ID addressable but must
        // not carry a live downlink tunnel.
        let teid = if action.intersects(ApplyAction::BUFF | ApplyAction::NOCP) {
            self.teid.map(|_| 0)
        } else {
            self.teid
        };

        let (wrapper, params_type) = match self.method {
            RuleMethod::Create => (IeType::CreateFar, IeType::ForwardingParameters),
            RuleMethod::Update => (IeType::UpdateFar, IeType::UpdateForwardingParameters),
            RuleMethod::Delete => unreachable!(),
        };

        let mut children = vec![FarId::new(id).to_ie(), apply_action_ie(action)];

        if let Some(interface) = self.dst_interface {
            let mut params = vec![DestinationInterface::new(interface).to_ie()];
            if let Some(dst) = self.tunnel_dst {
                params.push(OuterHeaderCreation::gtpu_ipv4(teid.unwrap_or(0), dst).to_ie());
            }
            if self.end_marker {
                params.push(Ie::new(
                    IeType::PfcpsmReqFlags,
                    PfcpsmReqFlags::SNDEM.marshal().to_vec(),
                ));
            }
            children.push(grouped(params_type, &params));
        }

        Ok(grouped(wrapper, &children))
    }
}

fn apply_action_ie(action: ApplyAction) -> Ie {
    Ie::new(IeType::ApplyAction, action.marshal().to_vec())
}
