// src/session/pdr.rs

//! Packet Detection Rule builder.

use crate::error::SimError;
use crate::session::{grouped, RuleMethod};
use rs_pfcp::ie::f_teid::FteidBuilder;
use rs_pfcp::ie::far_id::FarId;
use rs_pfcp::ie::outer_header_removal::OuterHeaderRemoval;
use rs_pfcp::ie::pdr_id::PdrId;
use rs_pfcp::ie::precedence::Precedence;
use rs_pfcp::ie::qer_id::QerId;
use rs_pfcp::ie::sdf_filter::SdfFilter;
use rs_pfcp::ie::source_interface::{SourceInterface, SourceInterfaceValue};
use rs_pfcp::ie::ue_ip_address::UeIpAddress;
use rs_pfcp::ie::{Ie, IeType};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Uplink,
    Downlink,
}

/// Assembles a Create/Update/Remove PDR grouped IE.
///
/// Uplink PDRs match GTP-U traffic arriving on N3 and must carry an F-TEID
/// (TEID plus the UPF N3 address); downlink PDRs match by UE address.
/// Setting fields from the wrong side is a precondition failure at build
/// time.
#[derive(Debug, Clone, Default)]
pub struct PdrBuilder {
    id: Option<u16>,
    method: RuleMethod,
    precedence: u32,
    teid: Option<u32>,
    n3_address: Option<Ipv4Addr>,
    ue_address: Option<Ipv4Addr>,
    sdf_filter: Option<String>,
    far_id: Option<u32>,
    qer_ids: Vec<u32>,
    direction: Option<Direction>,
    teid_allocation: bool,
}

impl PdrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: u16) -> Self {
        self.id = Some(id);
        self
    }

    pub fn method(mut self, method: RuleMethod) -> Self {
        self.method = method;
        self
    }

    pub fn precedence(mut self, precedence: u32) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn teid(mut self, teid: u32) -> Self {
        self.teid = Some(teid);
        self
    }

    pub fn n3_address(mut self, address: Ipv4Addr) -> Self {
        self.n3_address = Some(address);
        self
    }

    pub fn ue_address(mut self, address: Ipv4Addr) -> Self {
        self.ue_address = Some(address);
        self
    }

    pub fn sdf_filter(mut self, flow_description: &str) -> Self {
        self.sdf_filter = Some(flow_description.to_string());
        self
    }

    pub fn far_id(mut self, far_id: u32) -> Self {
        self.far_id = Some(far_id);
        self
    }

    pub fn add_qer_id(mut self, qer_id: u32) -> Self {
        self.qer_ids.push(qer_id);
        self
    }

    /// Requests UPF-side TEID allocation (CHOOSE flag in the F-TEID).
    pub fn teid_allocation(mut self, enabled: bool) -> Self {
        self.teid_allocation = enabled;
        self
    }

    pub fn uplink(mut self) -> Self {
        self.direction = Some(Direction::Uplink);
        self
    }

    pub fn downlink(mut self) -> Self {
        self.direction = Some(Direction::Downlink);
        self
    }

    pub fn build(self) -> Result<Ie, SimError> {
        let id = self
            .id
            .ok_or_else(|| SimError::precondition("PDR ID is required"))?;

        if let RuleMethod::Delete = self.method {
            // Remove PDR embeds a Create addressing the same ID.
            let create = grouped(IeType::CreatePdr, &self.children(id)?);
            return Ok(grouped(IeType::RemovePdr, &[create]));
        }

        let direction = self
            .direction
            .ok_or_else(|| SimError::precondition("PDR direction is not set"))?;
        match direction {
            Direction::Uplink => {
                if self.teid.is_none() || self.n3_address.is_none() {
                    return Err(SimError::precondition(
                        "uplink PDR requires an F-TEID (TEID and N3 address)",
                    ));
                }
                if self.ue_address.is_some() {
                    return Err(SimError::precondition(
                        "uplink PDR cannot carry a UE address",
                    ));
                }
            }
            Direction::Downlink => {
                if self.ue_address.is_none() {
                    return Err(SimError::precondition("downlink PDR requires a UE address"));
                }
                if self.teid.is_some() || self.n3_address.is_some() {
                    return Err(SimError::precondition(
                        "downlink PDR cannot carry an F-TEID",
                    ));
                }
            }
        }

        let wrapper = match self.method {
            RuleMethod::Create => IeType::CreatePdr,
            RuleMethod::Update => IeType::UpdatePdr,
            RuleMethod::Delete => unreachable!(),
        };
        let children = self.children(id)?;
        Ok(grouped(wrapper, &children))
    }

    fn children(&self, id: u16) -> Result<Vec<Ie>, SimError> {
        let mut ies = vec![
            PdrId::new(id).to_ie(),
            Precedence::new(self.precedence).to_ie(),
        ];

        let mut pdi = Vec::new();
        match self.direction {
            Some(Direction::Uplink) => {
                pdi.push(SourceInterface::new(SourceInterfaceValue::Access).to_ie());
            }
            Some(Direction::Downlink) => {
                pdi.push(SourceInterface::new(SourceInterfaceValue::Core).to_ie());
            }
            None => {}
        }
        if let Some(teid) = self.teid {
            let mut fteid = FteidBuilder::new().teid(teid);
            if self.teid_allocation {
                fteid = fteid.choose_ipv4();
            } else if let Some(n3) = self.n3_address {
                fteid = fteid.ipv4(n3);
            }
            let fteid = fteid
                .build()
                .map_err(|e| SimError::precondition(format!("invalid F-TEID: {e}")))?;
            pdi.push(fteid.to_ie());
        }
        if let Some(ue) = self.ue_address {
            pdi.push(UeIpAddress::new(Some(ue), None).to_ie());
        }
        if let Some(flow) = &self.sdf_filter {
            pdi.push(SdfFilter::new(flow).to_ie());
        }
        if !pdi.is_empty() {
            ies.push(grouped(IeType::Pdi, &pdi));
        }

        if matches!(self.direction, Some(Direction::Uplink)) {
            // Strip the GTP-U/UDP/IPv4 outer header on N3 ingress.
            ies.push(Ie::new(
                IeType::OuterHeaderRemoval,
                OuterHeaderRemoval::new(0).marshal().to_vec(),
            ));
        }
        if let Some(far_id) = self.far_id {
            ies.push(FarId::new(far_id).to_ie());
        }
        for qer_id in &self.qer_ids {
            ies.push(QerId::new(*qer_id).to_ie());
        }
        Ok(ies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testutil::{children, find_child};

    fn uplink_builder() -> PdrBuilder {
        PdrBuilder::new()
            .id(1)
            .precedence(100)
            .uplink()
            .teid(1)
            .n3_address("10.0.0.2".parse().unwrap())
            .far_id(1)
            .add_qer_id(0)
            .add_qer_id(1)
    }

    #[test]
    fn test_build_without_id_fails() {
        let err = PdrBuilder::new().uplink().build().unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));
    }

    #[test]
    fn test_uplink_requires_fteid() {
        let err = PdrBuilder::new().id(1).uplink().build().unwrap_err();
        assert!(err.message().contains("F-TEID"));
    }

    #[test]
    fn test_downlink_requires_ue_address() {
        let err = PdrBuilder::new().id(2).downlink().build().unwrap_err();
        assert!(err.message().contains("UE address"));
    }

    #[test]
    fn test_direction_mixing_is_rejected() {
        let err = uplink_builder()
            .ue_address("17.0.0.1".parse().unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));

        let err = PdrBuilder::new()
            .id(2)
            .downlink()
            .ue_address("17.0.0.1".parse().unwrap())
            .teid(7)
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));
    }

    #[test]
    fn test_uplink_create_shape() {
        let ie = uplink_builder()
            .sdf_filter("permit out ip from any to any")
            .build()
            .unwrap();
        assert_eq!(ie.ie_type, IeType::CreatePdr);

        let kids = children(&ie);
        assert_eq!(kids[0].ie_type, IeType::PdrId);
        assert_eq!(kids[0].payload, vec![0x00, 0x01]);
        assert_eq!(kids[1].ie_type, IeType::Precedence);

        let pdi = find_child(&ie, IeType::Pdi).unwrap();
        assert!(find_child(&pdi, IeType::Fteid).is_some());
        assert!(find_child(&pdi, IeType::SdfFilter).is_some());
        assert!(find_child(&pdi, IeType::UeIpAddress).is_none());

        assert!(find_child(&ie, IeType::OuterHeaderRemoval).is_some());
        let qer_ids: Vec<_> = children(&ie)
            .into_iter()
            .filter(|c| c.ie_type == IeType::QerId)
            .collect();
        assert_eq!(qer_ids.len(), 2);
    }

    #[test]
    fn test_downlink_create_shape() {
        let ie = PdrBuilder::new()
            .id(2)
            .precedence(100)
            .downlink()
            .ue_address("17.0.0.1".parse().unwrap())
            .far_id(2)
            .build()
            .unwrap();
        let pdi = find_child(&ie, IeType::Pdi).unwrap();
        assert!(find_child(&pdi, IeType::UeIpAddress).is_some());
        assert!(find_child(&pdi, IeType::Fteid).is_none());
        assert!(find_child(&ie, IeType::OuterHeaderRemoval).is_none());
    }

    #[test]
    fn test_update_method_wraps_update_pdr() {
        let ie = uplink_builder().method(RuleMethod::Update).build().unwrap();
        assert_eq!(ie.ie_type, IeType::UpdatePdr);
    }

    #[test]
    fn test_delete_wraps_create_at_same_id() {
        let ie = PdrBuilder::new()
            .id(9)
            .method(RuleMethod::Delete)
            .build()
            .unwrap();
        assert_eq!(ie.ie_type, IeType::RemovePdr);
        let embedded = find_child(&ie, IeType::CreatePdr).unwrap();
        let pdr_id = find_child(&embedded, IeType::PdrId).unwrap();
        assert_eq!(pdr_id.payload, vec![0x00, 0x09]);
    }
}
