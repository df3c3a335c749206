// src/session/qer.rs

//! QoS Enforcement Rule builder.

use crate::error::SimError;
use crate::session::{grouped, RuleMethod};
use rs_pfcp::ie::gate_status::{GateStatus, GateStatusValue};
use rs_pfcp::ie::mbr::Mbr;
use rs_pfcp::ie::qer_id::QerId;
use rs_pfcp::ie::qfi::Qfi;
use rs_pfcp::ie::{Ie, IeType};

/// Assembles a Create/Update/Remove QER grouped IE.
///
/// The gate applies to both directions; per-application filters map
/// `allow` to open gates and `deny` to closed ones.
#[derive(Debug, Clone, Default)]
pub struct QerBuilder {
    id: Option<u32>,
    method: RuleMethod,
    qfi: u8,
    uplink_mbr: u64,
    downlink_mbr: u64,
    gate: Option<GateStatusValue>,
}

impl QerBuilder {
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

    pub fn qfi(mut self, qfi: u8) -> Self {
        self.qfi = qfi;
        self
    }

    /// Maximum bit rates in bits per second, uplink then downlink.
    pub fn mbr(mut self, uplink: u64, downlink: u64) -> Self {
        self.uplink_mbr = uplink;
        self.downlink_mbr = downlink;
        self
    }

    pub fn gate(mut self, gate: GateStatusValue) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> Result<Ie, SimError> {
        let id = self
            .id
            .ok_or_else(|| SimError::precondition("QER ID is required"))?;

        let children = self.children(id)?;
        match self.method {
            RuleMethod::Create => Ok(grouped(IeType::CreateQer, &children)),
            RuleMethod::Update => Ok(grouped(IeType::UpdateQer, &children)),
            RuleMethod::Delete => {
                let create = grouped(IeType::CreateQer, &children);
                Ok(grouped(IeType::RemoveQer, &[create]))
            }
        }
    }

    fn children(&self, id: u32) -> Result<Vec<Ie>, SimError> {
        let gate = self.gate.unwrap_or(GateStatusValue::Open);
        let qfi = Qfi::new(self.qfi)
            .map_err(|e| SimError::precondition(format!("invalid QFI {}: {e}", self.qfi)))?;
        Ok(vec![
            QerId::new(id).to_ie(),
            Ie::new(
                IeType::GateStatus,
                GateStatus::new(gate, gate).marshal().to_vec(),
            ),
            Ie::new(
                IeType::Mbr,
                Mbr::new(self.uplink_mbr, self.downlink_mbr).marshal().to_vec(),
            ),
            qfi.to_ie(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testutil::find_child;

    #[test]
    fn test_build_without_id_fails() {
        let err = QerBuilder::new().qfi(9).build().unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));
    }

    #[test]
    fn test_open_gate_create_shape() {
        let ie = QerBuilder::new()
            .id(0)
            .qfi(9)
            .mbr(500_000_000, 1_000_000_000)
            .gate(GateStatusValue::Open)
            .build()
            .unwrap();
        assert_eq!(ie.ie_type, IeType::CreateQer);
        assert_eq!(find_child(&ie, IeType::GateStatus).unwrap().payload, vec![0]);
        assert_eq!(find_child(&ie, IeType::Qfi).unwrap().payload, vec![9]);
        assert!(find_child(&ie, IeType::Mbr).is_some());
    }

    #[test]
    fn test_closed_gate_closes_both_directions() {
        let ie = QerBuilder::new()
            .id(2)
            .gate(GateStatusValue::Closed)
            .build()
            .unwrap();
        // DL gate is bit 0, UL gate is bit 1.
        assert_eq!(
            find_child(&ie, IeType::GateStatus).unwrap().payload,
            vec![0b11]
        );
    }

    #[test]
    fn test_oversized_qfi_is_rejected() {
        let err = QerBuilder::new().id(1).qfi(64).build().unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));
    }

    #[test]
    fn test_delete_wraps_create_at_same_id() {
        let ie = QerBuilder::new()
            .id(5)
            .method(RuleMethod::Delete)
            .build()
            .unwrap();
        assert_eq!(ie.ie_type, IeType::RemoveQer);
        let create = find_child(&ie, IeType::CreateQer).unwrap();
        assert_eq!(
            find_child(&create, IeType::QerId).unwrap().payload,
            vec![0x00, 0x00, 0x00, 0x05]
        );
    }
}
