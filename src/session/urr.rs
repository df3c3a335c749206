// src/session/urr.rs

//! Usage Reporting Rule builder.

use crate::error::SimError;
use crate::session::{grouped, RuleMethod};
use bitflags::bitflags;
use rs_pfcp::ie::measurement_method::MeasurementMethod;
use rs_pfcp::ie::urr_id::UrrId;
use rs_pfcp::ie::volume_quota::VolumeQuota;
use rs_pfcp::ie::volume_threshold::VolumeThreshold;
use rs_pfcp::ie::{Ie, IeType};

bitflags! {
    /// Reporting Triggers bitmap, big-endian over the two trigger octets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReportingTrigger: u16 {
        const PERIO = 0x0100;
        const VOLTH = 0x0200;
        const TIMTH = 0x0400;
        const QUHTI = 0x0800;
        const START = 0x1000;
        const STOPT = 0x2000;
        const DROTH = 0x4000;
        const LIUSA = 0x8000;
        const VOLQU = 0x0001;
        const TIMQU = 0x0002;
        const ENVCL = 0x0004;
    }
}

/// Volume figure carried by a threshold or quota: per-direction byte counts
/// plus the flags announcing which of them are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageVolume {
    pub total: Option<u64>,
    pub uplink: Option<u64>,
    pub downlink: Option<u64>,
}

impl UsageVolume {
    pub fn new(total: u64, uplink: u64, downlink: u64) -> Self {
        UsageVolume {
            total: Some(total),
            uplink: Some(uplink),
            downlink: Some(downlink),
        }
    }

    /// TOVOL/ULVOL/DLVOL bits announcing which volumes are present.
    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.total.is_some() {
            flags |= 0b001;
        }
        if self.uplink.is_some() {
            flags |= 0b010;
        }
        if self.downlink.is_some() {
            flags |= 0b100;
        }
        flags
    }

    fn threshold_ie(&self) -> Ie {
        let threshold = VolumeThreshold::new(
            self.total.is_some(),
            self.uplink.is_some(),
            self.downlink.is_some(),
            self.total,
            self.uplink,
            self.downlink,
        );
        Ie::new(IeType::VolumeThreshold, threshold.marshal())
    }

    fn quota_ie(&self) -> Result<Ie, SimError> {
        let quota = VolumeQuota::new(self.flags(), self.total, self.uplink, self.downlink);
        let payload = quota
            .marshal()
            .map_err(|e| SimError::precondition(format!("invalid volume quota: {e}")))?;
        Ok(Ie::new(IeType::VolumeQuota, payload))
    }
}

/// Assembles a Create/Update/Remove URR grouped IE.
///
/// The Delete method emits a Remove URR wrapping a Create carrying the
/// current (possibly zero) values, which preserves the ID addressing the
/// remove semantics require.
#[derive(Debug, Clone, Default)]
pub struct UrrBuilder {
    id: Option<u32>,
    method: RuleMethod,
    triggers: ReportingTrigger,
    measure_event: bool,
    measure_volume: bool,
    measure_duration: bool,
    volume_threshold: UsageVolume,
    volume_quota: UsageVolume,
}

impl UrrBuilder {
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

    pub fn triggers(mut self, triggers: ReportingTrigger) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn measurement_method(mut self, event: bool, volume: bool, duration: bool) -> Self {
        self.measure_event = event;
        self.measure_volume = volume;
        self.measure_duration = duration;
        self
    }

    pub fn volume_threshold(mut self, volume: UsageVolume) -> Self {
        self.volume_threshold = volume;
        self
    }

    pub fn volume_quota(mut self, volume: UsageVolume) -> Self {
        self.volume_quota = volume;
        self
    }

    pub fn build(self) -> Result<Ie, SimError> {
        let id = self
            .id
            .ok_or_else(|| SimError::precondition("URR ID is required"))?;
        if id == 0 {
            return Err(SimError::precondition("URR ID must be non-zero"));
        }

        let children = self.children(id)?;
        match self.method {
            RuleMethod::Create => Ok(grouped(IeType::CreateUrr, &children)),
            RuleMethod::Update => Ok(grouped(IeType::UpdateUrr, &children)),
            RuleMethod::Delete => {
                let create = grouped(IeType::CreateUrr, &children);
                Ok(grouped(IeType::RemoveUrr, &[create]))
            }
        }
    }

    fn children(&self, id: u32) -> Result<Vec<Ie>, SimError> {
        let method =
            MeasurementMethod::new(self.measure_duration, self.measure_volume, self.measure_event);
        Ok(vec![
            UrrId::new(id).to_ie(),
            method.to_ie(),
            Ie::new(
                IeType::ReportingTriggers,
                self.triggers.bits().to_be_bytes().to_vec(),
            ),
            self.volume_threshold.threshold_ie(),
            self.volume_quota.quota_ie()?,
        ])
    }
}
