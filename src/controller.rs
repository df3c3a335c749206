// src/controller.rs

//! Batched session lifecycle orchestration.
//!
//! The controller turns a compact request description into the PFCP rule
//! graphs of one or more sessions, drives them through the client adapter
//! and tracks the returned handles in the registry. It owns every piece of
//! process state: configuration, the association flag and the registry.
//! It is deliberately not re-entrant; callers serialize access (see
//! [`crate::service`]).

use crate::client::PfcpClient;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::registry::SessionRegistry;
use crate::session::{
    AppFilter, FarBuilder, PdrBuilder, QerBuilder, ReportingTrigger, RuleMethod, UrrBuilder,
    UsageVolume,
};
use rs_pfcp::ie::apply_action::ApplyAction;
use rs_pfcp::ie::destination_interface::Interface;
use rs_pfcp::ie::Ie;
use std::net::Ipv4Addr;

/// Width of the identifier band one session occupies.
pub const SESSION_STEP: u32 = 10;

/// Each filter consumes an uplink/downlink identifier pair inside the band.
pub const MAX_APP_FILTERS: usize = (SESSION_STEP / 2) as usize;

// Placeholder QoS and accounting figures until the request surface
// carries them.
const UPLINK_MBR: u64 = 500_000_000;
const DOWNLINK_MBR: u64 = 1_000_000_000;
const VOLUME_THRESHOLD: UsageVolume = UsageVolume {
    total: Some(9_000_000),
    uplink: Some(4_500_000),
    downlink: Some(4_500_000),
};
const VOLUME_QUOTA: UsageVolume = UsageVolume {
    total: Some(10_000_000),
    uplink: Some(5_000_000),
    downlink: Some(5_000_000),
};

/// Parameters of a batched CreateSession.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub base_id: u32,
    pub count: u32,
    pub node_b_address: Ipv4Addr,
    pub ue_address_pool: String,
    /// Core-side tunnel peer for uplink FARs; `None` leaves forwarding
    /// toward the core untunneled.
    pub ul_tunnel_dst: Option<Ipv4Addr>,
    /// Access-side tunnel peer for downlink FARs; defaults to the
    /// eNodeB/gNodeB address.
    pub dl_tunnel_dst: Option<Ipv4Addr>,
    pub teid_allocation: bool,
    pub qfi: u8,
    pub app_filters: Vec<String>,
}

/// Parameters of a batched ModifySession.
#[derive(Debug, Clone)]
pub struct ModifySessionRequest {
    pub base_id: u32,
    pub count: u32,
    pub node_b_address: Ipv4Addr,
    pub buffer: bool,
    pub notify_cp: bool,
    pub end_marker: bool,
    pub app_filters: Vec<String>,
}

/// The rule graph of one session, ready for the client adapter.
struct RuleGraph {
    pdrs: Vec<Ie>,
    fars: Vec<Ie>,
    qers: Vec<Ie>,
    urrs: Vec<Ie>,
}

pub struct Controller<C: PfcpClient> {
    client: C,
    config: Option<SimConfig>,
    connected: bool,
    associated: bool,
    registry: SessionRegistry,
}

impl<C: PfcpClient> Controller<C> {
    pub fn new(client: C) -> Self {
        Controller {
            client,
            config: None,
            connected: false,
            associated: false,
            registry: SessionRegistry::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_associated(&self) -> bool {
        self.associated
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_session(&self, base: u64) -> bool {
        self.registry.contains(base)
    }

    /// Stores the connection parameters. Does not open any transport and
    /// may be called repeatedly.
    pub fn configure(
        &mut self,
        remote_peer: &str,
        upf_n3: &str,
        interface: &str,
    ) -> Result<String, SimError> {
        let config = SimConfig::from_args(remote_peer, upf_n3, interface)?;
        log::info!(
            "configured: peer {}, N3 {}, interface {}",
            config.remote_peer,
            config.upf_n3,
            config.interface
        );
        self.config = Some(config);
        Ok("Server is configured".to_string())
    }

    /// Opens the transport if needed and performs PFCP Association Setup.
    pub fn associate(&mut self) -> Result<String, SimError> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| SimError::precondition("Server is not configured"))?;

        if !self.connected {
            self.client
                .connect(&config.remote_peer, &config.interface)
                .map_err(|e| SimError::remote(e.to_string()))?;
            self.connected = true;
        }
        self.client
            .setup_association()
            .map_err(|e| SimError::remote(e.to_string()))?;
        self.associated = true;
        Ok("Association established".to_string())
    }

    /// Releases the association and closes the transport. The transport is
    /// closed even when the release itself fails.
    pub fn disassociate(&mut self) -> Result<String, SimError> {
        if self.config.is_none() {
            return Err(SimError::precondition("Server is not configured"));
        }
        if !self.associated {
            return Err(SimError::precondition(
                "Server is not associated with the remote peer",
            ));
        }

        let released = self.client.teardown_association();
        self.client.disconnect();
        self.connected = false;
        self.associated = false;
        released.map_err(|e| SimError::remote(e.to_string()))?;
        Ok("Association released".to_string())
    }

    pub fn create_session(&mut self, request: &CreateSessionRequest) -> Result<String, SimError> {
        let config = self.active_config()?.clone();
        let filters = resolve_filters(&request.app_filters)?;
        if request.qfi > 63 {
            return Err(SimError::invalid_argument(format!(
                "QFI {} does not fit 6 bits",
                request.qfi
            )));
        }
        let last_rule_id = last_rule_id(request.base_id, request.count, filters.len())?;
        if last_rule_id > u16::MAX as u32 {
            return Err(SimError::invalid_argument(
                "base ID and count overflow the 16-bit PDR ID space",
            ));
        }

        let mut pool = UeAddressPool::parse(&request.ue_address_pool)?;
        let ul_tunnel = request.ul_tunnel_dst;
        let dl_tunnel = request.dl_tunnel_dst.unwrap_or(request.node_b_address);

        for k in 0..request.count {
            let base = request.base_id + k * SESSION_STEP;
            let ue_address = pool.next_address()?;
            let graph =
                build_rule_graph(&config, request, &filters, base, ue_address, ul_tunnel, dl_tunnel)?;
            let handle = self
                .client
                .establish_session(base as u64, graph.pdrs, graph.fars, graph.qers, graph.urrs)
                .map_err(|e| SimError::remote(e.to_string()))?;
            self.registry.insert(base as u64, handle);
            log::info!(
                "session established: base {base}, UE {ue_address}, remote SEID {:#x}",
                handle.remote_seid
            );
        }

        Ok(format!(
            "{} sessions were established using {} as baseID",
            request.count, request.base_id
        ))
    }

    /// Rebuilds exactly the downlink FARs of the addressed sessions. PDRs,
    /// QERs and URRs keep their Create-time shape.
    pub fn modify_session(&mut self, request: &ModifySessionRequest) -> Result<String, SimError> {
        self.active_config()?;
        let filters = resolve_filters(&request.app_filters)?;
        self.ensure_enough_sessions(request.count)?;

        let buffering = request.buffer || request.notify_cp;
        for k in 0..request.count {
            let base = session_base(request.base_id, k)?;
            let handle = self
                .registry
                .get(base as u64)
                .ok_or_else(|| SimError::internal(format!("session with base ID {base} not found")))?;

            let mut fars = Vec::with_capacity(filters.len());
            for j in 0..filters.len() {
                let far_id = base + 2 * j as u32 + 1;
                let mut far = FarBuilder::new()
                    .id(far_id)
                    .method(RuleMethod::Update)
                    .dst_interface(Interface::Access)
                    .tunnel_dst(request.node_b_address)
                    .end_marker(request.end_marker);
                far = if buffering {
                    far.action(ApplyAction::BUFF | ApplyAction::NOCP)
                } else {
                    far.action(ApplyAction::FORW).teid(base + 1)
                };
                fars.push(far.build()?);
            }

            self.client
                .modify_session(&handle, Vec::new(), fars, Vec::new(), Vec::new())
                .map_err(|e| SimError::remote(e.to_string()))?;
            log::info!("session modified: base {base}, buffering {buffering}");
        }

        Ok(format!(
            "{} sessions were modified using {} as baseID",
            request.count, request.base_id
        ))
    }

    pub fn delete_session(&mut self, base_id: u32, count: u32) -> Result<String, SimError> {
        self.active_config()?;
        self.ensure_enough_sessions(count)?;
        for k in 0..count {
            let base = session_base(base_id, k)?;
            if !self.registry.contains(base as u64) {
                return Err(SimError::precondition(format!(
                    "session with base ID {base} not found"
                )));
            }
        }

        for k in 0..count {
            let base = session_base(base_id, k)?;
            let handle = self
                .registry
                .get(base as u64)
                .ok_or_else(|| SimError::internal(format!("session with base ID {base} not found")))?;
            self.client
                .delete_session(&handle)
                .map_err(|e| SimError::remote(e.to_string()))?;
            self.registry.remove(base as u64);
            log::info!("session deleted: base {base}");
        }

        Ok(format!(
            "{count} sessions were deleted using {base_id} as baseID"
        ))
    }

    fn active_config(&self) -> Result<&SimConfig, SimError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| SimError::precondition("Server is not configured"))?;
        if !self.associated {
            return Err(SimError::precondition(
                "Server is not associated with the remote peer",
            ));
        }
        Ok(config)
    }

    fn ensure_enough_sessions(&self, count: u32) -> Result<(), SimError> {
        if (self.registry.len() as u32) < count {
            return Err(SimError::precondition(format!(
                "not enough sessions: {} established, {count} requested",
                self.registry.len()
            )));
        }
        Ok(())
    }
}

/// Builds the full rule graph of one session band.
fn build_rule_graph(
    config: &SimConfig,
    request: &CreateSessionRequest,
    filters: &[AppFilter],
    base: u32,
    ue_address: Ipv4Addr,
    ul_tunnel: Option<Ipv4Addr>,
    dl_tunnel: Ipv4Addr,
) -> Result<RuleGraph, SimError> {
    let uplink_teid = base;
    let downlink_teid = base + 1;

    let mut pdrs = Vec::new();
    let mut fars = Vec::new();
    let mut urrs = Vec::new();
    let mut qers = vec![QerBuilder::new()
        .id(0)
        .qfi(request.qfi)
        .mbr(UPLINK_MBR, DOWNLINK_MBR)
        .build()?];

    for (j, filter) in filters.iter().enumerate() {
        let even = base + 2 * j as u32;
        let odd = even + 1;

        pdrs.push(
            PdrBuilder::new()
                .id(even as u16)
                .uplink()
                .precedence(filter.precedence)
                .teid(uplink_teid)
                .n3_address(config.upf_n3)
                .teid_allocation(request.teid_allocation)
                .sdf_filter(&filter.flow_description)
                .far_id(even)
                .add_qer_id(0)
                .add_qer_id(even)
                .build()?,
        );
        pdrs.push(
            PdrBuilder::new()
                .id(odd as u16)
                .downlink()
                .precedence(filter.precedence)
                .ue_address(ue_address)
                .sdf_filter(&filter.flow_description)
                .far_id(odd)
                .add_qer_id(0)
                .add_qer_id(even)
                .build()?,
        );

        let mut uplink_far = FarBuilder::new()
            .id(even)
            .action(ApplyAction::FORW)
            .dst_interface(Interface::Core);
        if let Some(peer) = ul_tunnel {
            uplink_far = uplink_far.tunnel_dst(peer).teid(uplink_teid);
        }
        fars.push(uplink_far.build()?);
        fars.push(
            FarBuilder::new()
                .id(odd)
                .action(ApplyAction::FORW)
                .dst_interface(Interface::Access)
                .tunnel_dst(dl_tunnel)
                .teid(downlink_teid)
                .build()?,
        );

        qers.push(
            QerBuilder::new()
                .id(even)
                .qfi(request.qfi)
                .gate(filter.gate)
                .mbr(UPLINK_MBR, DOWNLINK_MBR)
                .build()?,
        );
        urrs.push(
            UrrBuilder::new()
                .id(even)
                .triggers(ReportingTrigger::VOLTH | ReportingTrigger::VOLQU)
                .measurement_method(false, true, false)
                .volume_threshold(VOLUME_THRESHOLD)
                .volume_quota(VOLUME_QUOTA)
                .build()?,
        );
    }

    Ok(RuleGraph {
        pdrs,
        fars,
        qers,
        urrs,
    })
}

/// Start of the identifier band of session `k`, overflow-checked.
fn session_base(base_id: u32, k: u32) -> Result<u32, SimError> {
    k.checked_mul(SESSION_STEP)
        .and_then(|offset| base_id.checked_add(offset))
        .ok_or_else(|| SimError::invalid_argument("base ID and count overflow the ID space"))
}

/// Highest rule identifier a batch will touch, for the 16-bit PDR check.
fn last_rule_id(base_id: u32, count: u32, filters: usize) -> Result<u32, SimError> {
    if count == 0 {
        return Ok(base_id);
    }
    session_base(base_id, count - 1)?
        .checked_add(2 * filters as u32 - 1)
        .ok_or_else(|| SimError::invalid_argument("base ID and count overflow the ID space"))
}

fn resolve_filters(raw: &[String]) -> Result<Vec<AppFilter>, SimError> {
    if raw.len() > MAX_APP_FILTERS {
        return Err(SimError::invalid_argument(format!(
            "too many application filters: {} given, at most {MAX_APP_FILTERS} supported",
            raw.len()
        )));
    }
    if raw.is_empty() {
        return Ok(vec![AppFilter::allow_all()]);
    }
    raw.iter().map(|descriptor| AppFilter::parse(descriptor)).collect()
}

/// Sequential UE address allocator over an IPv4 prefix. Hands out host
/// addresses starting one above the network address and never yields the
/// broadcast address.
#[derive(Debug)]
pub struct UeAddressPool {
    next: u32,
    broadcast: u32,
}

impl UeAddressPool {
    pub fn parse(cidr: &str) -> Result<Self, SimError> {
        let malformed =
            || SimError::invalid_argument(format!("'{cidr}' is not a valid IPv4 CIDR pool"));
        let (addr, len) = cidr.split_once('/').ok_or_else(malformed)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| malformed())?;
        let len: u32 = len.parse().map_err(|_| malformed())?;
        if len > 32 {
            return Err(malformed());
        }
        let mask = (!0u32).checked_shl(32 - len).unwrap_or(0);
        let network = u32::from(addr) & mask;
        Ok(UeAddressPool {
            next: network.saturating_add(1),
            broadcast: network | !mask,
        })
    }

    fn next_address(&mut self) -> Result<Ipv4Addr, SimError> {
        if self.next >= self.broadcast {
            return Err(SimError::invalid_argument("UE address pool exhausted"));
        }
        let address = Ipv4Addr::from(self.next);
        self.next += 1;
        Ok(address)
    }
}
