// src/client.rs

//! PFCP client adapter.
//!
//! [`PfcpClient`] is the capability set the controller consumes; the
//! [`N4Client`] implementation speaks PFCP over UDP using the `rs-pfcp`
//! codec, one synchronous request/response exchange at a time.

use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use rs_pfcp::ie::cause::CauseValue;
use rs_pfcp::ie::fseid::Fseid;
use rs_pfcp::ie::node_id::NodeId;
use rs_pfcp::ie::recovery_time_stamp::RecoveryTimeStamp;
use rs_pfcp::ie::{Ie, IeType};
use rs_pfcp::message::association_release_request::AssociationReleaseRequest;
use rs_pfcp::message::association_setup_request::AssociationSetupRequestBuilder;
use rs_pfcp::message::session_deletion_request::SessionDeletionRequestBuilder;
use rs_pfcp::message::session_establishment_request::SessionEstablishmentRequestBuilder;
use rs_pfcp::message::session_modification_request::SessionModificationRequestBuilder;
use rs_pfcp::message::{self, Message, MsgType};
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::{Duration, SystemTime};

/// Destination port for PFCP over UDP.
pub const PFCP_PORT: u16 = 8805;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque token for one established session. The remote SEID addresses all
/// Modify/Delete messages; the local SEID is the one the simulator chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    pub local_seid: u64,
    pub remote_seid: u64,
}

/// Capability set the session controller drives.
///
/// Empty rule vectors mean "no change of this kind". Errors pass through
/// untouched; the controller maps them onto the public taxonomy.
pub trait PfcpClient {
    fn connect(&mut self, peer: &str, interface: &str) -> io::Result<()>;
    fn disconnect(&mut self);
    fn setup_association(&mut self) -> io::Result<()>;
    fn teardown_association(&mut self) -> io::Result<()>;
    fn establish_session(
        &mut self,
        local_seid: u64,
        pdrs: Vec<Ie>,
        fars: Vec<Ie>,
        qers: Vec<Ie>,
        urrs: Vec<Ie>,
    ) -> io::Result<SessionHandle>;
    fn modify_session(
        &mut self,
        handle: &SessionHandle,
        pdrs: Vec<Ie>,
        fars: Vec<Ie>,
        qers: Vec<Ie>,
        urrs: Vec<Ie>,
    ) -> io::Result<()>;
    fn delete_session(&mut self, handle: &SessionHandle) -> io::Result<()>;
}

/// PFCP over UDP toward a single peer.
#[derive(Debug, Default)]
pub struct N4Client {
    socket: Option<UdpSocket>,
    local_addr: Option<Ipv4Addr>,
    sequence: u32,
    timeout: Option<Duration>,
}

impl N4Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the default response deadline for every exchange.
    pub fn with_timeout(timeout: Duration) -> Self {
        N4Client {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn node_id_ie(&self) -> io::Result<Ie> {
        let addr = self
            .local_addr
            .ok_or_else(|| not_connected("node ID requested before connect"))?;
        Ok(NodeId::new_ipv4(addr).to_ie())
    }

    fn local_fseid_ie(&self, seid: u64) -> io::Result<Ie> {
        let addr = self
            .local_addr
            .ok_or_else(|| not_connected("F-SEID requested before connect"))?;
        let fseid = Fseid::new(seid, Some(addr), None);
        Ok(Ie::new(IeType::Fseid, fseid.marshal()))
    }

    /// Sends one request and blocks until the matching response type
    /// arrives. Unrelated inbound messages (heartbeats, reports) are
    /// skipped; the simulator keeps no state for them.
    fn request(&self, payload: &[u8], expected: MsgType) -> io::Result<Box<dyn Message>> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| not_connected("PFCP transport is not connected"))?;
        socket.send(payload)?;

        let mut buf = [0u8; 8192];
        loop {
            let len = socket.recv(&mut buf).map_err(|e| {
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("timed out waiting for {expected:?}"),
                    )
                } else {
                    e
                }
            })?;
            let msg = match message::parse(&buf[..len]) {
                Ok(msg) => msg,
                Err(e) => {
                    log::debug!("ignoring unparseable datagram: {e}");
                    continue;
                }
            };
            if msg.msg_type() == expected {
                return Ok(msg);
            }
            log::debug!("ignoring {} while waiting for {expected:?}", msg.msg_name());
        }
    }
}

impl PfcpClient for N4Client {
    fn connect(&mut self, peer: &str, interface: &str) -> io::Result<()> {
        let local = interface_ipv4(interface)?;
        let socket = UdpSocket::bind((IpAddr::V4(local), 0))?;
        let target = if peer.contains(':') {
            peer.to_string()
        } else {
            format!("{peer}:{PFCP_PORT}")
        };
        socket.connect(&target)?;
        socket.set_read_timeout(Some(self.timeout.unwrap_or(DEFAULT_RESPONSE_TIMEOUT)))?;
        log::info!("PFCP transport open: {} -> {}", socket.local_addr()?, target);

        self.socket = Some(socket);
        self.local_addr = Some(local);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            log::info!("PFCP transport closed");
        }
        self.local_addr = None;
    }

    fn setup_association(&mut self) -> io::Result<()> {
        let node_id = self.node_id_ie()?;
        let recovery = RecoveryTimeStamp::new(SystemTime::now());
        let recovery_ie = Ie::new(IeType::RecoveryTimeStamp, recovery.marshal().to_vec());

        let seq = self.next_sequence();
        let req = AssociationSetupRequestBuilder::new(seq)
            .node_id_ie(node_id)
            .recovery_time_stamp_ie(recovery_ie)
            .build();
        let resp = self.request(&req.marshal(), MsgType::AssociationSetupResponse)?;
        check_cause(resp.as_ref())
    }

    fn teardown_association(&mut self) -> io::Result<()> {
        let node_id = self.node_id_ie()?;
        let seq = self.next_sequence();
        let req = AssociationReleaseRequest::new(seq, node_id);
        let resp = self.request(&req.marshal(), MsgType::AssociationReleaseResponse)?;
        check_cause(resp.as_ref())
    }

    fn establish_session(
        &mut self,
        local_seid: u64,
        pdrs: Vec<Ie>,
        fars: Vec<Ie>,
        qers: Vec<Ie>,
        urrs: Vec<Ie>,
    ) -> io::Result<SessionHandle> {
        let node_id = self.node_id_ie()?;
        let fseid = self.local_fseid_ie(local_seid)?;
        let seq = self.next_sequence();

        // Establishment goes out with SEID 0 in the header; the CP F-SEID
        // IE announces the SEID the peer must address us with.
        let mut builder = SessionEstablishmentRequestBuilder::new(0, seq)
            .node_id_ie(node_id)
            .fseid_ie(fseid)
            .create_pdrs(pdrs)
            .create_fars(fars);
        if !qers.is_empty() {
            builder = builder.create_qers(qers);
        }
        if !urrs.is_empty() {
            builder = builder.create_urrs(urrs);
        }
        let req = builder.build().map_err(to_io)?;

        let resp = self.request(&req.marshal(), MsgType::SessionEstablishmentResponse)?;
        check_cause(resp.as_ref())?;
        let remote_seid = remote_seid(resp.as_ref())?;
        Ok(SessionHandle {
            local_seid,
            remote_seid,
        })
    }

    fn modify_session(
        &mut self,
        handle: &SessionHandle,
        pdrs: Vec<Ie>,
        fars: Vec<Ie>,
        qers: Vec<Ie>,
        urrs: Vec<Ie>,
    ) -> io::Result<()> {
        let fseid = self.local_fseid_ie(handle.local_seid)?;
        let seq = self.next_sequence();
        let mut builder =
            SessionModificationRequestBuilder::new(handle.remote_seid, seq).fseid_ie(fseid);

        let (create, update, remove) = split_rules(pdrs, IeType::CreatePdr, IeType::UpdatePdr);
        if !create.is_empty() {
            builder = builder.create_pdrs(create);
        }
        if !update.is_empty() {
            builder = builder.update_pdrs(update);
        }
        if !remove.is_empty() {
            builder = builder.remove_pdrs(remove);
        }

        let (create, update, remove) = split_rules(fars, IeType::CreateFar, IeType::UpdateFar);
        if !create.is_empty() {
            builder = builder.create_fars(create);
        }
        if !update.is_empty() {
            builder = builder.update_fars(update);
        }
        if !remove.is_empty() {
            builder = builder.remove_fars(remove);
        }

        let (create, update, remove) = split_rules(qers, IeType::CreateQer, IeType::UpdateQer);
        if !create.is_empty() {
            builder = builder.create_qers(create);
        }
        if !update.is_empty() {
            builder = builder.update_qers(update);
        }
        if !remove.is_empty() {
            builder = builder.remove_qers(remove);
        }

        let (create, update, remove) = split_rules(urrs, IeType::CreateUrr, IeType::UpdateUrr);
        if !create.is_empty() {
            builder = builder.create_urrs(create);
        }
        if !update.is_empty() {
            builder = builder.update_urrs(update);
        }
        if !remove.is_empty() {
            builder = builder.remove_urrs(remove);
        }

        let req = builder.build();
        let resp = self.request(&req.marshal(), MsgType::SessionModificationResponse)?;
        check_cause(resp.as_ref())
    }

    fn delete_session(&mut self, handle: &SessionHandle) -> io::Result<()> {
        let seq = self.next_sequence();
        let req = SessionDeletionRequestBuilder::new(handle.remote_seid, seq).build();
        let resp = self.request(&req.marshal(), MsgType::SessionDeletionResponse)?;
        check_cause(resp.as_ref())
    }
}

/// First IPv4 address of the named local interface.
fn interface_ipv4(name: &str) -> io::Result<Ipv4Addr> {
    let interfaces = NetworkInterface::show().map_err(to_io)?;
    let interface = interfaces
        .iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("interface '{name}' not found"),
            )
        })?;
    interface
        .addr
        .iter()
        .find_map(|addr| match addr {
            network_interface::Addr::V4(v4) => Some(v4.ip),
            _ => None,
        })
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("interface '{name}' has no IPv4 address"),
            )
        })
}

/// Buckets rule IEs by their wrapper so the modification request places
/// each under the right message field.
fn split_rules(ies: Vec<Ie>, create: IeType, update: IeType) -> (Vec<Ie>, Vec<Ie>, Vec<Ie>) {
    let mut created = Vec::new();
    let mut updated = Vec::new();
    let mut removed = Vec::new();
    for ie in ies {
        if ie.ie_type == create {
            created.push(ie);
        } else if ie.ie_type == update {
            updated.push(ie);
        } else {
            removed.push(ie);
        }
    }
    (created, updated, removed)
}

fn check_cause(msg: &dyn Message) -> io::Result<()> {
    let cause = msg.ies(IeType::Cause).next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} carried no Cause IE", msg.msg_name()),
        )
    })?;
    match cause.payload.first() {
        Some(&value) if value == CauseValue::RequestAccepted as u8 => Ok(()),
        Some(&value) => Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} rejected with cause {value}", msg.msg_name()),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "empty Cause IE",
        )),
    }
}

/// Pulls the peer's SEID out of the UP F-SEID in an establishment response.
fn remote_seid(msg: &dyn Message) -> io::Result<u64> {
    let fseid = msg.ies(IeType::Fseid).next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} carried no F-SEID IE", msg.msg_name()),
        )
    })?;
    if fseid.payload.len() < 9 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "truncated F-SEID IE",
        ));
    }
    let mut seid = [0u8; 8];
    seid.copy_from_slice(&fseid.payload[1..9]);
    Ok(u64::from_be_bytes(seid))
}

fn not_connected(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, msg.to_string())
}

fn to_io<E: std::fmt::Display>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}
