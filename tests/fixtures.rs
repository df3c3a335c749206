// tests/fixtures.rs

//! Shared test fixtures: a recording mock of the PFCP client capability set
//! and helpers for walking grouped IE payloads.

#![allow(dead_code)]

use rs_pfcp::ie::{Ie, IeType};
use rs_pfcpsim::client::{PfcpClient, SessionHandle};
use rs_pfcpsim::controller::Controller;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// One recorded EstablishSession call.
#[derive(Debug, Clone)]
pub struct Established {
    pub local_seid: u64,
    pub pdrs: Vec<Ie>,
    pub fars: Vec<Ie>,
    pub qers: Vec<Ie>,
    pub urrs: Vec<Ie>,
}

/// One recorded ModifySession call.
#[derive(Debug, Clone)]
pub struct Modified {
    pub handle: SessionHandle,
    pub pdrs: Vec<Ie>,
    pub fars: Vec<Ie>,
    pub qers: Vec<Ie>,
    pub urrs: Vec<Ie>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub connects: Vec<(String, String)>,
    pub setup_calls: usize,
    pub teardown_calls: usize,
    pub disconnects: usize,
    pub establish_calls: usize,
    pub established: Vec<Established>,
    pub modified: Vec<Modified>,
    pub deleted: Vec<SessionHandle>,
    /// Fail the n-th EstablishSession (0-based) when set.
    pub fail_establish_at: Option<usize>,
    pub fail_setup: bool,
    pub fail_teardown: bool,
    pub fail_modify: bool,
    pub fail_delete: bool,
}

impl MockState {
    /// True once any adapter call carrying network I/O was made.
    pub fn touched(&self) -> bool {
        !self.connects.is_empty()
            || self.setup_calls > 0
            || self.teardown_calls > 0
            || self.establish_calls > 0
            || !self.modified.is_empty()
            || !self.deleted.is_empty()
    }
}

/// PFCP client double recording every call into a shared [`MockState`].
pub struct MockClient {
    pub state: Rc<RefCell<MockState>>,
}

fn refused(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, format!("{what} refused"))
}

impl PfcpClient for MockClient {
    fn connect(&mut self, peer: &str, interface: &str) -> io::Result<()> {
        self.state
            .borrow_mut()
            .connects
            .push((peer.to_string(), interface.to_string()));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.borrow_mut().disconnects += 1;
    }

    fn setup_association(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.setup_calls += 1;
        if state.fail_setup {
            return Err(refused("association setup"));
        }
        Ok(())
    }

    fn teardown_association(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.teardown_calls += 1;
        if state.fail_teardown {
            return Err(refused("association release"));
        }
        Ok(())
    }

    fn establish_session(
        &mut self,
        local_seid: u64,
        pdrs: Vec<Ie>,
        fars: Vec<Ie>,
        qers: Vec<Ie>,
        urrs: Vec<Ie>,
    ) -> io::Result<SessionHandle> {
        let mut state = self.state.borrow_mut();
        let index = state.establish_calls;
        state.establish_calls += 1;
        if state.fail_establish_at == Some(index) {
            return Err(refused("session establishment"));
        }
        state.established.push(Established {
            local_seid,
            pdrs,
            fars,
            qers,
            urrs,
        });
        Ok(SessionHandle {
            local_seid,
            remote_seid: 0x9000_0000 + local_seid,
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
        let mut state = self.state.borrow_mut();
        if state.fail_modify {
            return Err(refused("session modification"));
        }
        state.modified.push(Modified {
            handle: *handle,
            pdrs,
            fars,
            qers,
            urrs,
        });
        Ok(())
    }

    fn delete_session(&mut self, handle: &SessionHandle) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_delete {
            return Err(refused("session deletion"));
        }
        state.deleted.push(*handle);
        Ok(())
    }
}

/// A fresh controller plus a handle onto the mock's recorded state.
pub fn mock_controller() -> (Controller<MockClient>, Rc<RefCell<MockState>>) {
    let state = Rc::new(RefCell::new(MockState::default()));
    let controller = Controller::new(MockClient {
        state: Rc::clone(&state),
    });
    (controller, state)
}

/// A controller already configured and associated.
pub fn associated_controller() -> (Controller<MockClient>, Rc<RefCell<MockState>>) {
    let (mut controller, state) = mock_controller();
    controller
        .configure("10.0.0.1", "10.0.0.2", "lo")
        .expect("configure");
    controller.associate().expect("associate");
    (controller, state)
}

/// Walks the child IEs of a grouped IE payload.
pub fn children(ie: &Ie) -> Vec<Ie> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset < ie.payload.len() {
        let child = Ie::unmarshal(&ie.payload[offset..]).expect("malformed grouped IE");
        offset += child.len() as usize;
        out.push(child);
    }
    out
}

pub fn find_child(ie: &Ie, ie_type: IeType) -> Option<Ie> {
    children(ie).into_iter().find(|c| c.ie_type == ie_type)
}

pub fn find_children(ie: &Ie, ie_type: IeType) -> Vec<Ie> {
    children(ie)
        .into_iter()
        .filter(|c| c.ie_type == ie_type)
        .collect()
}

pub fn u16_payload(ie: &Ie) -> u16 {
    u16::from_be_bytes(ie.payload[..2].try_into().expect("short u16 payload"))
}

pub fn u32_payload(ie: &Ie) -> u32 {
    u32::from_be_bytes(ie.payload[..4].try_into().expect("short u32 payload"))
}
