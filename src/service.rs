// src/service.rs

//! Thin RPC-style surface over the controller.
//!
//! Operators drive the simulator through six operations, each returning a
//! `{status_code, message}` pair. The service serializes every operation
//! with one exclusive lock held for its entire duration; the controller
//! itself is not re-entrant.

use crate::client::PfcpClient;
use crate::controller::{Controller, CreateSessionRequest, ModifySessionRequest};
use crate::error::SimError;
use parking_lot::Mutex;

/// Status space mirroring the standard RPC codes the original surface used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Aborted,
    Internal,
    InvalidArgument,
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: StatusCode,
    pub message: String,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

/// Operation classes that map remote failures differently, a historical
/// distinction the original surface exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Create,
    Other,
}

fn respond(op: Op, result: Result<String, SimError>) -> Response {
    match result {
        Ok(message) => Response {
            code: StatusCode::Ok,
            message,
        },
        Err(err) => {
            let code = match (&err, op) {
                (SimError::Precondition(_) | SimError::InvalidArgument(_), _) => {
                    StatusCode::Aborted
                }
                (SimError::Remote(_), Op::Create) => StatusCode::Internal,
                (SimError::Remote(_), Op::Other) => StatusCode::Aborted,
                (SimError::Internal(_), _) => StatusCode::Internal,
            };
            log::warn!("operation failed: {err}");
            Response {
                code,
                message: err.message().to_string(),
            }
        }
    }
}

/// Serialized façade over a [`Controller`].
pub struct Service<C: PfcpClient> {
    controller: Mutex<Controller<C>>,
}

impl<C: PfcpClient> Service<C> {
    pub fn new(client: C) -> Self {
        Service {
            controller: Mutex::new(Controller::new(client)),
        }
    }

    pub fn configure(&self, remote_peer: &str, upf_n3: &str, interface: &str) -> Response {
        let mut controller = self.controller.lock();
        respond(Op::Other, controller.configure(remote_peer, upf_n3, interface))
    }

    pub fn associate(&self) -> Response {
        let mut controller = self.controller.lock();
        respond(Op::Other, controller.associate())
    }

    pub fn disassociate(&self) -> Response {
        let mut controller = self.controller.lock();
        respond(Op::Other, controller.disassociate())
    }

    pub fn create_session(&self, request: &CreateSessionRequest) -> Response {
        let mut controller = self.controller.lock();
        respond(Op::Create, controller.create_session(request))
    }

    pub fn modify_session(&self, request: &ModifySessionRequest) -> Response {
        let mut controller = self.controller.lock();
        respond(Op::Other, controller.modify_session(request))
    }

    pub fn delete_session(&self, base_id: u32, count: u32) -> Response {
        let mut controller = self.controller.lock();
        respond(Op::Other, controller.delete_session(base_id, count))
    }

    /// Number of sessions currently held in the registry.
    pub fn session_count(&self) -> usize {
        self.controller.lock().session_count()
    }
}
