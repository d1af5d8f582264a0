//! `CategoryLink`: one category's request channel and its single response slot.
//!
//! # One outstanding request
//!
//! The slot holds at most one outstanding request id and, once it arrives,
//! that request's response body.  [`CategoryLink::send_request`] refuses to
//! send while a request is outstanding and returns a [`PendingReply`] token;
//! the token is consumed by [`PendingReply::wait`], and dropping it (on error
//! or without waiting) clears the slot.  So "take the response before issuing
//! the next request" is enforced by ownership rather than by convention.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, Weak};

use cablink_core::protocol::{decode_body, encode_body, SequenceCounter};
use cablink_core::{CategoryId, Envelope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use super::CategoryError;
use crate::fault::{lock, FaultMonitor, Gate, LinkFault, Wake};
use crate::transport::Transport;

/// Shared channel plus the fault monitor of the current connection.
#[derive(Clone)]
struct Attachment {
    transport: Arc<dyn Transport>,
    monitor: Arc<FaultMonitor>,
}

#[derive(Debug, Default)]
struct Slot {
    outstanding: Option<u32>,
    reply: Option<Vec<u8>>,
}

/// A category's channel to the manager.
pub struct CategoryLink {
    id: CategoryId,
    attachment: Mutex<Option<Attachment>>,
    slot: Arc<Gate<Slot>>,
    request_ids: SequenceCounter,
}

impl CategoryLink {
    /// Creates a detached link.  Requests fail with `NotInstalled` until
    /// [`attach`](Self::attach) is called.
    pub fn new(id: CategoryId) -> Self {
        Self {
            id,
            attachment: Mutex::new(None),
            slot: Arc::new(Gate::new(Slot::default())),
            request_ids: SequenceCounter::new(),
        }
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    /// Connects the link to the shared transport and the connection's fault
    /// monitor.  Any state left from a previous connection is dropped.
    pub fn attach(&self, transport: Arc<dyn Transport>, monitor: Arc<FaultMonitor>) {
        let gate: Weak<dyn Wake> = Arc::downgrade(&self.slot) as Weak<dyn Wake>;
        monitor.register(gate);
        self.slot.update(|slot| *slot = Slot::default());
        *lock(&self.attachment) = Some(Attachment { transport, monitor });
        debug!("{} attached", self.id);
    }

    /// Disconnects the link.  A waiter already blocked keeps waiting for its
    /// response, a fault, or a shutdown notice.
    pub fn detach(&self) {
        lock(&self.attachment).take();
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.attachment).is_some()
    }

    fn attachment(&self) -> Result<Attachment, CategoryError> {
        lock(&self.attachment)
            .clone()
            .ok_or(CategoryError::NotInstalled(self.id))
    }

    /// Sends `request` and blocks for its response.
    ///
    /// # Errors
    ///
    /// Any error of [`send_request`](Self::send_request) or
    /// [`PendingReply::wait`].
    pub fn request<Req, Resp>(&self, request: &Req) -> Result<Resp, CategoryError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.send_request(request)?.wait()
    }

    /// Sends `request` and returns a token to wait on for the response.
    ///
    /// # Errors
    ///
    /// - [`CategoryError::NotInstalled`] when detached.
    /// - [`CategoryError::Fault`] when the connection has already faulted.
    /// - [`CategoryError::RequestInFlight`] when a response is still pending.
    /// - [`CategoryError::Protocol`] / [`CategoryError::Transport`] when the
    ///   request cannot be encoded or sent.
    pub fn send_request<Req, Resp>(
        &self,
        request: &Req,
    ) -> Result<PendingReply<'_, Resp>, CategoryError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let Attachment { transport, monitor } = self.attachment()?;
        monitor.check()?;

        let body = encode_body(request)?;
        let request_id = self.request_ids.next();
        self.slot.update(|slot| {
            if slot.outstanding.is_some() {
                return Err(CategoryError::RequestInFlight(self.id));
            }
            slot.outstanding = Some(request_id);
            slot.reply = None;
            Ok(())
        })?;

        // From here on the token owns the slot; dropping it on a send error
        // frees the slot again.
        let pending = PendingReply {
            link: self,
            monitor,
            request_id,
            _reply: PhantomData,
        };
        trace!("{} sending request {request_id}", self.id);
        transport.send(Envelope::request(self.id, request_id, body))?;
        Ok(pending)
    }

    /// Sends a one-way event body (no response expected).
    ///
    /// # Errors
    ///
    /// [`CategoryError::NotInstalled`], or an encode/transport error.
    pub fn send_event<Msg: Serialize>(&self, message: &Msg) -> Result<(), CategoryError> {
        let Attachment { transport, .. } = self.attachment()?;
        let body = encode_body(message)?;
        transport.send(Envelope::event(self.id, body))?;
        Ok(())
    }

    /// Stores a response body for the outstanding request and wakes its waiter.
    ///
    /// The body is not decoded here; a malformed body surfaces as a
    /// `Protocol` error to the waiting caller.
    ///
    /// # Errors
    ///
    /// [`CategoryError::UnsolicitedResponse`] when `request_id` is not the
    /// outstanding request.
    pub fn store_response(&self, request_id: u32, body: &[u8]) -> Result<(), CategoryError> {
        self.slot.update(|slot| {
            if slot.outstanding != Some(request_id) || slot.reply.is_some() {
                return Err(CategoryError::UnsolicitedResponse {
                    category: self.id,
                    request_id,
                });
            }
            slot.reply = Some(body.to_vec());
            Ok(())
        })
    }

    /// Raises `fault` on the attached connection, waking every blocked waiter.
    /// Ignored while detached.
    pub fn raise_fault(&self, fault: LinkFault) {
        match self.attachment() {
            Ok(attachment) => attachment.monitor.raise(fault),
            Err(_) => debug!("{} detached; dropping {fault}", self.id),
        }
    }

    /// Returns `true` while a request awaits its response.
    pub fn has_outstanding_request(&self) -> bool {
        self.slot.lock().outstanding.is_some()
    }
}

/// Proof that a request is outstanding; consumed to obtain the response.
#[must_use = "dropping a PendingReply abandons the response"]
pub struct PendingReply<'a, Resp> {
    link: &'a CategoryLink,
    monitor: Arc<FaultMonitor>,
    request_id: u32,
    _reply: PhantomData<fn() -> Resp>,
}

impl<Resp: DeserializeOwned> PendingReply<'_, Resp> {
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Blocks until the response arrives or the connection faults, then
    /// takes it out of the slot and decodes it.
    ///
    /// # Errors
    ///
    /// [`CategoryError::Fault`] if the fault monitor fires first, and
    /// [`CategoryError::Protocol`] if the body does not decode.
    pub fn wait(self) -> Result<Resp, CategoryError> {
        let id = self.request_id;
        let body = self.link.slot.wait_until(&self.monitor, |slot| {
            let body = slot.reply.take()?;
            if slot.outstanding == Some(id) {
                slot.outstanding = None;
            }
            Some(body)
        })?;
        Ok(decode_body(self.link.id, &body)?)
    }
}

impl<Resp> Drop for PendingReply<'_, Resp> {
    fn drop(&mut self) {
        let id = self.request_id;
        self.link.slot.update(|slot| {
            if slot.outstanding == Some(id) {
                slot.outstanding = None;
                slot.reply = None;
            }
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
