//! An in-process stand-in for the cabinet manager.
//!
//! [`ScriptedManager`] implements [`Transport`] and answers each request
//! synchronously from inside `send`, which is exactly what a fast manager
//! looks like to a blocked category.  Out of the box it accepts the handshake
//! by echoing the requested categories, reports the window as visible, and
//! answers every resource and panel request with `Success`.  Tests override
//! that per category with [`ScriptedManager::respond`], or change the
//! handshake with [`ScriptedManager::offer`] and friends.
//!
//! ```ignore
//! let manager = ScriptedManager::new();
//! client.connect_with(manager.opener())?;
//! manager.emit(CategoryId::RESOURCE_MANAGEMENT, &event)?;
//! client.update();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cablink_core::protocol::{
    decode_body, encode_body, ButtonPanelRequest, ButtonPanelResponse, ConnectionErrorCode,
    ConnectionEvent, ConnectionRequest, ConnectionResponse, GroupResult, GroupsReply,
    InitResponse, ResourceErrorCode, ResourceReply, ResourceRequest, ResourceResponse,
    ShutdownNotice, WindowResponse,
};
use cablink_core::{CategoryDescriptor, CategoryId, Envelope, GroupId, MessageKind, ProtocolError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::fault::{lock, LinkFault};
use crate::transport::{InboundSink, Transport, TransportError};

/// Builds the response body for one request, or `None` to leave it unanswered.
pub type Responder = Box<dyn FnMut(&Envelope) -> Option<Vec<u8>> + Send>;

/// How the manager reacts to the INIT request.
#[derive(Debug, Clone)]
enum InitScript {
    /// Echo whatever the client requested.
    Echo,
    /// Reply `Success` with exactly these categories.
    Offer(Vec<CategoryDescriptor>),
    /// Refuse the connection.
    Refuse(ConnectionErrorCode, String),
    /// Send a shutdown notice instead of a reply.
    Shutdown(String),
}

pub struct ScriptedManager {
    sink: Mutex<Option<Arc<dyn InboundSink>>>,
    init: Mutex<InitScript>,
    window_visible: AtomicBool,
    responders: Mutex<HashMap<CategoryId, Responder>>,
    sent: Mutex<Vec<Envelope>>,
    closed: AtomicBool,
}

impl ScriptedManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            init: Mutex::new(InitScript::Echo),
            window_visible: AtomicBool::new(true),
            responders: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// The `open` argument for `CabinetClient::connect_with`.
    pub fn opener(
        self: &Arc<Self>,
    ) -> impl FnOnce(Arc<dyn InboundSink>) -> Result<Arc<dyn Transport>, TransportError> {
        let manager = Arc::clone(self);
        move |sink| {
            *lock(&manager.sink) = Some(sink);
            manager.closed.store(false, Ordering::SeqCst);
            Ok(manager as Arc<dyn Transport>)
        }
    }

    // ── Scripting ────────────────────────────────────────────────────────────

    /// Answers INIT with `Success` and exactly `categories`.
    pub fn offer(&self, categories: Vec<CategoryDescriptor>) {
        *lock(&self.init) = InitScript::Offer(categories);
    }

    /// Answers INIT with a failure code.
    pub fn refuse(&self, code: ConnectionErrorCode, description: &str) {
        *lock(&self.init) = InitScript::Refuse(code, description.to_string());
    }

    /// Answers INIT with a shutdown notice instead of a response.
    pub fn shut_down_during_init(&self, description: &str) {
        *lock(&self.init) = InitScript::Shutdown(description.to_string());
    }

    /// The visibility reported to `GetVisibility`.
    pub fn set_window_visible(&self, visible: bool) {
        self.window_visible.store(visible, Ordering::SeqCst);
    }

    /// Replaces the default answers for `category`.
    pub fn respond(
        &self,
        category: CategoryId,
        responder: impl FnMut(&Envelope) -> Option<Vec<u8>> + Send + 'static,
    ) {
        lock(&self.responders).insert(category, Box::new(responder));
    }

    // ── Pushing ──────────────────────────────────────────────────────────────

    /// Delivers an event, as if the manager had sent it.
    ///
    /// # Errors
    ///
    /// [`ProtocolError`] if `event` cannot be encoded.
    pub fn emit<T: Serialize>(&self, category: CategoryId, event: &T) -> Result<(), ProtocolError> {
        let body = encode_body(event)?;
        self.deliver(Envelope::event(category, body));
        Ok(())
    }

    /// Delivers a raw envelope.
    pub fn deliver(&self, envelope: Envelope) {
        let sink = lock(&self.sink).clone();
        match sink {
            Some(sink) => sink.deliver(envelope),
            None => debug!("scripted manager has no sink; dropping {envelope:?}"),
        }
    }

    /// Fails the receive path.
    pub fn fail(&self, fault: LinkFault) {
        let sink = lock(&self.sink).clone();
        if let Some(sink) = sink {
            sink.fault(fault);
        }
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// Everything the client sent, in order.
    pub fn sent(&self) -> Vec<Envelope> {
        lock(&self.sent).clone()
    }

    /// Requests sent on `category`, decoded.
    ///
    /// # Errors
    ///
    /// [`ProtocolError`] if a recorded body does not decode as `T`.
    pub fn requests<T: DeserializeOwned>(&self, category: CategoryId) -> Result<Vec<T>, ProtocolError> {
        lock(&self.sent)
            .iter()
            .filter(|e| e.category == category && e.kind == MessageKind::Request)
            .map(|e| decode_body(category, &e.body))
            .collect()
    }

    /// Number of requests sent on `category`.
    pub fn request_count(&self, category: CategoryId) -> usize {
        lock(&self.sent)
            .iter()
            .filter(|e| e.category == category && e.kind == MessageKind::Request)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ── Answering ────────────────────────────────────────────────────────────

    fn answer(&self, request: &Envelope) -> Option<Vec<u8>> {
        if let Some(responder) = lock(&self.responders).get_mut(&request.category) {
            return responder(request);
        }
        match request.category {
            CategoryId::CONNECTION => self.answer_init(request),
            CategoryId::RESOURCE_MANAGEMENT => answer_resource(request),
            CategoryId::BUTTON_PANEL => answer_button_panel(request),
            CategoryId::WINDOW_CONTROL => {
                encode_body(&WindowResponse::Visibility {
                    visible: self.window_visible.load(Ordering::SeqCst),
                })
                .ok()
            }
            _ => None,
        }
    }

    fn answer_init(&self, request: &Envelope) -> Option<Vec<u8>> {
        let ConnectionRequest::Init(init) = decode_body(request.category, &request.body).ok()?;
        let script = lock(&self.init).clone();
        let (error_code, description, categories) = match script {
            InitScript::Echo => (ConnectionErrorCode::Success, String::new(), init.categories),
            InitScript::Offer(offered) => (ConnectionErrorCode::Success, String::new(), offered),
            InitScript::Refuse(code, description) => (code, description, Vec::new()),
            InitScript::Shutdown(description) => {
                let body = encode_body(&ConnectionEvent::Shutdown(ShutdownNotice { description }))
                    .ok()?;
                self.deliver(Envelope::event(CategoryId::CONNECTION, body));
                return None;
            }
        };
        encode_body(&ConnectionResponse::Init(InitResponse {
            error_code,
            description,
            categories,
        }))
        .ok()
    }
}

fn success() -> ResourceReply {
    ResourceReply {
        code: ResourceErrorCode::Success,
        description: String::new(),
    }
}

fn all_granted(groups: &[GroupId]) -> GroupsReply {
    GroupsReply {
        code: ResourceErrorCode::Success,
        description: String::new(),
        results: groups
            .iter()
            .map(|&group| GroupResult {
                group,
                code: ResourceErrorCode::Success,
            })
            .collect(),
    }
}

fn answer_resource(request: &Envelope) -> Option<Vec<u8>> {
    let response = match decode_body(request.category, &request.body).ok()? {
        ResourceRequest::AcquireDevice { .. } => ResourceResponse::AcquireDevice(success()),
        ResourceRequest::ReleaseDevice { .. } => ResourceResponse::ReleaseDevice(success()),
        ResourceRequest::AcquireGroups { groups, .. } => {
            ResourceResponse::AcquireGroups(all_granted(&groups))
        }
        ResourceRequest::ReleaseGroups { groups, .. } => {
            ResourceResponse::ReleaseGroups(all_granted(&groups))
        }
        ResourceRequest::GetConnectedDevicesWithGroups => {
            ResourceResponse::ConnectedDevices(Vec::new())
        }
    };
    encode_body(&response).ok()
}

fn answer_button_panel(request: &Envelope) -> Option<Vec<u8>> {
    let response = match decode_body(request.category, &request.body).ok()? {
        ButtonPanelRequest::RegisterPanel { .. } => ButtonPanelResponse::RegisterPanel(success()),
        ButtonPanelRequest::UnregisterPanel { .. } => {
            ButtonPanelResponse::UnregisterPanel(success())
        }
    };
    encode_body(&response).ok()
}

impl Transport for ScriptedManager {
    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        trace!("scripted manager got {envelope:?}");
        lock(&self.sent).push(envelope.clone());

        if envelope.kind != MessageKind::Request {
            return Ok(());
        }
        if let Some(body) = self.answer(&envelope) {
            self.deliver(Envelope::response(
                envelope.category,
                envelope.request_id,
                body,
            ));
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
