// src/tags.rs
//! Tag API between the detection controller and a protocol engine.
//!
//! The controller issues commands through [`TagService`] and receives the
//! outcomes through [`TagCallbacks`], always from inside
//! [`TagService::poll_once`]. The service talks to the engine below it over a
//! pair of queues created by [`link`].

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use log::{debug, error, warn};

use crate::error::{NfcError, Result};
use crate::types::{EngineCommand, EngineEvent, RequestId, Status, TagSummary};

/// Read-only view of the activated tag.
pub trait TagInterface {
    fn tag_type(&self) -> u8;
    fn nfcid_len(&self) -> usize;
    fn nfcid(&self) -> &[u8];
}

impl TagInterface for TagSummary {
    fn tag_type(&self) -> u8 {
        self.tag_type.number()
    }

    fn nfcid_len(&self) -> usize {
        self.nfcid.len()
    }

    fn nfcid(&self) -> &[u8] {
        &self.nfcid
    }
}

/// Outcome handlers, one per request kind.
pub trait TagCallbacks {
    fn on_reset_complete(&mut self, status: Status, id: RequestId);
    fn on_discover_started(&mut self, status: Status, id: RequestId);
    /// `tag` is only valid for the duration of the call.
    fn on_tag_activated(&mut self, status: Status, id: RequestId, tag: Option<&dyn TagInterface>);
    fn on_deactivate_complete(&mut self, status: Status, id: RequestId);
    fn on_dump_complete(&mut self, status: Status, id: RequestId, data: &[u8]);
}

/// Commands return immediately; their outcome arrives later via `poll_once`.
///
/// After a successful deactivation the service keeps discovery armed, so the
/// next tag arrival is reported without a new `discover()`.
pub trait TagService {
    fn reset(&mut self) -> Status;
    fn discover(&mut self) -> Status;
    fn deactivate(&mut self) -> Status;
    fn poll_once(&mut self, callbacks: &mut dyn TagCallbacks);
    /// The active tag; the same view `on_tag_activated` receives.
    fn interface(&self) -> Option<&dyn TagInterface>;
}

/// Lower layer driving the reader. May block for a bounded time.
pub trait ProtocolEngine {
    fn poll_once(&mut self);
}

// Engine end of the link
pub struct EngineLink {
    pub commands: Receiver<EngineCommand>,
    pub events: Sender<EngineEvent>,
}

impl EngineLink {
    pub fn next_command(&self) -> Option<EngineCommand> {
        self.commands.try_recv().ok()
    }

    pub fn report(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            warn!("Tag service gone, dropping engine event");
        }
    }
}

// Service end of the link
pub struct ServiceLink {
    pub commands: Sender<EngineCommand>,
    pub events: Receiver<EngineEvent>,
}

pub fn link() -> (EngineLink, ServiceLink) {
    let (cmd_tx, cmd_rx) = unbounded::<EngineCommand>();
    let (event_tx, event_rx) = unbounded::<EngineEvent>();
    (
        EngineLink {
            commands: cmd_rx,
            events: event_tx,
        },
        ServiceLink {
            commands: cmd_tx,
            events: event_rx,
        },
    )
}

/// [`TagService`] over any engine reachable through a [`ServiceLink`].
pub struct NfcTags {
    link: ServiceLink,
    pending: Option<RequestId>,
    active: Option<TagSummary>,
}

impl NfcTags {
    pub fn new(link: ServiceLink) -> Self {
        Self {
            link,
            pending: None,
            active: None,
        }
    }

    fn request(&mut self, cmd: EngineCommand, id: RequestId) -> Status {
        if let Some(outstanding) = self.pending {
            error!(
                "Tags: {:?} refused, {:?} still outstanding",
                id, outstanding
            );
            return Status::Failed;
        }

        match self.send(cmd) {
            Ok(()) => {
                self.pending = Some(id);
                Status::Ok
            }
            Err(e) => {
                error!("Tags: {:?} not sent: {}", id, e);
                Status::Failed
            }
        }
    }

    fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.link
            .commands
            .send(cmd)
            .map_err(|_| NfcError::LinkClosed)
    }

    fn dispatch(&mut self, event: EngineEvent, callbacks: &mut dyn TagCallbacks) {
        debug!("Tags: engine event {:?}", event);
        match event {
            EngineEvent::ResetDone(status) => {
                self.pending = None;
                self.active = None;
                callbacks.on_reset_complete(status, RequestId::Reset);
            }
            EngineEvent::DiscoverStarted(status) => {
                self.pending = None;
                callbacks.on_discover_started(status, RequestId::Discover);
            }
            EngineEvent::Activated { status, tag } => {
                self.active = if status.is_ok() { tag } else { None };
                callbacks.on_tag_activated(
                    status,
                    RequestId::DiscoverActivated,
                    self.interface(),
                );
            }
            EngineEvent::Deactivated(status) => {
                self.pending = None;
                if status.is_ok() {
                    self.active = None;
                }
                callbacks.on_deactivate_complete(status, RequestId::Deactivate);
            }
        }
    }
}

impl TagService for NfcTags {
    fn reset(&mut self) -> Status {
        // reset is accepted whatever is outstanding
        self.pending = None;
        self.request(EngineCommand::Reset, RequestId::Reset)
    }

    fn discover(&mut self) -> Status {
        self.request(EngineCommand::Discover, RequestId::Discover)
    }

    fn deactivate(&mut self) -> Status {
        self.request(EngineCommand::Deactivate, RequestId::Deactivate)
    }

    fn poll_once(&mut self, callbacks: &mut dyn TagCallbacks) {
        loop {
            match self.link.events.try_recv() {
                Ok(event) => self.dispatch(event, callbacks),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Tags: engine link closed");
                    break;
                }
            }
        }
    }

    fn interface(&self) -> Option<&dyn TagInterface> {
        self.active.as_ref().map(|t| t as &dyn TagInterface)
    }
}
