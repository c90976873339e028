// src/tag_detect.rs
//! Tag detection cycle: reset, discover, wait for a tag, deactivate, wait again.
//!
//! `tick()` issues at most one command per call. Outcomes come back through the
//! [`TagCallbacks`] methods. Any failed status or unexpected callback moves the
//! controller to `Error`, which it never leaves.

use crossbeam_channel::Sender;
use log::{Level, debug, error, info};

use crate::logging;
use crate::tags::{TagCallbacks, TagInterface, TagService};
use crate::types::{OutgoingMessage, RequestId, State, Status};

pub struct TagDetectController {
    state: State,
    detections: u32,
    max_detections: Option<u32>,
    reports: Option<Sender<OutgoingMessage>>,
}

impl Default for TagDetectController {
    fn default() -> Self {
        Self::new()
    }
}

impl TagDetectController {
    pub fn new() -> Self {
        Self {
            state: State::Reset,
            detections: 0,
            max_detections: None,
            reports: None,
        }
    }

    /// Stop in `End` once this many tags have been detected and released.
    pub fn with_max_detections(mut self, max: Option<u32>) -> Self {
        self.max_detections = max;
        self
    }

    pub fn with_reports(mut self, reports: Sender<OutgoingMessage>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn detections(&self) -> u32 {
        self.detections
    }

    pub fn tick<S: TagService + ?Sized>(&mut self, tags: &mut S) {
        debug!("TagDetect: tick state = {}", self.state.label());

        let issuing = self.state;
        if issuing.is_waiting() || issuing.is_terminal() {
            return;
        }

        let (status, next) = match issuing {
            State::Reset => (tags.reset(), State::ResetResponse),
            State::Discover => (tags.discover(), State::DiscoverResponse),
            _ => (tags.deactivate(), State::DeactivateResponse),
        };

        if status.is_ok() {
            self.state = next;
        } else {
            error!(
                "TagDetect error: tick status = {} state = {}",
                status.code(),
                issuing.label()
            );
            self.fail(issuing, status);
        }
    }

    // True when the callback is the one the current state waits for and succeeded.
    fn accept(
        &mut self,
        callback: &str,
        waiting: State,
        expected: RequestId,
        status: Status,
        id: RequestId,
    ) -> bool {
        debug!(
            "TagDetect: {} status = {} id = {}",
            callback,
            status.code(),
            id.code()
        );

        if self.state.is_terminal() {
            debug!("TagDetect: {} ignored in {}", callback, self.state.label());
            return false;
        }

        if status.is_ok() && id == expected && self.state == waiting {
            return true;
        }

        error!(
            "TagDetect error: {} status = {} id = {} state = {}",
            callback,
            status.code(),
            id.code(),
            self.state.label()
        );
        self.fail(self.state, status);
        false
    }

    fn fail(&mut self, failing: State, status: Status) {
        self.state = State::Error;
        self.report(OutgoingMessage::DetectError {
            state: failing.label(),
            status: status.code(),
        });
    }

    fn report(&self, msg: OutgoingMessage) {
        if let Some(tx) = &self.reports {
            let _ = tx.send(msg);
        }
    }
}

impl TagCallbacks for TagDetectController {
    fn on_reset_complete(&mut self, status: Status, id: RequestId) {
        if self.accept("on_reset_complete", State::ResetResponse, RequestId::Reset, status, id) {
            info!("TagDetect: NFC stack and HW reset");
            self.state = State::Discover;
        }
    }

    fn on_discover_started(&mut self, status: Status, id: RequestId) {
        if self.accept(
            "on_discover_started",
            State::DiscoverResponse,
            RequestId::Discover,
            status,
            id,
        ) {
            info!("TagDetect: NFC stack discovering tags...");
            self.state = State::Discovering;
        }
    }

    fn on_tag_activated(&mut self, status: Status, id: RequestId, tag: Option<&dyn TagInterface>) {
        if !self.accept(
            "on_tag_activated",
            State::Discovering,
            RequestId::DiscoverActivated,
            status,
            id,
        ) {
            return;
        }

        match tag {
            Some(tag) => {
                let nfcid = tag.nfcid().get(..tag.nfcid_len()).unwrap_or(tag.nfcid());
                info!("TagDetect: tag type {} detected", tag.tag_type());
                logging::dump(Level::Info, "TagDetect: tag NFCID = ", nfcid);
                self.report(OutgoingMessage::TagDetected {
                    tag_type: tag.tag_type(),
                    nfcid: hex::encode_upper(nfcid),
                });
            }
            None => {
                info!("TagDetect: unknown tag type detected");
                self.report(OutgoingMessage::UnknownTag);
            }
        }

        // known or not, release it
        self.detections += 1;
        self.state = State::Deactivate;
    }

    fn on_deactivate_complete(&mut self, status: Status, id: RequestId) {
        if !self.accept(
            "on_deactivate_complete",
            State::DeactivateResponse,
            RequestId::Deactivate,
            status,
            id,
        ) {
            return;
        }

        match self.max_detections {
            Some(max) if self.detections >= max => {
                info!("TagDetect: {} tags detected, stopping", self.detections);
                self.state = State::End;
            }
            // discovery stays armed in the service, no new discover
            _ => self.state = State::Discovering,
        }
    }

    fn on_dump_complete(&mut self, _status: Status, _id: RequestId, _data: &[u8]) {
        // detection only, nothing is dumped
    }
}
