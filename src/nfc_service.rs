// src/nfc_service.rs
//! PC/SC protocol engine: a desktop reader stands in for the NFC controller.

use log::{debug, error, info, warn};
use pcsc::{
    Card, Context, Disposition, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State,
};
use std::ffi::{CStr, CString};
use std::thread;
use std::time::Duration;

use crate::error::{NfcError, Result};
use crate::tags::{EngineLink, ProtocolEngine};
use crate::types::{EngineCommand, EngineEvent, Status, TagSummary};
use crate::{apdu, cards};

// Longest time one poll may block waiting for the reader
const STATUS_WAIT: Duration = Duration::from_millis(50);
// Pause after a failed status change, doubling up to the max
const ERROR_BACKOFF_MIN: Duration = Duration::from_millis(100);
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

pub struct PcscEngine {
    ctx: Context,
    link: EngineLink,
    reader_filter: Option<String>,
    reader_states: Vec<ReaderState>,
    armed: bool,
    card: Option<Card>,
    failures: u32,
}

impl PcscEngine {
    pub fn init(link: EngineLink, reader_filter: Option<String>) -> Result<Self> {
        let ctx = Context::establish(Scope::User)?;
        info!("PC/SC: context established");

        Ok(Self {
            ctx,
            link,
            reader_filter,
            reader_states: vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)],
            armed: false,
            card: None,
            failures: 0,
        })
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        debug!("PC/SC: command {:?}", cmd);
        match cmd {
            EngineCommand::Reset => {
                self.release_card();
                self.armed = false;
                let status = match self.refresh_readers() {
                    Ok(0) => {
                        warn!("PC/SC: no reader connected yet");
                        Status::Ok
                    }
                    Ok(n) => {
                        info!("PC/SC: {} reader(s) available", n);
                        Status::Ok
                    }
                    Err(e) => {
                        error!("PC/SC: reset failed: {}", e);
                        Status::Failed
                    }
                };
                self.link.report(EngineEvent::ResetDone(status));
            }
            EngineCommand::Discover => {
                self.armed = true;
                // a card already in the field must show up as an arrival
                self.rearm_readers();
                self.link.report(EngineEvent::DiscoverStarted(Status::Ok));
            }
            EngineCommand::Deactivate => {
                let status = match self.disconnect() {
                    Ok(()) => Status::Ok,
                    Err(e) => {
                        error!("PC/SC: deactivate failed: {}", e);
                        Status::Failed
                    }
                };
                self.link.report(EngineEvent::Deactivated(status));
            }
        }
    }

    fn refresh_readers(&mut self) -> Result<usize> {
        let mut readers_buf = [0; 2048];
        let names: Vec<CString> = match self.ctx.list_readers(&mut readers_buf) {
            Ok(iter) => iter
                .filter(|name| accepts(self.reader_filter.as_deref(), name))
                .map(CString::from)
                .collect(),
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        // keep the PnP entry at index 0
        self.reader_states.truncate(1);
        for name in &names {
            self.reader_states
                .push(ReaderState::new(name.clone(), State::UNAWARE));
        }
        Ok(names.len())
    }

    fn rearm_readers(&mut self) {
        for rs in self.reader_states.iter_mut().skip(1) {
            *rs = ReaderState::new(rs.name().to_owned(), State::UNAWARE);
        }
    }

    fn wait_for_change(&mut self) -> Result<()> {
        match self
            .ctx
            .get_status_change(STATUS_WAIT, &mut self.reader_states)
        {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        if self.reader_states[0].event_state().intersects(State::CHANGED) {
            info!("PC/SC: hardware change detected");
            self.reader_states[0].sync_current_state();
            self.refresh_readers()?;
        }

        for i in 1..self.reader_states.len() {
            let rs = &self.reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }

            let (current, event) = (rs.current_state(), rs.event_state());
            let name = rs.name().to_owned();
            self.reader_states[i].sync_current_state();

            if event.intersects(State::EMPTY) && current.intersects(State::PRESENT) {
                info!("PC/SC: card removed from {:?}", name);
            }
            match arrival(self.armed, self.card.is_some(), current, event) {
                Arrival::Activate => {
                    info!("PC/SC: card present on {:?}", name);
                    self.activate(&name);
                }
                Arrival::Ignore => debug!("PC/SC: not discovering, card on {:?} ignored", name),
                Arrival::NoCard => {}
            }
        }
        Ok(())
    }

    fn activate(&mut self, reader: &CStr) {
        let card = match self.ctx.connect(reader, ShareMode::Shared, Protocols::ANY) {
            Ok(card) => card,
            Err(e) => {
                warn!("PC/SC: failed to connect to card: {}", e);
                return;
            }
        };

        let tag = read_summary(&card);
        self.card = Some(card);
        self.link.report(EngineEvent::Activated {
            status: Status::Ok,
            tag,
        });
    }

    fn disconnect(&mut self) -> Result<()> {
        let card = self.card.take().ok_or(NfcError::NotConnected)?;
        match card.disconnect(Disposition::LeaveCard) {
            Ok(()) => Ok(()),
            // already gone from the field
            Err((_, pcsc::Error::RemovedCard)) => Ok(()),
            Err((_, e)) => Err(e.into()),
        }
    }

    fn release_card(&mut self) {
        if self.card.is_some() {
            if let Err(e) = self.disconnect() {
                debug!("PC/SC: card release on reset: {}", e);
            }
        }
    }
}

impl ProtocolEngine for PcscEngine {
    fn poll_once(&mut self) {
        while let Some(cmd) = self.link.next_command() {
            self.handle_command(cmd);
        }

        match self.wait_for_change() {
            Ok(()) => self.failures = 0,
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                if self.failures == 1 {
                    warn!("PC/SC: status change failed: {}", e);
                } else {
                    debug!("PC/SC: status change failed ({} in a row): {}", self.failures, e);
                }
                thread::sleep(backoff(self.failures));
                if let Err(e) = self.refresh_readers() {
                    debug!("PC/SC: reader list unavailable: {}", e);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrival {
    Activate,
    Ignore,
    NoCard,
}

// A card counts as arriving on the PRESENT edge; only acted on while armed and idle
fn arrival(armed: bool, connected: bool, current: State, event: State) -> Arrival {
    if !event.intersects(State::PRESENT) || current.intersects(State::PRESENT) {
        Arrival::NoCard
    } else if armed && !connected {
        Arrival::Activate
    } else {
        Arrival::Ignore
    }
}

fn backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(4);
    (ERROR_BACKOFF_MIN * (1 << shift)).min(ERROR_BACKOFF_MAX)
}

// None when the ATR is not an NFC Forum platform or the UID cannot be read
fn read_summary(card: &Card) -> Option<TagSummary> {
    let mut names_buf = [0u8; 128];
    let mut atr_buf = [0u8; 64];
    let tag_type = match card.status2(&mut names_buf, &mut atr_buf) {
        Ok(status) => {
            debug!("PC/SC: ATR {:02X?}", status.atr());
            cards::classify_atr(status.atr())
        }
        Err(e) => {
            warn!("PC/SC: card status failed: {}", e);
            None
        }
    }?;

    match apdu::get_uid(card) {
        Ok(nfcid) => Some(TagSummary { tag_type, nfcid }),
        Err(e) => {
            warn!("PC/SC: UID read failed: {}", e);
            None
        }
    }
}

fn accepts(filter: Option<&str>, reader: &CStr) -> bool {
    match filter {
        Some(f) => reader.to_string_lossy().contains(f),
        None => true,
    }
}
