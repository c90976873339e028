// src/simulator.rs
//! Scripted protocol engine, for running the detection loop without a reader.

use log::{debug, info};

use crate::config::SimTag;
use crate::tags::{EngineLink, ProtocolEngine};
use crate::types::{EngineCommand, EngineEvent, Status};

pub struct SimulatedEngine {
    link: EngineLink,
    script: Vec<SimTag>,
    next_tag: usize,
    arrival_polls: u32,
    countdown: u32,
    ready: bool,
    armed: bool,
    active: bool,
    fail_next: Vec<EngineCommand>,
}

impl SimulatedEngine {
    pub fn new(link: EngineLink, script: Vec<SimTag>, arrival_polls: u32) -> Self {
        info!(
            "Sim: {} scripted tag(s), one every {} polls",
            script.len(),
            arrival_polls
        );
        Self {
            link,
            script,
            next_tag: 0,
            arrival_polls,
            countdown: arrival_polls,
            ready: false,
            armed: false,
            active: false,
            fail_next: Vec::new(),
        }
    }

    /// The next outcome reported for `cmd` will be `Failed`.
    #[cfg(test)]
    pub fn fail_next(&mut self, cmd: EngineCommand) {
        self.fail_next.push(cmd);
    }

    fn injected_failure(&mut self, cmd: EngineCommand) -> bool {
        match self.fail_next.iter().position(|c| *c == cmd) {
            Some(i) => {
                self.fail_next.remove(i);
                true
            }
            None => false,
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        debug!("Sim: command {:?}", cmd);
        let ok = !self.injected_failure(cmd);

        match cmd {
            EngineCommand::Reset => {
                self.ready = ok;
                self.armed = false;
                self.active = false;
                self.link.report(EngineEvent::ResetDone(status(ok)));
            }
            EngineCommand::Discover => {
                let ok = ok && self.ready;
                if ok {
                    self.armed = true;
                    self.countdown = self.arrival_polls;
                }
                self.link.report(EngineEvent::DiscoverStarted(status(ok)));
            }
            EngineCommand::Deactivate => {
                let ok = ok && self.active;
                if ok {
                    self.active = false;
                    self.countdown = self.arrival_polls;
                }
                self.link.report(EngineEvent::Deactivated(status(ok)));
            }
        }
    }

    fn present_next(&mut self) {
        let Some(entry) = self.script.get(self.next_tag) else {
            return;
        };
        let tag = entry.tag.clone();
        self.next_tag = (self.next_tag + 1) % self.script.len();
        self.active = true;

        debug!("Sim: presenting {:?}", tag);
        self.link.report(EngineEvent::Activated {
            status: Status::Ok,
            tag,
        });
    }
}

impl ProtocolEngine for SimulatedEngine {
    fn poll_once(&mut self) {
        while let Some(cmd) = self.link.next_command() {
            self.handle_command(cmd);
        }

        if !self.armed || self.active {
            return;
        }
        if self.countdown == 0 {
            self.present_next();
        } else {
            self.countdown -= 1;
        }
    }
}

fn status(ok: bool) -> Status {
    if ok { Status::Ok } else { Status::Failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::link;
    use crate::types::{TagSummary, TagType};

    fn script() -> Vec<SimTag> {
        vec![
            SimTag {
                tag: Some(TagSummary {
                    tag_type: TagType::Type2,
                    nfcid: vec![0x04, 0x9A, 0x3C, 0x1B],
                }),
            },
            SimTag { tag: None },
        ]
    }

    fn events(service: &crate::tags::ServiceLink) -> Vec<EngineEvent> {
        service.events.try_iter().collect()
    }

    #[test]
    fn presents_tags_in_turn_after_discover() {
        let (engine_link, service) = link();
        let mut engine = SimulatedEngine::new(engine_link, script(), 1);

        service.commands.send(EngineCommand::Reset).unwrap();
        service.commands.send(EngineCommand::Discover).unwrap();
        engine.poll_once();
        assert_eq!(
            events(&service),
            vec![
                EngineEvent::ResetDone(Status::Ok),
                EngineEvent::DiscoverStarted(Status::Ok),
            ]
        );

        engine.poll_once();
        match events(&service).as_slice() {
            [EngineEvent::Activated { status: Status::Ok, tag: Some(tag) }] => {
                assert_eq!(tag.tag_type, TagType::Type2)
            }
            other => panic!("unexpected {:?}", other),
        }

        // no second tag while one is active
        engine.poll_once();
        engine.poll_once();
        assert!(events(&service).is_empty());

        service.commands.send(EngineCommand::Deactivate).unwrap();
        engine.poll_once();
        engine.poll_once();
        assert_eq!(
            events(&service),
            vec![
                EngineEvent::Deactivated(Status::Ok),
                EngineEvent::Activated {
                    status: Status::Ok,
                    tag: None,
                },
            ]
        );
    }

    #[test]
    fn discover_before_reset_fails() {
        let (engine_link, service) = link();
        let mut engine = SimulatedEngine::new(engine_link, script(), 0);

        service.commands.send(EngineCommand::Discover).unwrap();
        engine.poll_once();
        assert_eq!(
            events(&service),
            vec![EngineEvent::DiscoverStarted(Status::Failed)]
        );
    }

    #[test]
    fn deactivate_without_tag_fails() {
        let (engine_link, service) = link();
        let mut engine = SimulatedEngine::new(engine_link, script(), 0);

        service.commands.send(EngineCommand::Deactivate).unwrap();
        engine.poll_once();
        assert_eq!(
            events(&service),
            vec![EngineEvent::Deactivated(Status::Failed)]
        );
    }

    #[test]
    fn injected_failure_applies_once() {
        let (engine_link, service) = link();
        let mut engine = SimulatedEngine::new(engine_link, script(), 0);
        engine.fail_next(EngineCommand::Reset);

        service.commands.send(EngineCommand::Reset).unwrap();
        service.commands.send(EngineCommand::Reset).unwrap();
        engine.poll_once();
        assert_eq!(
            events(&service),
            vec![
                EngineEvent::ResetDone(Status::Failed),
                EngineEvent::ResetDone(Status::Ok),
            ]
        );
    }
}
