// src/app.rs
//! Application context: every layer, owned in one place and polled in a fixed order.

use crossbeam_channel::{Receiver, unbounded};
use log::{error, info};
use std::thread;

use crate::config::{Backend, Config, POLL_INTERVAL};
use crate::error::Result;
use crate::nfc_service::PcscEngine;
use crate::simulator::SimulatedEngine;
use crate::tag_detect::TagDetectController;
use crate::tags::{self, NfcTags, ProtocolEngine, TagService};
use crate::types::{OutgoingMessage, State};

pub struct App {
    engine: Box<dyn ProtocolEngine>,
    tags: NfcTags,
    controller: TagDetectController,
    reports: Receiver<OutgoingMessage>,
    json_events: bool,
}

impl App {
    /// Builds the layers bottom-up: engine, tag service, controller.
    pub fn init(config: &Config) -> Result<Self> {
        let (engine_link, service_link) = tags::link();

        let engine: Box<dyn ProtocolEngine> = match config.backend {
            Backend::Pcsc => Box::new(PcscEngine::init(
                engine_link,
                config.reader_filter.clone(),
            )?),
            Backend::Sim => Box::new(SimulatedEngine::new(
                engine_link,
                config.sim_tags.clone(),
                config.sim_arrival_polls,
            )),
        };

        Ok(Self::with_engine(engine, service_link, config))
    }

    pub fn with_engine(
        engine: Box<dyn ProtocolEngine>,
        service_link: tags::ServiceLink,
        config: &Config,
    ) -> Self {
        let tags = NfcTags::new(service_link);
        let (report_tx, report_rx) = unbounded::<OutgoingMessage>();
        let controller = TagDetectController::new()
            .with_max_detections(config.max_tags)
            .with_reports(report_tx);

        Self {
            engine,
            tags,
            controller,
            reports: report_rx,
            json_events: config.json_events,
        }
    }

    pub fn state(&self) -> State {
        self.controller.state()
    }

    /// One loop iteration: controller, then tag service, then engine.
    pub fn step(&mut self) -> Vec<OutgoingMessage> {
        self.controller.tick(&mut self.tags);
        self.tags.poll_once(&mut self.controller);
        self.engine.poll_once();
        self.reports.try_iter().collect()
    }

    /// Runs until the controller reaches `End`. `Error` keeps the loop idle.
    pub fn run(mut self) {
        let mut reported_error = false;
        loop {
            for msg in self.step() {
                if self.json_events {
                    match serde_json::to_string(&msg) {
                        Ok(line) => println!("{}", line),
                        Err(e) => error!("Failed to encode report: {}", e),
                    }
                }
            }

            match self.state() {
                State::End => {
                    info!(
                        "Tag detection finished after {} tag(s)",
                        self.controller.detections()
                    );
                    return;
                }
                State::Error if !reported_error => {
                    error!("Tag detection stopped, restart required");
                    reported_error = true;
                }
                _ => {}
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimTag;
    use crate::types::{EngineCommand, TagSummary, TagType};

    fn sim_config(max_tags: Option<u32>) -> Config {
        Config {
            backend: Backend::Sim,
            sim_tags: vec![
                SimTag {
                    tag: Some(TagSummary {
                        tag_type: TagType::Type2,
                        nfcid: vec![0x04, 0x9A, 0x3C, 0x1B],
                    }),
                },
                SimTag { tag: None },
            ],
            sim_arrival_polls: 2,
            max_tags,
            ..Config::default()
        }
    }

    fn sim_app(config: &Config, fail: Option<EngineCommand>) -> App {
        let (engine_link, service_link) = tags::link();
        let mut engine =
            SimulatedEngine::new(engine_link, config.sim_tags.clone(), config.sim_arrival_polls);
        if let Some(cmd) = fail {
            engine.fail_next(cmd);
        }
        App::with_engine(Box::new(engine), service_link, config)
    }

    fn run_steps(app: &mut App, steps: usize) -> Vec<OutgoingMessage> {
        (0..steps).flat_map(|_| app.step()).collect()
    }

    #[test]
    fn detects_scripted_tags_until_limit() {
        let config = sim_config(Some(3));
        let mut app = sim_app(&config, None);

        let reports = run_steps(&mut app, 60);

        assert_eq!(app.state(), State::End);
        assert_eq!(
            reports,
            vec![
                OutgoingMessage::TagDetected {
                    tag_type: 2,
                    nfcid: "049A3C1B".into(),
                },
                OutgoingMessage::UnknownTag,
                OutgoingMessage::TagDetected {
                    tag_type: 2,
                    nfcid: "049A3C1B".into(),
                },
            ]
        );
    }

    #[test]
    fn keeps_discovering_without_limit() {
        let config = sim_config(None);
        let mut app = sim_app(&config, None);

        let reports = run_steps(&mut app, 100);

        assert!(reports.len() > 3);
        assert!(!app.state().is_terminal());
    }

    #[test]
    fn failed_reset_stops_in_error() {
        let config = sim_config(None);
        let mut app = sim_app(&config, Some(EngineCommand::Reset));

        let reports = run_steps(&mut app, 20);

        assert_eq!(app.state(), State::Error);
        assert_eq!(
            reports,
            vec![OutgoingMessage::DetectError {
                state: "STATE_RESET_RESPONSE",
                status: 1,
            }]
        );
    }

    #[test]
    fn failed_deactivate_stops_in_error() {
        let config = sim_config(None);
        let mut app = sim_app(&config, Some(EngineCommand::Deactivate));

        let reports = run_steps(&mut app, 40);

        assert_eq!(app.state(), State::Error);
        assert_eq!(reports.len(), 2);
        assert_eq!(
            reports[1],
            OutgoingMessage::DetectError {
                state: "STATE_DEACTIVATE_RESPONSE",
                status: 1,
            }
        );
    }

    #[test]
    fn report_lines_are_tagged_json() {
        let line = serde_json::to_string(&OutgoingMessage::TagDetected {
            tag_type: 2,
            nfcid: "049A3C1B".into(),
        })
        .unwrap();
        assert_eq!(line, r#"{"type":"TAG_DETECTED","tag_type":2,"nfcid":"049A3C1B"}"#);

        let line = serde_json::to_string(&OutgoingMessage::UnknownTag).unwrap();
        assert_eq!(line, r#"{"type":"UNKNOWN_TAG"}"#);
    }
}
