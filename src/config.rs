// src/config.rs
use std::time::Duration;

use crate::error::{NfcError, Result};
use crate::types::{TagSummary, TagType};

// Fixed loop timing, not configurable
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
pub const STARTUP_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Pcsc,
    Sim,
}

// One entry of NFC_SIM_TAGS; tag None = unrecognised tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTag {
    pub tag: Option<TagSummary>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub reader_filter: Option<String>,
    pub sim_tags: Vec<SimTag>,
    pub sim_arrival_polls: u32,
    pub max_tags: Option<u32>,
    pub json_events: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Pcsc,
            reader_filter: None,
            sim_tags: vec![SimTag {
                tag: Some(TagSummary {
                    tag_type: TagType::Type2,
                    nfcid: vec![0x04, 0x9A, 0x3C, 0x1B],
                }),
            }],
            sim_arrival_polls: 50,
            max_tags: None,
            json_events: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("NFC_BACKEND") {
            config.backend = match v.trim().to_ascii_lowercase().as_str() {
                "pcsc" => Backend::Pcsc,
                "sim" => Backend::Sim,
                other => {
                    return Err(NfcError::Config {
                        key: "NFC_BACKEND",
                        reason: format!("unknown backend '{}'", other),
                    });
                }
            };
        }

        config.reader_filter = lookup("NFC_READER").filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("NFC_SIM_TAGS") {
            config.sim_tags = parse_sim_tags(&v)?;
        }

        if let Some(v) = lookup("NFC_SIM_ARRIVAL_POLLS") {
            config.sim_arrival_polls = parse_number("NFC_SIM_ARRIVAL_POLLS", &v)?;
        }

        if let Some(v) = lookup("NFC_MAX_TAGS") {
            let max = parse_number("NFC_MAX_TAGS", &v)?;
            if max == 0 {
                return Err(NfcError::Config {
                    key: "NFC_MAX_TAGS",
                    reason: "must be at least 1".into(),
                });
            }
            config.max_tags = Some(max);
        }

        if let Some(v) = lookup("NFC_JSON_EVENTS") {
            config.json_events = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(NfcError::Config {
                        key: "NFC_JSON_EVENTS",
                        reason: format!("expected a boolean, got '{}'", other),
                    });
                }
            };
        }

        Ok(config)
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|e| NfcError::Config {
        key,
        reason: format!("'{}': {}", value, e),
    })
}

// "2:049A3C1B;4:04112233445566"
fn parse_sim_tags(value: &str) -> Result<Vec<SimTag>> {
    let mut tags = Vec::new();
    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (kind, uid) = entry.split_once(':').ok_or_else(|| NfcError::Config {
            key: "NFC_SIM_TAGS",
            reason: format!("'{}' is not type:hexuid", entry),
        })?;
        let number: u8 = kind.trim().parse().map_err(|_| NfcError::Config {
            key: "NFC_SIM_TAGS",
            reason: format!("bad tag type '{}'", kind),
        })?;
        let nfcid = hex::decode(uid.trim())?;

        let tag = match number {
            0 => None,
            n => {
                let tag_type = TagType::from_number(n).ok_or_else(|| NfcError::Config {
                    key: "NFC_SIM_TAGS",
                    reason: format!("tag type {} is not 0-4", n),
                })?;
                Some(TagSummary { tag_type, nfcid })
            }
        };
        tags.push(SimTag { tag });
    }

    if tags.is_empty() {
        return Err(NfcError::Config {
            key: "NFC_SIM_TAGS",
            reason: "no tags listed".into(),
        });
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, Backend::Pcsc);
        assert_eq!(config.reader_filter, None);
        assert_eq!(config.sim_tags.len(), 1);
        assert_eq!(config.sim_arrival_polls, 50);
        assert_eq!(config.max_tags, None);
        assert!(!config.json_events);
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup(&[
            ("NFC_BACKEND", "SIM"),
            ("NFC_READER", "ACR122"),
            ("NFC_SIM_TAGS", "2:049A3C1B; 0:AABB ;4:04112233445566"),
            ("NFC_SIM_ARRIVAL_POLLS", "3"),
            ("NFC_MAX_TAGS", "5"),
            ("NFC_JSON_EVENTS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Sim);
        assert_eq!(config.reader_filter.as_deref(), Some("ACR122"));
        assert_eq!(config.sim_tags.len(), 3);
        assert_eq!(config.sim_tags[1].tag, None);
        assert_eq!(
            config.sim_tags[2].tag,
            Some(TagSummary {
                tag_type: TagType::Type4,
                nfcid: vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            })
        );
        assert_eq!(config.sim_arrival_polls, 3);
        assert_eq!(config.max_tags, Some(5));
        assert!(config.json_events);
    }

    #[test]
    fn rejects_bad_values() {
        for pairs in [
            [("NFC_BACKEND", "i2c")],
            [("NFC_SIM_TAGS", "2-049A")],
            [("NFC_SIM_TAGS", "9:049A")],
            [("NFC_SIM_TAGS", "2:XYZ")],
            [("NFC_SIM_TAGS", " ; ")],
            [("NFC_MAX_TAGS", "0")],
            [("NFC_SIM_ARRIVAL_POLLS", "soon")],
            [("NFC_JSON_EVENTS", "maybe")],
        ] {
            assert!(Config::from_lookup(lookup(&pairs)).is_err(), "{:?}", pairs);
        }
    }
}
