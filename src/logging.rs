// src/logging.rs
use log::Level;

pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

// "04 9A 3C 1B"
pub fn format_bytes(buf: &[u8]) -> String {
    buf.iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logs `label` followed by the buffer as spaced hex.
pub fn dump(level: Level, label: &str, buf: &[u8]) {
    log::log!(level, "{}{} ({} bytes)", label, format_bytes(buf), buf.len());
}
