// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NfcError>;

#[derive(Debug, Error)]
pub enum NfcError {
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("APDU failed with status {sw1:02X} {sw2:02X}")]
    Apdu { sw1: u8, sw2: u8 },

    #[error("APDU response too short ({0} bytes)")]
    ShortResponse(usize),

    #[error("invalid {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("no card connected")]
    NotConnected,

    #[error("engine link closed")]
    LinkClosed,
}
