// src/apdu.rs
use pcsc::Card;

use crate::error::{NfcError, Result};

// PC/SC part 3 pseudo-APDU: Get Data, P1=00 (UID), Le=00 (full length)
pub const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

// Strips the trailing status word, 0x90 0x00 is success
pub fn check_status(resp: &[u8]) -> Result<&[u8]> {
    if resp.len() < 2 {
        return Err(NfcError::ShortResponse(resp.len()));
    }
    let (data, sw) = resp.split_at(resp.len() - 2);
    if sw[0] == 0x90 && sw[1] == 0x00 {
        Ok(data)
    } else {
        Err(NfcError::Apdu {
            sw1: sw[0],
            sw2: sw[1],
        })
    }
}

pub fn get_uid(card: &Card) -> Result<Vec<u8>> {
    let mut recv_buffer = [0u8; 256];
    let resp = card.transmit(&GET_UID, &mut recv_buffer)?;
    let uid = check_status(resp)?;
    if uid.is_empty() {
        return Err(NfcError::ShortResponse(resp.len()));
    }
    Ok(uid.to_vec())
}
