// src/cards.rs
use crate::types::{
    ATR_PCSC_RID, CARD_NAME_FELICA, CARD_NAME_JEWEL, CARD_NAME_ULTRALIGHT, TagType,
};

// Maps a contactless ATR built by the reader to an NFC Forum tag type.
//
// Storage cards: 3B 8F 80 01 80 4F 0C A0 00 00 03 06 SS C0 C1 00 00 00 00 TCK
// ISO 14443-4:   3B 8n 80 01 <historical bytes> TCK
pub fn classify_atr(atr: &[u8]) -> Option<TagType> {
    if atr.len() < 4 || atr[0] != 0x3B || atr[1] & 0xF0 != 0x80 || atr[2..4] != [0x80, 0x01] {
        return None;
    }

    if let Some(name) = storage_card_name(atr) {
        return match name {
            CARD_NAME_ULTRALIGHT => Some(TagType::Type2),
            CARD_NAME_JEWEL => Some(TagType::Type1),
            CARD_NAME_FELICA => Some(TagType::Type3),
            // MIFARE Classic and the rest are not NFC Forum platforms
            _ => None,
        };
    }

    Some(TagType::Type4)
}

fn storage_card_name(atr: &[u8]) -> Option<[u8; 2]> {
    // 80 4F 0C <RID:5> SS C0 C1
    if atr.len() < 15 || atr[4..7] != [0x80, 0x4F, 0x0C] || atr[7..12] != ATR_PCSC_RID {
        return None;
    }
    Some([atr[13], atr[14]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_atr(standard: u8, name: [u8; 2]) -> Vec<u8> {
        let mut atr = vec![
            0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06, standard,
        ];
        atr.extend_from_slice(&name);
        atr.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x68]);
        atr
    }

    #[test]
    fn storage_cards() {
        assert_eq!(classify_atr(&storage_atr(0x03, [0x00, 0x03])), Some(TagType::Type2));
        assert_eq!(classify_atr(&storage_atr(0x03, [0x00, 0x2F])), Some(TagType::Type1));
        assert_eq!(classify_atr(&storage_atr(0x11, [0x00, 0x3B])), Some(TagType::Type3));
        // MIFARE Classic 1K
        assert_eq!(classify_atr(&storage_atr(0x03, [0x00, 0x01])), None);
    }

    #[test]
    fn iso_dep_cards_are_type_4() {
        let desfire = [0x3B, 0x81, 0x80, 0x01, 0x80, 0x80];
        assert_eq!(classify_atr(&desfire), Some(TagType::Type4));
    }

    #[test]
    fn contact_and_short_atrs_are_unknown() {
        assert_eq!(classify_atr(&[0x3B, 0x8F]), None);
        assert_eq!(classify_atr(&[0x3B, 0x9F, 0x95, 0x81, 0x31]), None);
        assert_eq!(classify_atr(&[]), None);
    }
}
