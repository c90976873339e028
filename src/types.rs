// src/types.rs
use serde::Serialize;

// Controller states, in cycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Reset,
    ResetResponse,
    Discover,
    DiscoverResponse,
    Discovering,
    Deactivate,
    DeactivateResponse,
    Error,
    End,
}

impl State {
    pub const fn label(self) -> &'static str {
        match self {
            State::Reset => "STATE_RESET",
            State::ResetResponse => "STATE_RESET_RESPONSE",
            State::Discover => "STATE_DISCOVER",
            State::DiscoverResponse => "STATE_DISCOVER_RESPONSE",
            State::Discovering => "STATE_DISCOVERING",
            State::Deactivate => "STATE_DEACTIVATE",
            State::DeactivateResponse => "STATE_DEACTIVATE_RESPONSE",
            State::Error => "STATE_ERROR",
            State::End => "STATE_END",
        }
    }

    /// States in which `tick()` only waits for a callback.
    pub const fn is_waiting(self) -> bool {
        matches!(
            self,
            State::ResetResponse
                | State::DiscoverResponse
                | State::Discovering
                | State::DeactivateResponse
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Error | State::End)
    }
}

// Outcome of a tag service request, no finer taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Failed,
}

impl Status {
    pub const fn code(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Failed => 1,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

// Which request a callback answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestId {
    Reset,
    Discover,
    DiscoverActivated,
    Deactivate,
}

impl RequestId {
    pub const fn code(self) -> u16 {
        match self {
            RequestId::Reset => 0,
            RequestId::Discover => 1,
            RequestId::DiscoverActivated => 2,
            RequestId::Deactivate => 3,
        }
    }
}

// NFC Forum tag platforms we can recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Type1,
    Type2,
    Type3,
    Type4,
}

impl TagType {
    pub const fn number(self) -> u8 {
        match self {
            TagType::Type1 => 1,
            TagType::Type2 => 2,
            TagType::Type3 => 3,
            TagType::Type4 => 4,
        }
    }

    pub const fn from_number(n: u8) -> Option<TagType> {
        match n {
            1 => Some(TagType::Type1),
            2 => Some(TagType::Type2),
            3 => Some(TagType::Type3),
            4 => Some(TagType::Type4),
            _ => None,
        }
    }
}

// What the service knows about the activated tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSummary {
    pub tag_type: TagType,
    pub nfcid: Vec<u8>,
}

// Service -> Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Reset,
    Discover,
    Deactivate,
}

// Engine -> Service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ResetDone(Status),
    DiscoverStarted(Status),
    // tag is None when the tag could not be recognised
    Activated {
        status: Status,
        tag: Option<TagSummary>,
    },
    Deactivated(Status),
}

// Report lines printed on stdout when JSON events are enabled
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutgoingMessage {
    TagDetected { tag_type: u8, nfcid: String },
    UnknownTag,
    DetectError { state: &'static str, status: u8 },
}

// PC/SC part 3 ATR layout for storage cards
pub const ATR_PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];
pub const CARD_NAME_ULTRALIGHT: [u8; 2] = [0x00, 0x03]; // Ultralight/NTAG
pub const CARD_NAME_JEWEL: [u8; 2] = [0x00, 0x2F]; // Jewel/Topaz
pub const CARD_NAME_FELICA: [u8; 2] = [0x00, 0x3B]; // FeliCa 212K/424K
