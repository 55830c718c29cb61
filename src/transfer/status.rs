//! Remote result codes and how callers should treat them.

use core::fmt;

/// Status byte carried in every transfer response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    InvalidOperationData,
    OperationInProgress,
    MissPacket,
    SocketBusy,
    VerificationFail,
    Overflow,
    SizeOverLimit,
    FirmwareInternalError,
    NotOpen,
    AccessError,
    NotFound,
    NotValid,
    AlreadyCreated,
    NotEnoughMemory,
    NotImplemented,
    NotSupported,
    FirmwareSocketBusy,
    SocketAlreadyOpen,
    InputDataInvalid,
    NotAuthenticated,
    FirmwareSizeOverLimit,
    Unknown(u8),
}

/// What a status means for the transfer in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Success,
    /// The remote is busy; the whole transfer may be re-attempted later.
    Busy,
    Permanent,
}

impl ResultCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::InvalidOperationData,
            2 => Self::OperationInProgress,
            3 => Self::MissPacket,
            4 => Self::SocketBusy,
            5 => Self::VerificationFail,
            6 => Self::Overflow,
            7 => Self::SizeOverLimit,
            128 => Self::FirmwareInternalError,
            129 => Self::NotOpen,
            130 => Self::AccessError,
            131 => Self::NotFound,
            132 => Self::NotValid,
            133 => Self::AlreadyCreated,
            134 => Self::NotEnoughMemory,
            135 => Self::NotImplemented,
            136 => Self::NotSupported,
            137 => Self::FirmwareSocketBusy,
            138 => Self::SocketAlreadyOpen,
            139 => Self::InputDataInvalid,
            140 => Self::NotAuthenticated,
            141 => Self::FirmwareSizeOverLimit,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::InvalidOperationData => 1,
            Self::OperationInProgress => 2,
            Self::MissPacket => 3,
            Self::SocketBusy => 4,
            Self::VerificationFail => 5,
            Self::Overflow => 6,
            Self::SizeOverLimit => 7,
            Self::FirmwareInternalError => 128,
            Self::NotOpen => 129,
            Self::AccessError => 130,
            Self::NotFound => 131,
            Self::NotValid => 132,
            Self::AlreadyCreated => 133,
            Self::NotEnoughMemory => 134,
            Self::NotImplemented => 135,
            Self::NotSupported => 136,
            Self::FirmwareSocketBusy => 137,
            Self::SocketAlreadyOpen => 138,
            Self::InputDataInvalid => 139,
            Self::NotAuthenticated => 140,
            Self::FirmwareSizeOverLimit => 141,
            Self::Unknown(code) => code,
        }
    }

    pub fn outcome(self) -> StatusOutcome {
        match self {
            Self::Success => StatusOutcome::Success,
            Self::OperationInProgress | Self::SocketBusy | Self::FirmwareSocketBusy => {
                StatusOutcome::Busy
            }
            _ => StatusOutcome::Permanent,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<u8> for ResultCode {
    fn from(code: u8) -> Self {
        Self::from_u8(code)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown ({code})"),
            other => write!(f, "{other:?} ({})", other.code()),
        }
    }
}
