//! Device status codes reported in reply to a `Ping` packet.

use std::fmt;

/// The controller's protocol/execution state.
///
/// Codes the firmware does not define are kept as [`Status::Unknown`] so the
/// raw value is never lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Idle,
    UnexpectedContError,
    CrcError,
    ReceivingMessage,
    Executing,
    MessageError,
    BusyError,
    WrongMessageError,
    Unknown(u8),
}

impl Status {
    /// Decodes a raw status byte.  Code 5 is reserved and maps to `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Status::Idle,
            1 => Status::UnexpectedContError,
            2 => Status::CrcError,
            3 => Status::ReceivingMessage,
            4 => Status::Executing,
            6 => Status::MessageError,
            7 => Status::BusyError,
            8 => Status::WrongMessageError,
            other => Status::Unknown(other),
        }
    }

    /// Returns the raw status byte.
    pub fn code(&self) -> u8 {
        match self {
            Status::Idle => 0,
            Status::UnexpectedContError => 1,
            Status::CrcError => 2,
            Status::ReceivingMessage => 3,
            Status::Executing => 4,
            Status::MessageError => 6,
            Status::BusyError => 7,
            Status::WrongMessageError => 8,
            Status::Unknown(code) => *code,
        }
    }

    /// `true` for the codes that report a failed message.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Status::UnexpectedContError
                | Status::CrcError
                | Status::MessageError
                | Status::BusyError
                | Status::WrongMessageError
                | Status::Unknown(_)
        )
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        Status::from_code(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => f.write_str("idle"),
            Status::UnexpectedContError => f.write_str("unexpected cont packet"),
            Status::CrcError => f.write_str("crc error"),
            Status::ReceivingMessage => f.write_str("receiving message"),
            Status::Executing => f.write_str("executing"),
            Status::MessageError => f.write_str("message error (malformed)"),
            Status::BusyError => f.write_str("requested operation while device busy"),
            Status::WrongMessageError => f.write_str("unknown message received"),
            Status::Unknown(code) => write!(f, "unknown status {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_round_trips_defined_codes() {
        for code in [0u8, 1, 2, 3, 4, 6, 7, 8] {
            assert_eq!(Status::from_code(code).code(), code);
            assert!(!matches!(Status::from_code(code), Status::Unknown(_)));
        }
    }

    #[test]
    fn test_reserved_code_is_unknown() {
        assert_eq!(Status::from_code(5), Status::Unknown(5));
        assert_eq!(Status::from_code(5).code(), 5);
    }

    #[test]
    fn test_busy_states_are_not_errors() {
        assert!(!Status::Idle.is_error());
        assert!(!Status::Executing.is_error());
        assert!(!Status::ReceivingMessage.is_error());
        assert!(Status::CrcError.is_error());
    }

    #[test]
    fn test_display_uses_device_descriptions() {
        assert_eq!(Status::CrcError.to_string(), "crc error");
        assert_eq!(
            Status::BusyError.to_string(),
            "requested operation while device busy"
        );
    }
}
