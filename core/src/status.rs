//! Wire status byte.
//!
//! Every monitor reply carries one of these as its last payload byte; every
//! control point records one in its last-control message. The encoding is
//! the signed-char convention of the bus protocol: success is zero, the
//! hardware codes count down from −1 and the monitor range codes from −10.

/// Status byte appended to monitor replies and stored in last-control
/// records.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Operation successful.
    #[default]
    Ok = 0x00,
    /// Error while communicating with the hardware.
    Error = 0xFF, // -1
    /// Addressed hardware is not installed / submodule out of range.
    HardwRange = 0xFE, // -2
    /// Addressed hardware is locked out (interlock, mode, power state).
    HardwBlocked = 0xFD, // -3
    /// Analog channel still settling; retry the request.
    HardwRetry = 0xFC, // -4
    /// Math-domain failure while scaling a readback.
    HardwConvError = 0xFB, // -5
    /// Stale value returned while an asynchronous update is pending.
    HardwUpdWarning = 0xFA, // -6
    /// Value in the error range.
    ErrorRange = 0xF6, // -10
    /// Value in the warning range.
    WarnRange = 0xF5, // -11
    /// Monitor RCA out of the allowed range.
    CanRange = 0xF4, // -12
}

impl Status {
    /// Decode a wire byte. Unknown bytes map to `Error`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Status::Ok,
            0xFF => Status::Error,
            0xFE => Status::HardwRange,
            0xFD => Status::HardwBlocked,
            0xFC => Status::HardwRetry,
            0xFB => Status::HardwConvError,
            0xFA => Status::HardwUpdWarning,
            0xF6 => Status::ErrorRange,
            0xF5 => Status::WarnRange,
            0xF4 => Status::CanRange,
            _ => Status::Error,
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(Status::Ok as u8, 0x00);
        assert_eq!(Status::Error as u8, 0xFF);
        assert_eq!(Status::HardwBlocked as u8, 0xFD);
        assert_eq!(Status::HardwRetry as u8, 0xFC);
        assert_eq!(Status::CanRange as u8, 0xF4);
    }

    #[test]
    fn test_round_trip() {
        for s in [
            Status::Ok,
            Status::Error,
            Status::HardwRange,
            Status::HardwBlocked,
            Status::HardwRetry,
            Status::HardwConvError,
            Status::HardwUpdWarning,
            Status::ErrorRange,
            Status::WarnRange,
            Status::CanRange,
        ] {
            assert_eq!(Status::from_byte(s as u8), s);
        }
    }

    #[test]
    fn test_unknown_byte_is_error() {
        assert_eq!(Status::from_byte(0x42), Status::Error);
    }
}
