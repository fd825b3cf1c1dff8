use core::convert::Infallible;

use thiserror_no_std::Error;

/// Failure of a timer service call.
///
/// Every variant is local to the call that produced it: nothing is retried
/// internally and no state was changed by a call that returned an error.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The logical timer id does not map to a hardware timer.
    #[error("invalid timer id")]
    InvalidTimerId,
    /// A configuration field is outside the range the timer supports.
    #[error("timer parameter out of range")]
    ParameterError,
    /// `start` was called before a successful `configure`.
    #[error("timer not configured")]
    NotConfigured,
    #[error("invalid operating mode")]
    InvalidOperatingMode,
    #[error("invalid channel mode")]
    InvalidChannelMode,
}

impl Error {
    /// Raw HAL status byte for callers that still speak the numeric protocol.
    /// Success is `0x00` and is never produced here.
    pub const fn status_code(self) -> u8 {
        match self {
            Error::ParameterError => 0x02,
            Error::NotConfigured => 0x03,
            Error::InvalidTimerId => 0x04,
            Error::InvalidChannelMode => 0x05,
            Error::InvalidOperatingMode => 0x06,
        }
    }
}

// Lets every operation accept either a typed `LogicalTimer` or a raw id byte.
impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_hal_protocol() {
        assert_eq!(Error::ParameterError.status_code(), 0x02);
        assert_eq!(Error::NotConfigured.status_code(), 0x03);
        assert_eq!(Error::InvalidTimerId.status_code(), 0x04);
        assert_eq!(Error::InvalidChannelMode.status_code(), 0x05);
        assert_eq!(Error::InvalidOperatingMode.status_code(), 0x06);
    }
}
