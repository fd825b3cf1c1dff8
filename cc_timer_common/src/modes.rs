//! Tagged timer settings and their raw HAL codes.
//!
//! Validation works on these enums; the register bit patterns they map to live
//! in [`crate::TimerWidth`], per hardware width class.

use crate::Error;

/// How the counter runs.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Counter halted. Only the 16-bit unit has this as a mode.
    Stopped,
    /// Count from 0 to the counter maximum, then wrap.
    FreeRunning,
    /// Count from 0 to the compare value, then wrap.
    Modulo,
}

impl OperatingMode {
    pub const fn code(self) -> u8 {
        match self {
            OperatingMode::FreeRunning => 0x01,
            OperatingMode::Modulo => 0x02,
            OperatingMode::Stopped => 0x03,
        }
    }
}

impl TryFrom<u8> for OperatingMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(OperatingMode::FreeRunning),
            0x02 => Ok(OperatingMode::Modulo),
            0x03 => Ok(OperatingMode::Stopped),
            _ => Err(Error::InvalidOperatingMode),
        }
    }
}

/// Which hardware event a configured timer reports.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Not wired. Rejected by `configure`, a no-op when programming hardware.
    InputCapture,
    OutputCompare,
    Overflow,
}

impl ChannelMode {
    pub const fn code(self) -> u8 {
        match self {
            ChannelMode::InputCapture => 0x01,
            ChannelMode::OutputCompare => 0x02,
            ChannelMode::Overflow => 0x04,
        }
    }
}

impl TryFrom<u8> for ChannelMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(ChannelMode::InputCapture),
            0x02 => Ok(ChannelMode::OutputCompare),
            0x04 => Ok(ChannelMode::Overflow),
            _ => Err(Error::InvalidChannelMode),
        }
    }
}

/// Application-visible sub-channel of a timer.
///
/// Overflow events are always reported on `Single`; compare events name the
/// compare channel whose flag fired.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Single,
    A,
    B,
    C,
}

impl Channel {
    pub const fn code(self) -> u8 {
        match self {
            Channel::Single => 0x01,
            Channel::A => 0x02,
            Channel::B => 0x04,
            Channel::C => 0x08,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Channel::Single),
            0x02 => Ok(Channel::A),
            0x04 => Ok(Channel::B),
            0x08 => Ok(Channel::C),
            _ => Err(Error::ParameterError),
        }
    }
}

/// Clock divisor applied before counting.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prescale {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl Prescale {
    pub const ALL: [Prescale; 8] = [
        Prescale::Div1,
        Prescale::Div2,
        Prescale::Div4,
        Prescale::Div8,
        Prescale::Div16,
        Prescale::Div32,
        Prescale::Div64,
        Prescale::Div128,
    ];

    /// The divisor as a plain integer, for count arithmetic.
    pub const fn divisor(self) -> u32 {
        1 << self.log2()
    }

    pub(crate) const fn log2(self) -> u32 {
        match self {
            Prescale::Div1 => 0,
            Prescale::Div2 => 1,
            Prescale::Div4 => 2,
            Prescale::Div8 => 3,
            Prescale::Div16 => 4,
            Prescale::Div32 => 5,
            Prescale::Div64 => 6,
            Prescale::Div128 => 7,
        }
    }
}
