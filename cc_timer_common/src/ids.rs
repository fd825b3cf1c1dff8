//! Logical timer ids, the hardware units behind them, and the fixed remap.
//!
//! ```text
//! LogicalTimer::Timer0 --> hardware Timer 3 (8-bit)
//! LogicalTimer::Timer2 --> hardware Timer 4 (8-bit)
//! LogicalTimer::Timer3 --> hardware Timer 1 (16-bit)
//! ```

use crate::modes::{Channel, OperatingMode, Prescale};
use crate::Error;

/// Caller-visible timer identity, stable across hardware revisions.
///
/// Raw id `0x01` belongs to the radio MAC timer and is not available here.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalTimer {
    Timer0,
    Timer2,
    Timer3,
}

impl LogicalTimer {
    pub const ALL: [LogicalTimer; 3] =
        [LogicalTimer::Timer0, LogicalTimer::Timer2, LogicalTimer::Timer3];

    pub const fn code(self) -> u8 {
        match self {
            LogicalTimer::Timer0 => 0x00,
            LogicalTimer::Timer2 => 0x02,
            LogicalTimer::Timer3 => 0x03,
        }
    }

    /// Width class of the hardware unit backing this timer.
    pub const fn width(self) -> TimerWidth {
        HwTimer::remap(self).width()
    }
}

impl TryFrom<u8> for LogicalTimer {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(LogicalTimer::Timer0),
            0x02 => Ok(LogicalTimer::Timer2),
            0x03 => Ok(LogicalTimer::Timer3),
            _ => Err(Error::InvalidTimerId),
        }
    }
}

/// Physical timer unit. Never exposed to callers.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HwTimer {
    Timer1,
    Timer3,
    Timer4,
}

impl HwTimer {
    pub(crate) const ALL: [HwTimer; 3] = [HwTimer::Timer1, HwTimer::Timer3, HwTimer::Timer4];

    pub(crate) const fn remap(timer: LogicalTimer) -> HwTimer {
        match timer {
            LogicalTimer::Timer0 => HwTimer::Timer3,
            LogicalTimer::Timer2 => HwTimer::Timer4,
            LogicalTimer::Timer3 => HwTimer::Timer1,
        }
    }

    /// Inverse of [`HwTimer::remap`].
    pub(crate) const fn logical(self) -> LogicalTimer {
        match self {
            HwTimer::Timer1 => LogicalTimer::Timer3,
            HwTimer::Timer3 => LogicalTimer::Timer0,
            HwTimer::Timer4 => LogicalTimer::Timer2,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    pub(crate) const fn width(self) -> TimerWidth {
        match self {
            HwTimer::Timer1 => TimerWidth::Wide16,
            HwTimer::Timer3 | HwTimer::Timer4 => TimerWidth::Narrow8,
        }
    }
}

/// Width class of a hardware timer unit.
///
/// Owns the table-driven mapping from settings to register bit patterns, since
/// the 16-bit and 8-bit units encode prescale and operating mode differently.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerWidth {
    Wide16,
    Narrow8,
}

const WIDE_PRESCALE: [(Prescale, u8); 4] = [
    (Prescale::Div1, 0x00),
    (Prescale::Div8, 0x04),
    (Prescale::Div32, 0x08),
    (Prescale::Div128, 0x0c),
];

const WIDE_MODES: [(OperatingMode, u8); 3] = [
    (OperatingMode::Stopped, 0x00),
    (OperatingMode::FreeRunning, 0x01),
    (OperatingMode::Modulo, 0x02),
];

const NARROW_MODES: [(OperatingMode, u8); 2] = [
    (OperatingMode::FreeRunning, 0x00),
    (OperatingMode::Modulo, 0x02),
];

impl TimerWidth {
    /// Control register bits holding the prescale field.
    pub const fn prescale_mask(self) -> u8 {
        match self {
            TimerWidth::Wide16 => 0x0c,
            TimerWidth::Narrow8 => 0xe0,
        }
    }

    /// Control register bits holding the operating mode field.
    pub const fn mode_mask(self) -> u8 {
        0x03
    }

    /// Largest counter value before the unit overflows.
    pub const fn counter_max(self) -> u16 {
        match self {
            TimerWidth::Wide16 => 0xffff,
            TimerWidth::Narrow8 => 0x00ff,
        }
    }

    /// Encoded prescale field, or `None` if this width cannot divide by `prescale`.
    pub fn prescale_bits(self, prescale: Prescale) -> Option<u8> {
        match self {
            TimerWidth::Wide16 => WIDE_PRESCALE
                .iter()
                .find(|(p, _)| *p == prescale)
                .map(|(_, bits)| *bits),
            // Bits 7:5 hold log2 of the divisor.
            TimerWidth::Narrow8 => Some((prescale.log2() as u8) << 5),
        }
    }

    /// Decodes the prescale field of a control register value.
    pub fn prescale_from_bits(self, ctl: u8) -> Option<Prescale> {
        let field = ctl & self.prescale_mask();
        match self {
            TimerWidth::Wide16 => WIDE_PRESCALE
                .iter()
                .find(|(_, bits)| *bits == field)
                .map(|(p, _)| *p),
            TimerWidth::Narrow8 => Prescale::ALL.get(usize::from(field >> 5)).copied(),
        }
    }

    /// Encoded operating mode field, or `None` if the unit has no such mode.
    pub fn mode_bits(self, mode: OperatingMode) -> Option<u8> {
        let table: &[(OperatingMode, u8)] = match self {
            TimerWidth::Wide16 => &WIDE_MODES,
            TimerWidth::Narrow8 => &NARROW_MODES,
        };
        table.iter().find(|(m, _)| *m == mode).map(|(_, bits)| *bits)
    }

    /// Decodes the operating mode field of a control register value.
    ///
    /// The 8-bit units use `0x01` for down-counting, which is not modeled.
    pub fn mode_from_bits(self, ctl: u8) -> Option<OperatingMode> {
        let field = ctl & self.mode_mask();
        let table: &[(OperatingMode, u8)] = match self {
            TimerWidth::Wide16 => &WIDE_MODES,
            TimerWidth::Narrow8 => &NARROW_MODES,
        };
        table.iter().find(|(_, bits)| *bits == field).map(|(m, _)| *m)
    }

    pub fn supports_mode(self, mode: OperatingMode) -> bool {
        self.mode_bits(mode).is_some()
    }

    /// Whether `channel` exists on this width: three compare channels on the
    /// 16-bit unit, two on the 8-bit units, `Single` everywhere.
    pub const fn supports_channel(self, channel: Channel) -> bool {
        match (self, channel) {
            (_, Channel::Single | Channel::A | Channel::B) => true,
            (TimerWidth::Wide16, Channel::C) => true,
            (TimerWidth::Narrow8, Channel::C) => false,
        }
    }
}
