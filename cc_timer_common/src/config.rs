use crate::fmt::log_warn;
use crate::ids::{HwTimer, LogicalTimer};
use crate::modes::Prescale;
use crate::Error;

/// Clock rate of the system clock driving all three units.
pub const DEFAULT_CLOCK_MHZ: u8 = 32;
pub const DEFAULT_PRESCALE: Prescale = Prescale::Div128;

/// Input clock and divisor of one timer.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub clock_mhz: u8,
    pub prescale: Prescale,
}

impl ClockConfig {
    pub const DEFAULT: ClockConfig = ClockConfig {
        clock_mhz: DEFAULT_CLOCK_MHZ,
        prescale: DEFAULT_PRESCALE,
    };

    /// Compare value for a period given in microseconds:
    /// `period * clock_mhz / divisor`, truncated.
    ///
    /// Never rounds up. A product that overflows 32 bits wraps and a result
    /// wider than 16 bits keeps its low half; both are logged, and avoiding
    /// them is up to the caller's choice of period and prescale.
    pub fn compare_count(&self, period_us: u32) -> u16 {
        let clock = u32::from(self.clock_mhz);
        let product = match period_us.checked_mul(clock) {
            Some(product) => product,
            None => {
                log_warn!("period {} us overflows at {} MHz", period_us, self.clock_mhz);
                period_us.wrapping_mul(clock)
            }
        };
        let ticks = product / self.prescale.divisor();
        if ticks > u32::from(u16::MAX) {
            log_warn!("compare count {} truncated to 16 bits", ticks);
        }
        ticks as u16
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Boot-time settings handed to `TimerHal::init`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerHalConfig {
    pub timer0: ClockConfig,
    pub timer2: ClockConfig,
    pub timer3: ClockConfig,
}

impl TimerHalConfig {
    pub fn clock(&self, timer: LogicalTimer) -> ClockConfig {
        match timer {
            LogicalTimer::Timer0 => self.timer0,
            LogicalTimer::Timer2 => self.timer2,
            LogicalTimer::Timer3 => self.timer3,
        }
    }

    pub fn with_clock(mut self, timer: LogicalTimer, clock: ClockConfig) -> Self {
        match timer {
            LogicalTimer::Timer0 => self.timer0 = clock,
            LogicalTimer::Timer2 => self.timer2 = clock,
            LogicalTimer::Timer3 => self.timer3 = clock,
        }
        self
    }

    /// Checks every clock against the unit that backs it: the clock must be
    /// non-zero and the divisor must exist in that unit's prescale table.
    pub fn validate(&self) -> Result<(), Error> {
        for timer in LogicalTimer::ALL {
            let clock = self.clock(timer);
            let width = HwTimer::remap(timer).width();
            if clock.clock_mhz == 0 || width.prescale_bits(clock.prescale).is_none() {
                return Err(Error::ParameterError);
            }
        }
        Ok(())
    }
}
