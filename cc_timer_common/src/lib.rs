#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! Three logical timers on the CC2430 timer units.
//!
//! Logical Timer 0 runs on the 8-bit hardware Timer 3, logical Timer 2 on the
//! 8-bit hardware Timer 4, and logical Timer 3 on the 16-bit hardware Timer 1.
//! Callers configure a timer, start it with a period in microseconds and get
//! their callback invoked for each compare or overflow event, either from the
//! unit's interrupt vector or from a periodic [`TimerHal::tick`].

// Must come first so the logging macros are visible to the other modules.
mod fmt;

mod config;
mod dispatch;
mod error;
mod hal;
mod ids;
mod modes;
mod registers;
mod unit;

pub use config::{ClockConfig, TimerHalConfig, DEFAULT_CLOCK_MHZ, DEFAULT_PRESCALE};
pub use error::Error;
pub use hal::{Callback, TimerHal, TimerStatus};
pub use ids::{LogicalTimer, TimerWidth};
pub use modes::{Channel, ChannelMode, OperatingMode, Prescale};
pub use registers::{bits, MmioRegisters, Register, RegisterFile, Registers};
