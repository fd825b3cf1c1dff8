//! Per-unit programming strategies and the static channel wiring.
//!
//! The 16-bit unit starts and stops through its operating mode field; the
//! 8-bit units have a separate start bit and no stopped mode. Callers of
//! [`TimerUnit`] never see that difference.

use crate::ids::{HwTimer, TimerWidth};
use crate::modes::{Channel, OperatingMode, Prescale};
use crate::registers::{bits, Register, Registers};
use crate::Error;

/// Which registers and bits belong to one hardware unit. Fixed for the
/// lifetime of the program.
#[derive(Debug)]
pub(crate) struct ChannelWiring {
    /// Compare-control register of channel 0.
    pub cctl: Register,
    /// Every compare-control register of the unit, cleared at init.
    pub all_cctl: &'static [Register],
    pub cc_high: Register,
    pub cc_low: Register,
    /// Register holding the overflow interrupt enable bit.
    pub ovf_enable: Register,
    pub ovf_bit: u8,
    /// Module interrupt enable bit in `IEN1`.
    pub int_bit: u8,
    /// Register holding the unit's pending flags.
    pub flags: Register,
    pub overflow_flag: u8,
    pub compare_flags: &'static [(u8, Channel)],
}

impl ChannelWiring {
    /// Every flag bit of this unit.
    pub fn flag_mask(&self) -> u8 {
        self.compare_flags
            .iter()
            .fold(self.overflow_flag, |mask, (bit, _)| mask | bit)
    }
}

/// Register programming for one hardware unit.
pub(crate) trait TimerUnit: Sync {
    fn wiring(&self) -> &ChannelWiring;

    fn width(&self) -> TimerWidth;

    /// Control register holding the prescale and mode fields.
    fn control(&self) -> Register;

    /// Loads the compare value, high byte first.
    fn program_count(&self, regs: &mut dyn Registers, count: u16) {
        let wiring = self.wiring();
        let [high, low] = count.to_be_bytes();
        regs.write(wiring.cc_high, high);
        regs.write(wiring.cc_low, low);
    }

    fn program_prescale(&self, regs: &mut dyn Registers, prescale: Prescale) -> Result<(), Error> {
        let width = self.width();
        let field = width.prescale_bits(prescale).ok_or(Error::ParameterError)?;
        regs.modify(self.control(), width.prescale_mask(), field);
        Ok(())
    }

    fn program_mode(&self, regs: &mut dyn Registers, mode: OperatingMode) -> Result<(), Error> {
        let width = self.width();
        let field = width.mode_bits(mode).ok_or(Error::InvalidOperatingMode)?;
        regs.modify(self.control(), width.mode_mask(), field);
        Ok(())
    }

    fn set_running(&self, regs: &mut dyn Registers, running: bool);
}

/// Hardware Timer 1.
pub(crate) struct WideUnit {
    wiring: ChannelWiring,
}

impl TimerUnit for WideUnit {
    fn wiring(&self) -> &ChannelWiring {
        &self.wiring
    }

    fn width(&self) -> TimerWidth {
        TimerWidth::Wide16
    }

    fn control(&self) -> Register {
        Register::T1Ctl
    }

    fn set_running(&self, regs: &mut dyn Registers, running: bool) {
        // Counting already began when the mode field was written.
        if !running {
            let stopped = TimerWidth::Wide16.mode_bits(OperatingMode::Stopped).unwrap_or(0);
            regs.modify(Register::T1Ctl, TimerWidth::Wide16.mode_mask(), stopped);
        }
    }
}

/// Hardware Timers 3 and 4.
pub(crate) struct NarrowUnit {
    control: Register,
    wiring: ChannelWiring,
}

impl TimerUnit for NarrowUnit {
    fn wiring(&self) -> &ChannelWiring {
        &self.wiring
    }

    fn width(&self) -> TimerWidth {
        TimerWidth::Narrow8
    }

    fn control(&self) -> Register {
        self.control
    }

    fn set_running(&self, regs: &mut dyn Registers, running: bool) {
        if running {
            regs.set_bits(self.control, bits::T34CTL_START);
        } else {
            regs.clear_bits(self.control, bits::T34CTL_START);
        }
    }
}

static TIMER1: WideUnit = WideUnit {
    wiring: ChannelWiring {
        cctl: Register::T1Cctl0,
        all_cctl: &[Register::T1Cctl0, Register::T1Cctl1, Register::T1Cctl2],
        cc_high: Register::T1Cc0H,
        cc_low: Register::T1Cc0L,
        ovf_enable: Register::Timif,
        ovf_bit: bits::TIMIF_T1OVFIM,
        int_bit: bits::IEN1_T1IE,
        flags: Register::T1Ctl,
        overflow_flag: bits::T1CTL_OVFIF,
        compare_flags: &[
            (bits::T1CTL_CH0IF, Channel::A),
            (bits::T1CTL_CH1IF, Channel::B),
            (bits::T1CTL_CH2IF, Channel::C),
        ],
    },
};

// The 8-bit units have a single compare register; it stands in for both
// halves, so the low byte is what it ends up holding.
static TIMER3: NarrowUnit = NarrowUnit {
    control: Register::T3Ctl,
    wiring: ChannelWiring {
        cctl: Register::T3Cctl0,
        all_cctl: &[Register::T3Cctl0, Register::T3Cctl1],
        cc_high: Register::T3Cc0,
        cc_low: Register::T3Cc0,
        ovf_enable: Register::T3Ctl,
        ovf_bit: bits::T34CTL_OVFIM,
        int_bit: bits::IEN1_T3IE,
        flags: Register::Timif,
        overflow_flag: bits::TIMIF_T3OVFIF,
        compare_flags: &[
            (bits::TIMIF_T3CH0IF, Channel::A),
            (bits::TIMIF_T3CH1IF, Channel::B),
        ],
    },
};

static TIMER4: NarrowUnit = NarrowUnit {
    control: Register::T4Ctl,
    wiring: ChannelWiring {
        cctl: Register::T4Cctl0,
        all_cctl: &[Register::T4Cctl0, Register::T4Cctl1],
        cc_high: Register::T4Cc0,
        cc_low: Register::T4Cc0,
        ovf_enable: Register::T4Ctl,
        ovf_bit: bits::T34CTL_OVFIM,
        int_bit: bits::IEN1_T4IE,
        flags: Register::Timif,
        overflow_flag: bits::TIMIF_T4OVFIF,
        compare_flags: &[
            (bits::TIMIF_T4CH0IF, Channel::A),
            (bits::TIMIF_T4CH1IF, Channel::B),
        ],
    },
};

impl HwTimer {
    pub(crate) fn unit(self) -> &'static dyn TimerUnit {
        match self {
            HwTimer::Timer1 => &TIMER1,
            HwTimer::Timer3 => &TIMER3,
            HwTimer::Timer4 => &TIMER4,
        }
    }
}
