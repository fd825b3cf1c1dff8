//! Counting model of the three timer units, driven against a `RegisterFile`.
//!
//! Reads the control registers the layer programs, advances each running
//! counter at its prescaled rate and raises the compare and overflow flags
//! where the silicon would.

use std::time::Duration;

use cc_timer_common::{
    bits, LogicalTimer, OperatingMode, Register, RegisterFile, TimerHal, TimerHalConfig, TimerWidth,
};
use log::trace;
use tokio::time;

use crate::report::EventLog;

/// Interrupt vector of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    Timer1,
    Timer3,
    Timer4,
}

impl Vector {
    pub fn raise(self, hal: &TimerHal<'_, RegisterFile>) {
        match self {
            Vector::Timer1 => hal.timer1_vector(),
            Vector::Timer3 => hal.timer3_vector(),
            Vector::Timer4 => hal.timer4_vector(),
        }
    }
}

struct UnitSpec {
    vector: Vector,
    /// Logical timer whose clock feeds this unit.
    clock_of: LogicalTimer,
    width: TimerWidth,
    ctl: Register,
    cctl0: Register,
    cc_high: Register,
    cc_low: Register,
    flags: Register,
    overflow_flag: u8,
    compare_flag: u8,
    overflow_mask: (Register, u8),
    /// Compare flags and the control register holding their interrupt mask.
    compare_masks: &'static [(u8, Register)],
    ien1_bit: u8,
}

const UNITS: [UnitSpec; 3] = [
    UnitSpec {
        vector: Vector::Timer1,
        clock_of: LogicalTimer::Timer3,
        width: TimerWidth::Wide16,
        ctl: Register::T1Ctl,
        cctl0: Register::T1Cctl0,
        cc_high: Register::T1Cc0H,
        cc_low: Register::T1Cc0L,
        flags: Register::T1Ctl,
        overflow_flag: bits::T1CTL_OVFIF,
        compare_flag: bits::T1CTL_CH0IF,
        overflow_mask: (Register::Timif, bits::TIMIF_T1OVFIM),
        compare_masks: &[
            (bits::T1CTL_CH0IF, Register::T1Cctl0),
            (bits::T1CTL_CH1IF, Register::T1Cctl1),
            (bits::T1CTL_CH2IF, Register::T1Cctl2),
        ],
        ien1_bit: bits::IEN1_T1IE,
    },
    UnitSpec {
        vector: Vector::Timer3,
        clock_of: LogicalTimer::Timer0,
        width: TimerWidth::Narrow8,
        ctl: Register::T3Ctl,
        cctl0: Register::T3Cctl0,
        cc_high: Register::T3Cc0,
        cc_low: Register::T3Cc0,
        flags: Register::Timif,
        overflow_flag: bits::TIMIF_T3OVFIF,
        compare_flag: bits::TIMIF_T3CH0IF,
        overflow_mask: (Register::T3Ctl, bits::T34CTL_OVFIM),
        compare_masks: &[
            (bits::TIMIF_T3CH0IF, Register::T3Cctl0),
            (bits::TIMIF_T3CH1IF, Register::T3Cctl1),
        ],
        ien1_bit: bits::IEN1_T3IE,
    },
    UnitSpec {
        vector: Vector::Timer4,
        clock_of: LogicalTimer::Timer2,
        width: TimerWidth::Narrow8,
        ctl: Register::T4Ctl,
        cctl0: Register::T4Cctl0,
        cc_high: Register::T4Cc0,
        cc_low: Register::T4Cc0,
        flags: Register::Timif,
        overflow_flag: bits::TIMIF_T4OVFIF,
        compare_flag: bits::TIMIF_T4CH0IF,
        overflow_mask: (Register::T4Ctl, bits::T34CTL_OVFIM),
        compare_masks: &[
            (bits::TIMIF_T4CH0IF, Register::T4Cctl0),
            (bits::TIMIF_T4CH1IF, Register::T4Cctl1),
        ],
        ien1_bit: bits::IEN1_T4IE,
    },
];

impl UnitSpec {
    /// Operating mode if the unit is counting.
    fn running_mode(&self, regs: &RegisterFile) -> Option<OperatingMode> {
        let ctl = regs.peek(self.ctl);
        if self.width == TimerWidth::Narrow8 && ctl & bits::T34CTL_START == 0 {
            return None;
        }
        match self.width.mode_from_bits(ctl)? {
            OperatingMode::Stopped => None,
            mode => Some(mode),
        }
    }

    fn compare_value(&self, regs: &RegisterFile) -> u16 {
        match self.width {
            TimerWidth::Wide16 => {
                u16::from_be_bytes([regs.peek(self.cc_high), regs.peek(self.cc_low)])
            }
            TimerWidth::Narrow8 => u16::from(regs.peek(self.cc_low)),
        }
    }

    /// Pending flags whose interrupt mask is set.
    fn armed(&self, regs: &RegisterFile) -> u8 {
        let pending = regs.peek(self.flags);
        let (mask_reg, mask_bit) = self.overflow_mask;
        let mut armed = 0;
        if pending & self.overflow_flag != 0 && regs.peek(mask_reg) & mask_bit != 0 {
            armed |= self.overflow_flag;
        }
        for &(flag, cctl) in self.compare_masks {
            if pending & flag != 0 && regs.peek(cctl) & bits::CCTL_IM != 0 {
                armed |= flag;
            }
        }
        armed
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counter {
    value: u16,
    /// Input clock cycles not yet worth a count.
    residual: u32,
}

pub struct Hardware {
    config: TimerHalConfig,
    counters: [Counter; 3],
}

impl Hardware {
    pub fn new(config: TimerHalConfig) -> Self {
        Self {
            config,
            counters: [Counter::default(); 3],
        }
    }

    pub fn counter(&self, vector: Vector) -> u16 {
        let index = UNITS.iter().position(|unit| unit.vector == vector).unwrap_or(0);
        self.counters[index].value
    }

    /// Advances every running unit by one microsecond and returns the vectors
    /// that now have an armed, enabled flag.
    pub fn step(&mut self, regs: &mut RegisterFile) -> Vec<Vector> {
        let mut vectors = Vec::new();
        for (unit, counter) in UNITS.iter().zip(self.counters.iter_mut()) {
            if let Some(mode) = unit.running_mode(regs) {
                let clock = self.config.clock(unit.clock_of);
                let Some(prescale) = unit.width.prescale_from_bits(regs.peek(unit.ctl)) else {
                    continue;
                };
                counter.residual += u32::from(clock.clock_mhz);
                while counter.residual >= prescale.divisor() {
                    counter.residual -= prescale.divisor();
                    count(unit, counter, mode, regs);
                }
            }
            if regs.peek(Register::Ien1) & unit.ien1_bit != 0 && unit.armed(regs) != 0 {
                vectors.push(unit.vector);
            }
        }
        vectors
    }

    /// Runs the model in step with wall time for `duration_us`, raising
    /// vectors outside the register lock as they become pending.
    pub async fn run(
        &mut self,
        hal: &TimerHal<'_, RegisterFile>,
        log: &EventLog,
        duration_us: u64,
        step_us: u64,
    ) {
        let mut interval = time::interval(Duration::from_micros(step_us));
        let mut elapsed = 0;
        while elapsed < duration_us {
            interval.tick().await;
            for _ in 0..step_us {
                let vectors = hal.with_registers(|regs| self.step(regs));
                log.advance(1);
                for vector in vectors {
                    trace!("raising {:?}", vector);
                    vector.raise(hal);
                }
            }
            elapsed += step_us;
        }
    }
}

fn count(unit: &UnitSpec, counter: &mut Counter, mode: OperatingMode, regs: &mut RegisterFile) {
    let compare = unit.compare_value(regs);
    let top = match mode {
        OperatingMode::Modulo => compare,
        _ => unit.width.counter_max(),
    };
    if counter.value >= top {
        counter.value = 0;
        regs.raise(unit.flags, unit.overflow_flag);
    } else {
        counter.value += 1;
    }
    if counter.value == compare && regs.peek(unit.cctl0) & bits::CCTL_MODE != 0 {
        regs.raise(unit.flags, unit.compare_flag);
    }
}
