//! Register-level access to the three timer units.
//!
//! The layer never touches memory directly: it goes through [`Registers`],
//! implemented by [`MmioRegisters`] on the target and by [`RegisterFile`] on
//! the host.

use core::ptr::{read_volatile, write_volatile};

/// Every special function register the timer layer reads or writes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Timer 1 control: prescale, mode and (on this layout) the flag bits.
    T1Ctl,
    T1Cctl0,
    T1Cctl1,
    T1Cctl2,
    T1Cc0L,
    T1Cc0H,
    T3Ctl,
    T3Cctl0,
    T3Cctl1,
    T3Cc0,
    T4Ctl,
    T4Cctl0,
    T4Cctl1,
    T4Cc0,
    /// Shared flag register for Timers 3 and 4, plus Timer 1 overflow mask.
    Timif,
    /// Module interrupt enables.
    Ien1,
}

impl Register {
    pub const COUNT: usize = 16;

    pub const ALL: [Register; Register::COUNT] = [
        Register::T1Ctl,
        Register::T1Cctl0,
        Register::T1Cctl1,
        Register::T1Cctl2,
        Register::T1Cc0L,
        Register::T1Cc0H,
        Register::T3Ctl,
        Register::T3Cctl0,
        Register::T3Cctl1,
        Register::T3Cc0,
        Register::T4Ctl,
        Register::T4Cctl0,
        Register::T4Cctl1,
        Register::T4Cc0,
        Register::Timif,
        Register::Ien1,
    ];

    /// Address in SFR space.
    pub const fn sfr_address(self) -> u8 {
        match self {
            Register::T1Ctl => 0xe4,
            Register::T1Cctl0 => 0xe5,
            Register::T1Cctl1 => 0xe6,
            Register::T1Cctl2 => 0xe7,
            Register::T1Cc0L => 0xda,
            Register::T1Cc0H => 0xdb,
            Register::T3Ctl => 0xcb,
            Register::T3Cctl0 => 0xcc,
            Register::T3Cc0 => 0xcd,
            Register::T3Cctl1 => 0xce,
            Register::T4Ctl => 0xeb,
            Register::T4Cctl0 => 0xec,
            Register::T4Cc0 => 0xed,
            Register::T4Cctl1 => 0xee,
            Register::Timif => 0xd8,
            Register::Ien1 => 0xb8,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Interrupt flag bits of this register. They are write-0-to-clear:
    /// writing 1 leaves a flag as it is.
    pub const fn flag_bits(self) -> u8 {
        match self {
            Register::T1Ctl => {
                bits::T1CTL_CH2IF | bits::T1CTL_CH1IF | bits::T1CTL_CH0IF | bits::T1CTL_OVFIF
            }
            Register::Timif => {
                bits::TIMIF_T4CH1IF
                    | bits::TIMIF_T4CH0IF
                    | bits::TIMIF_T4OVFIF
                    | bits::TIMIF_T3CH1IF
                    | bits::TIMIF_T3CH0IF
                    | bits::TIMIF_T3OVFIF
            }
            _ => 0,
        }
    }
}

/// Bit assignments shared by the timer units.
pub mod bits {
    /// `IEN1`: Timer 1 module interrupt enable.
    pub const IEN1_T1IE: u8 = 0x02;
    pub const IEN1_T3IE: u8 = 0x08;
    pub const IEN1_T4IE: u8 = 0x10;

    /// `T1CTL` flag bits.
    pub const T1CTL_CH2IF: u8 = 0x80;
    pub const T1CTL_CH1IF: u8 = 0x40;
    pub const T1CTL_CH0IF: u8 = 0x20;
    pub const T1CTL_OVFIF: u8 = 0x10;

    /// `TIMIF`: Timer 1 overflow interrupt mask, then the Timer 3/4 flags.
    pub const TIMIF_T1OVFIM: u8 = 0x40;
    pub const TIMIF_T4CH1IF: u8 = 0x20;
    pub const TIMIF_T4CH0IF: u8 = 0x10;
    pub const TIMIF_T4OVFIF: u8 = 0x08;
    pub const TIMIF_T3CH1IF: u8 = 0x04;
    pub const TIMIF_T3CH0IF: u8 = 0x02;
    pub const TIMIF_T3OVFIF: u8 = 0x01;

    /// `T3CTL`/`T4CTL`: overflow interrupt mask and the separate start bit.
    /// The mask sits below the prescale field (bits 7:5), never inside it.
    pub const T34CTL_OVFIM: u8 = 0x08;
    pub const T34CTL_START: u8 = 0x10;

    /// `TxCCTLn` fields.
    pub const CCTL_IM: u8 = 0x40;
    pub const CCTL_CMP_BITS: u8 = 0x38;
    pub const CCTL_MODE: u8 = 0x04;
    /// Set output on compare, clear at 0.
    pub const CCTL_CMP_OC: u8 = 0x18;
}

/// Byte-wide register access to the timer units.
pub trait Registers {
    fn read(&self, reg: Register) -> u8;

    fn write(&mut self, reg: Register, value: u8);

    /// Read-modify-write of control bits: clears `clear`, then sets `set`.
    /// Other control bits keep their current value. Flag bits are written as
    /// 1, so a flag raised between the read and the write survives.
    fn modify(&mut self, reg: Register, clear: u8, set: u8) {
        let value = self.read(reg);
        self.write(reg, (value & !clear) | set | reg.flag_bits());
    }

    /// Clears the flags in `flags` and no other. Control bits keep the value
    /// just read.
    fn clear_flags(&mut self, reg: Register, flags: u8) {
        let value = self.read(reg);
        self.write(reg, (value | reg.flag_bits()) & !flags);
    }

    fn set_bits(&mut self, reg: Register, mask: u8) {
        self.modify(reg, 0, mask);
    }

    fn clear_bits(&mut self, reg: Register, mask: u8) {
        self.modify(reg, mask, 0);
    }
}

/// Volatile access through the XDATA mirror of the SFR space.
#[derive(Debug)]
pub struct MmioRegisters {
    base: usize,
}

impl MmioRegisters {
    /// Start of the XDATA window that mirrors SFR addresses `0x80..=0xff`.
    pub const XDATA_SFR_BASE: usize = 0x7000;

    /// # Safety
    /// Must be the only handle performing timer register accesses, and the
    /// program must run on a part that maps its SFRs at [`Self::XDATA_SFR_BASE`].
    pub const unsafe fn new() -> Self {
        Self { base: Self::XDATA_SFR_BASE }
    }

    /// # Safety
    /// As for [`MmioRegisters::new`], with the SFR mirror starting at `base`.
    pub const unsafe fn with_base(base: usize) -> Self {
        Self { base }
    }

    fn ptr(&self, reg: Register) -> *mut u8 {
        (self.base + usize::from(reg.sfr_address())) as *mut u8
    }
}

impl Registers for MmioRegisters {
    fn read(&self, reg: Register) -> u8 {
        // SAFETY: the constructor's contract guarantees the mapping.
        unsafe { read_volatile(self.ptr(reg)) }
    }

    fn write(&mut self, reg: Register, value: u8) {
        // SAFETY: see `read`.
        unsafe { write_volatile(self.ptr(reg), value) }
    }
}

/// In-memory register device.
///
/// Counts writes per register, so tests can assert that an operation left the
/// hardware alone. Flag bits behave as on the part: a write can clear them but
/// never set them; use [`RegisterFile::raise`] for that.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    values: [u8; Register::COUNT],
    writes: [u32; Register::COUNT],
}

impl RegisterFile {
    pub const fn new() -> Self {
        Self {
            values: [0; Register::COUNT],
            writes: [0; Register::COUNT],
        }
    }

    /// Current value, without counting as an access.
    pub fn peek(&self, reg: Register) -> u8 {
        self.values[reg.index()]
    }

    /// Sets a value as the hardware would (e.g. raising a flag), without
    /// counting it as a write.
    pub fn poke(&mut self, reg: Register, value: u8) {
        self.values[reg.index()] = value;
    }

    pub fn raise(&mut self, reg: Register, mask: u8) {
        self.values[reg.index()] |= mask;
    }

    pub fn write_count(&self, reg: Register) -> u32 {
        self.writes[reg.index()]
    }

    pub fn total_writes(&self) -> u32 {
        self.writes.iter().sum()
    }

    pub fn reset_write_counts(&mut self) {
        self.writes = [0; Register::COUNT];
    }
}

impl Registers for RegisterFile {
    fn read(&self, reg: Register) -> u8 {
        self.values[reg.index()]
    }

    fn write(&mut self, reg: Register, value: u8) {
        let flags = reg.flag_bits();
        let slot = &mut self.values[reg.index()];
        *slot = (value & !flags) | (*slot & value & flags);
        self.writes[reg.index()] += 1;
    }
}
