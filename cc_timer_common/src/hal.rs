//! Configuration and control of the logical timers.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{ClockConfig, TimerHalConfig};
use crate::fmt::{log_debug, log_warn};
use crate::ids::{HwTimer, LogicalTimer};
use crate::modes::{Channel, ChannelMode, OperatingMode};
use crate::registers::{bits, Register, Registers};
use crate::unit::ChannelWiring;
use crate::Error;

/// Handler invoked for every dispatched timer event, with the caller's timer
/// id, the sub-channel whose flag fired, and the configured channel mode.
///
/// Runs synchronously in whichever context observed the event: an interrupt
/// vector or the main loop calling [`TimerHal::tick`]. It must be short and
/// must not block. It is never invoked twice for the same flag instance, and
/// it runs outside the layer's critical section, so it may call back into the
/// layer (for instance to stop its own timer).
pub type Callback<'a> = &'a (dyn Fn(LogicalTimer, Channel, ChannelMode) + Sync);

#[derive(Clone, Copy)]
pub(crate) struct TimerRecord<'a> {
    pub configured: bool,
    pub interrupt_enabled: bool,
    pub operating_mode: OperatingMode,
    pub channel: Channel,
    pub channel_mode: ChannelMode,
    pub clock: ClockConfig,
    pub callback: Option<Callback<'a>>,
}

impl<'a> TimerRecord<'a> {
    const fn unconfigured(clock: ClockConfig) -> Self {
        Self {
            configured: false,
            interrupt_enabled: false,
            operating_mode: OperatingMode::FreeRunning,
            channel: Channel::Single,
            channel_mode: ChannelMode::OutputCompare,
            clock,
            callback: None,
        }
    }
}

/// Read-only view of one timer's configuration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStatus {
    pub configured: bool,
    pub interrupt_enabled: bool,
    pub operating_mode: OperatingMode,
    pub channel: Channel,
    pub channel_mode: ChannelMode,
    pub clock: ClockConfig,
    pub has_callback: bool,
}

pub(crate) struct State<'a, R> {
    pub regs: R,
    pub records: [TimerRecord<'a>; 3],
}

/// The timer virtualization layer: three logical timers multiplexed onto the
/// 16-bit Timer 1 and the 8-bit Timers 3 and 4.
///
/// All state sits behind a critical-section mutex, so one instance can be
/// shared between the main loop and the interrupt vectors:
///
/// ```ignore
/// static TIMERS: TimerHal<'static, MmioRegisters> =
///     TimerHal::new(unsafe { MmioRegisters::new() });
///
/// fn boot() {
///     TIMERS.init(&TimerHalConfig::default()).ok();
/// }
///
/// #[interrupt]
/// fn T1() {
///     TIMERS.timer1_vector();
/// }
/// ```
pub struct TimerHal<'a, R> {
    pub(crate) state: Mutex<RefCell<State<'a, R>>>,
}

impl<'a, R: Registers> TimerHal<'a, R> {
    pub const fn new(regs: R) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                regs,
                records: [TimerRecord::unconfigured(ClockConfig::DEFAULT); 3],
            })),
        }
    }

    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut State<'a, R>) -> T) -> T {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Boot-time setup. Clears every compare-control register (which also
    /// masks the channel interrupts), loads each timer's clock and prescale
    /// from `config` and leaves every timer unconfigured.
    ///
    /// Meant to run once, before anything else; calling it again resets all
    /// configuration but is not otherwise guarded.
    pub fn init(&self, config: &TimerHalConfig) -> Result<(), Error> {
        config.validate()?;
        self.with_state(|state| {
            for hw in HwTimer::ALL {
                for &cctl in hw.unit().wiring().all_cctl {
                    state.regs.write(cctl, 0);
                }
                state.records[hw.index()] = TimerRecord::unconfigured(config.clock(hw.logical()));
            }
        });
        log_debug!("timers initialized: {:?}", config);
        Ok(())
    }

    /// Records how `timer` should run once started. Touches no register.
    ///
    /// Fails with [`Error::ParameterError`], changing nothing, when the id is
    /// unknown, the unit has no such operating mode or sub-channel, or the
    /// channel mode is input capture.
    pub fn configure<T>(
        &self,
        timer: T,
        operating_mode: OperatingMode,
        channel: Channel,
        channel_mode: ChannelMode,
        interrupt_enable: bool,
        callback: Option<Callback<'a>>,
    ) -> Result<(), Error>
    where
        T: TryInto<LogicalTimer>,
    {
        let timer = timer.try_into().map_err(|_| Error::ParameterError)?;
        let width = timer.width();
        if !width.supports_mode(operating_mode)
            || !width.supports_channel(channel)
            || channel_mode == ChannelMode::InputCapture
        {
            log_warn!(
                "rejected configuration for {:?}: {:?} {:?} {:?}",
                timer, operating_mode, channel, channel_mode
            );
            return Err(Error::ParameterError);
        }

        let hw = HwTimer::remap(timer);
        self.with_state(|state| {
            let record = &mut state.records[hw.index()];
            record.operating_mode = operating_mode;
            record.channel = channel;
            record.channel_mode = channel_mode;
            record.interrupt_enabled = interrupt_enable;
            record.callback = callback;
            record.configured = true;
        });
        log_debug!(
            "configured {:?}: {:?} {:?} {:?} interrupts={}",
            timer, operating_mode, channel, channel_mode, interrupt_enable
        );
        Ok(())
    }

    /// [`TimerHal::configure`] for callers holding raw HAL codes. Any code
    /// outside its table is a [`Error::ParameterError`].
    pub fn configure_raw(
        &self,
        timer: u8,
        operating_mode: u8,
        channel: u8,
        channel_mode: u8,
        interrupt_enable: bool,
        callback: Option<Callback<'a>>,
    ) -> Result<(), Error> {
        let parsed = (
            OperatingMode::try_from(operating_mode),
            Channel::try_from(channel),
            ChannelMode::try_from(channel_mode),
        );
        match parsed {
            (Ok(mode), Ok(channel), Ok(channel_mode)) => {
                self.configure(timer, mode, channel, channel_mode, interrupt_enable, callback)
            }
            _ => Err(Error::ParameterError),
        }
    }

    /// Programs the hardware from the stored configuration and starts
    /// counting. `period_us` becomes the compare value through
    /// [`ClockConfig::compare_count`].
    ///
    /// An unconfigured timer fails with [`Error::NotConfigured`] before any
    /// register is written.
    pub fn start<T>(&self, timer: T, period_us: u32) -> Result<(), Error>
    where
        T: TryInto<LogicalTimer>,
        Error: From<T::Error>,
    {
        let timer = timer.try_into()?;
        let hw = HwTimer::remap(timer);
        let unit = hw.unit();

        let count = self.with_state(|state| {
            let record = state.records[hw.index()];
            if !record.configured {
                return Err(Error::NotConfigured);
            }
            let count = record.clock.compare_count(period_us);
            let regs: &mut dyn Registers = &mut state.regs;

            unit.program_count(regs, count);
            unit.program_prescale(regs, record.clock.prescale)?;
            unit.program_mode(regs, record.operating_mode)?;
            program_channel_mode(unit.wiring(), regs, record.channel_mode);
            unit.set_running(regs, true);
            apply_interrupt_enable(
                unit.wiring(),
                regs,
                record.channel_mode,
                record.interrupt_enabled,
                record.interrupt_enabled,
            );
            Ok(count)
        });

        match count {
            Ok(count) => {
                log_debug!("started {:?}: period {} us, count {}", timer, period_us, count);
                Ok(())
            }
            Err(err) => {
                log_warn!("cannot start {:?}: {:?}", timer, err);
                Err(err)
            }
        }
    }

    /// Halts counting. The 16-bit unit is switched to its stopped mode; the
    /// 8-bit units only lose their start bit, keeping mode and prescale.
    pub fn stop<T>(&self, timer: T) -> Result<(), Error>
    where
        T: TryInto<LogicalTimer>,
        Error: From<T::Error>,
    {
        let timer = timer.try_into()?;
        let unit = HwTimer::remap(timer).unit();
        self.with_state(|state| unit.set_running(&mut state.regs, false));
        log_debug!("stopped {:?}", timer);
        Ok(())
    }

    /// Arms or disarms the event source selected by `channel_mode`: the
    /// overflow interrupt mask for [`ChannelMode::Overflow`], the channel 0
    /// compare interrupt mask otherwise.
    ///
    /// The unit's bit in `IEN1` always follows the configured interrupt flag,
    /// not `enable`: the module gate opens only for timers configured for
    /// interrupt dispatch.
    pub fn set_interrupt_enable<T>(
        &self,
        timer: T,
        channel_mode: ChannelMode,
        enable: bool,
    ) -> Result<(), Error>
    where
        T: TryInto<LogicalTimer>,
        Error: From<T::Error>,
    {
        let timer = timer.try_into()?;
        let hw = HwTimer::remap(timer);
        self.with_state(|state| {
            let module_enable = state.records[hw.index()].interrupt_enabled;
            apply_interrupt_enable(
                hw.unit().wiring(),
                &mut state.regs,
                channel_mode,
                enable,
                module_enable,
            );
        });
        Ok(())
    }

    pub fn snapshot<T>(&self, timer: T) -> Result<TimerStatus, Error>
    where
        T: TryInto<LogicalTimer>,
        Error: From<T::Error>,
    {
        let hw = HwTimer::remap(timer.try_into()?);
        let record = self.with_state(|state| state.records[hw.index()]);
        Ok(TimerStatus {
            configured: record.configured,
            interrupt_enabled: record.interrupt_enabled,
            operating_mode: record.operating_mode,
            channel: record.channel,
            channel_mode: record.channel_mode,
            clock: record.clock,
            has_callback: record.callback.is_some(),
        })
    }

    /// Runs `f` on the register device inside the layer's critical section.
    ///
    /// Lets a host simulation advance the counting hardware, or diagnostics
    /// read raw registers, without racing the vectors.
    pub fn with_registers<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        self.with_state(|state| f(&mut state.regs))
    }
}

fn program_channel_mode(
    wiring: &ChannelWiring,
    regs: &mut dyn Registers,
    channel_mode: ChannelMode,
) {
    match channel_mode {
        ChannelMode::OutputCompare => {
            regs.modify(wiring.cctl, bits::CCTL_CMP_BITS, bits::CCTL_CMP_OC | bits::CCTL_MODE);
        }
        // Capture is not wired; the compare-control register is left alone.
        ChannelMode::InputCapture => {}
        // Overflow events need nothing from the compare channel.
        ChannelMode::Overflow => {}
    }
}

fn apply_interrupt_enable(
    wiring: &ChannelWiring,
    regs: &mut dyn Registers,
    channel_mode: ChannelMode,
    enable: bool,
    module_enable: bool,
) {
    let (reg, mask) = match channel_mode {
        ChannelMode::Overflow => (wiring.ovf_enable, wiring.ovf_bit),
        ChannelMode::OutputCompare | ChannelMode::InputCapture => (wiring.cctl, bits::CCTL_IM),
    };
    if enable {
        regs.set_bits(reg, mask);
    } else {
        regs.clear_bits(reg, mask);
    }

    if module_enable {
        regs.set_bits(Register::Ien1, wiring.int_bit);
    } else {
        regs.clear_bits(Register::Ien1, wiring.int_bit);
    }
}
