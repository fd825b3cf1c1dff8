//! Event dispatch, shared by the interrupt vectors and the polled tick.

use crate::fmt::{log_debug, log_trace};
use crate::hal::{Callback, State, TimerHal};
use crate::ids::{HwTimer, LogicalTimer};
use crate::modes::{Channel, ChannelMode};
use crate::registers::Registers;

/// A unit has at most three compare flags plus its overflow flag.
const MAX_EVENTS: usize = 4;

/// Events taken from one unit in one pass, delivered after the critical
/// section is released.
struct Fired<'a> {
    timer: LogicalTimer,
    channel_mode: ChannelMode,
    callback: Option<Callback<'a>>,
    channels: [Option<Channel>; MAX_EVENTS],
}

impl<'a> Fired<'a> {
    fn deliver(self) {
        let Some(callback) = self.callback else {
            if self.channels.iter().any(Option::is_some) {
                log_trace!("{:?} fired with no callback registered", self.timer);
            }
            return;
        };
        for channel in self.channels.into_iter().flatten() {
            callback(self.timer, channel, self.channel_mode);
        }
    }
}

/// Reads and clears every pending flag of `hw`, keeping the ones whose
/// category matches the record's channel mode.
///
/// Flags of the other category, or of an unconfigured timer, are cleared as
/// well and dropped, so a stale flag cannot re-trigger forever.
fn take_events<'a, R: Registers>(hw: HwTimer, state: &mut State<'a, R>) -> Fired<'a> {
    let wiring = hw.unit().wiring();
    let record = state.records[hw.index()];
    let mut fired = Fired {
        timer: hw.logical(),
        channel_mode: record.channel_mode,
        callback: record.callback,
        channels: [None; MAX_EVENTS],
    };

    let pending = state.regs.read(wiring.flags) & wiring.flag_mask();
    if pending == 0 {
        return fired;
    }
    // Flags raised after the read above survive this and fire next time.
    state.regs.clear_flags(wiring.flags, pending);

    let mut dropped = 0u8;
    let mut slots = fired.channels.iter_mut();
    let compare = record.configured && record.channel_mode == ChannelMode::OutputCompare;
    let overflow = record.configured && record.channel_mode == ChannelMode::Overflow;

    for &(bit, channel) in wiring.compare_flags {
        if pending & bit == 0 {
            continue;
        }
        match (compare, slots.next()) {
            (true, Some(slot)) => *slot = Some(channel),
            _ => dropped |= bit,
        }
    }
    if pending & wiring.overflow_flag != 0 {
        match (overflow, slots.next()) {
            (true, Some(slot)) => *slot = Some(Channel::Single),
            _ => dropped |= wiring.overflow_flag,
        }
    }

    if dropped != 0 {
        log_debug!(
            "dropped flags {:#x} on {:?} (configured={}, mode {:?})",
            dropped, fired.timer, record.configured, record.channel_mode
        );
    }
    fired
}

impl<'a, R: Registers> TimerHal<'a, R> {
    /// Entry point for the Timer 1 interrupt vector.
    pub fn timer1_vector(&self) {
        self.dispatch(HwTimer::Timer1, false);
    }

    /// Entry point for the Timer 3 interrupt vector.
    pub fn timer3_vector(&self) {
        self.dispatch(HwTimer::Timer3, false);
    }

    /// Entry point for the Timer 4 interrupt vector.
    pub fn timer4_vector(&self) {
        self.dispatch(HwTimer::Timer4, false);
    }

    /// Polled dispatch, for a periodic call from the main loop.
    ///
    /// Handles every timer configured without interrupts exactly as its vector
    /// would; timers in interrupt mode are skipped.
    pub fn tick(&self) {
        for hw in HwTimer::ALL {
            self.dispatch(hw, true);
        }
    }

    fn dispatch(&self, hw: HwTimer, polled: bool) {
        let fired = self.with_state(|state| {
            if polled && state.records[hw.index()].interrupt_enabled {
                None
            } else {
                Some(take_events(hw, state))
            }
        });
        if let Some(fired) = fired {
            fired.deliver();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::config::TimerHalConfig;
    use crate::modes::OperatingMode;
    use crate::registers::{bits, Register, RegisterFile};

    type Event = (LogicalTimer, Channel, ChannelMode);

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn record(&self, timer: LogicalTimer, channel: Channel, mode: ChannelMode) {
            self.events.lock().unwrap().push((timer, channel, mode));
        }

        fn callback(&self) -> impl Fn(LogicalTimer, Channel, ChannelMode) + Sync + '_ {
            move |timer, channel, mode| self.record(timer, channel, mode)
        }

        fn take(&self) -> Vec<Event> {
            core::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    fn configured<'a>(
        timer: LogicalTimer,
        channel_mode: ChannelMode,
        interrupts: bool,
        callback: Callback<'a>,
    ) -> TimerHal<'a, RegisterFile> {
        let hal = TimerHal::new(RegisterFile::new());
        hal.init(&TimerHalConfig::default()).unwrap();
        hal.configure(
            timer,
            OperatingMode::FreeRunning,
            Channel::Single,
            channel_mode,
            interrupts,
            Some(callback),
        )
        .unwrap();
        hal
    }

    #[test]
    fn wide_compare_flags_map_to_channels_a_b_c() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = configured(LogicalTimer::Timer3, ChannelMode::OutputCompare, true, &callback);

        hal.with_registers(|regs| {
            regs.raise(Register::T1Ctl, bits::T1CTL_CH0IF | bits::T1CTL_CH1IF | bits::T1CTL_CH2IF)
        });
        hal.timer1_vector();

        assert_eq!(
            recorder.take(),
            [
                (LogicalTimer::Timer3, Channel::A, ChannelMode::OutputCompare),
                (LogicalTimer::Timer3, Channel::B, ChannelMode::OutputCompare),
                (LogicalTimer::Timer3, Channel::C, ChannelMode::OutputCompare),
            ]
        );
        assert_eq!(hal.with_registers(|regs| regs.peek(Register::T1Ctl)), 0);
    }

    #[test]
    fn clearing_flags_keeps_the_control_fields() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = configured(LogicalTimer::Timer3, ChannelMode::Overflow, false, &callback);
        hal.start(LogicalTimer::Timer3, 100).unwrap();
        hal.with_registers(|regs| regs.raise(Register::T1Ctl, bits::T1CTL_OVFIF));

        hal.tick();

        assert_eq!(
            recorder.take(),
            [(LogicalTimer::Timer3, Channel::Single, ChannelMode::Overflow)]
        );
        assert_eq!(hal.with_registers(|regs| regs.peek(Register::T1Ctl)), 0x0c | 0x01);
    }

    #[test]
    fn narrow_flags_in_timif_leave_the_other_unit_alone() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = configured(LogicalTimer::Timer2, ChannelMode::OutputCompare, true, &callback);
        hal.with_registers(|regs| {
            regs.poke(
                Register::Timif,
                bits::TIMIF_T1OVFIM
                    | bits::TIMIF_T3OVFIF
                    | bits::TIMIF_T4CH0IF
                    | bits::TIMIF_T4CH1IF,
            )
        });

        hal.timer4_vector();

        assert_eq!(
            recorder.take(),
            [
                (LogicalTimer::Timer2, Channel::A, ChannelMode::OutputCompare),
                (LogicalTimer::Timer2, Channel::B, ChannelMode::OutputCompare),
            ]
        );
        assert_eq!(
            hal.with_registers(|regs| regs.peek(Register::Timif)),
            bits::TIMIF_T1OVFIM | bits::TIMIF_T3OVFIF
        );
    }

    #[test]
    fn mismatched_flags_are_cleared_without_callback() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = configured(LogicalTimer::Timer0, ChannelMode::Overflow, false, &callback);
        hal.with_registers(|regs| regs.raise(Register::Timif, bits::TIMIF_T3CH0IF));

        hal.tick();
        hal.tick();

        assert!(recorder.take().is_empty());
        assert_eq!(hal.with_registers(|regs| regs.peek(Register::Timif)), 0);
    }

    #[test]
    fn mixed_flags_dispatch_only_the_configured_category() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = configured(LogicalTimer::Timer0, ChannelMode::OutputCompare, true, &callback);
        hal.with_registers(|regs| {
            regs.raise(Register::Timif, bits::TIMIF_T3CH1IF | bits::TIMIF_T3OVFIF)
        });

        hal.timer3_vector();

        assert_eq!(
            recorder.take(),
            [(LogicalTimer::Timer0, Channel::B, ChannelMode::OutputCompare)]
        );
        assert_eq!(hal.with_registers(|regs| regs.peek(Register::Timif)), 0);
    }

    #[test]
    fn unconfigured_timers_have_their_flags_cleared_by_tick() {
        let hal = TimerHal::new(RegisterFile::new());
        hal.init(&TimerHalConfig::default()).unwrap();
        hal.with_registers(|regs| {
            regs.raise(Register::T1Ctl, bits::T1CTL_OVFIF);
            regs.raise(Register::Timif, bits::TIMIF_T4OVFIF);
        });

        hal.tick();

        hal.with_registers(|regs| {
            assert_eq!(regs.peek(Register::T1Ctl), 0);
            assert_eq!(regs.peek(Register::Timif), 0);
        });
    }

    #[test]
    fn tick_skips_timers_in_interrupt_mode() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = configured(LogicalTimer::Timer0, ChannelMode::Overflow, true, &callback);
        hal.with_registers(|regs| regs.raise(Register::Timif, bits::TIMIF_T3OVFIF));

        hal.tick();
        assert!(recorder.take().is_empty());
        assert_eq!(hal.with_registers(|regs| regs.peek(Register::Timif)), bits::TIMIF_T3OVFIF);

        hal.timer3_vector();
        assert_eq!(
            recorder.take(),
            [(LogicalTimer::Timer0, Channel::Single, ChannelMode::Overflow)]
        );
    }

    #[test]
    fn interrupt_and_polled_paths_are_identical() {
        let flags = bits::T1CTL_CH0IF | bits::T1CTL_CH2IF | bits::T1CTL_OVFIF;
        let mut outcomes = Vec::new();

        for interrupts in [true, false] {
            let recorder = Recorder::default();
            let callback = recorder.callback();
            let hal =
                configured(LogicalTimer::Timer3, ChannelMode::OutputCompare, interrupts, &callback);
            hal.with_registers(|regs| regs.raise(Register::T1Ctl, flags));
            if interrupts {
                hal.timer1_vector();
            } else {
                hal.tick();
            }
            let remaining = hal.with_registers(|regs| regs.peek(Register::T1Ctl));
            outcomes.push((recorder.take(), remaining));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].1, 0);
        assert_eq!(outcomes[0].0.len(), 2);
    }

    /// Register file that raises `late` in `TIMIF` just before the next write
    /// to it lands, the way hardware can between a read and a write.
    struct LateFlag {
        regs: RegisterFile,
        late: Option<u8>,
    }

    impl Registers for LateFlag {
        fn read(&self, reg: Register) -> u8 {
            self.regs.read(reg)
        }

        fn write(&mut self, reg: Register, value: u8) {
            if reg == Register::Timif {
                if let Some(flag) = self.late.take() {
                    self.regs.raise(reg, flag);
                }
            }
            self.regs.write(reg, value);
        }
    }

    fn late_flag_hal<'a>() -> TimerHal<'a, LateFlag> {
        let hal = TimerHal::new(LateFlag { regs: RegisterFile::new(), late: None });
        hal.init(&TimerHalConfig::default()).unwrap();
        hal
    }

    #[test]
    fn flag_raised_while_clearing_the_other_unit_is_kept() {
        let recorder = Recorder::default();
        let callback = recorder.callback();
        let hal = late_flag_hal();
        for timer in [LogicalTimer::Timer0, LogicalTimer::Timer2] {
            hal.configure(
                timer,
                OperatingMode::FreeRunning,
                Channel::Single,
                ChannelMode::Overflow,
                false,
                Some(&callback),
            )
            .unwrap();
        }
        hal.with_registers(|regs| {
            regs.regs.raise(Register::Timif, bits::TIMIF_T3OVFIF);
            regs.late = Some(bits::TIMIF_T4OVFIF);
        });

        hal.tick();
        hal.tick();

        assert_eq!(
            recorder.take(),
            [
                (LogicalTimer::Timer0, Channel::Single, ChannelMode::Overflow),
                (LogicalTimer::Timer2, Channel::Single, ChannelMode::Overflow),
            ]
        );
        assert_eq!(hal.with_registers(|regs| regs.regs.peek(Register::Timif)), 0);
    }

    #[test]
    fn toggling_the_timer1_overflow_mask_keeps_a_late_flag() {
        let hal = late_flag_hal();
        hal.configure(
            LogicalTimer::Timer3,
            OperatingMode::FreeRunning,
            Channel::Single,
            ChannelMode::Overflow,
            true,
            None,
        )
        .unwrap();
        hal.with_registers(|regs| regs.late = Some(bits::TIMIF_T3OVFIF));

        hal.set_interrupt_enable(LogicalTimer::Timer3, ChannelMode::Overflow, true).unwrap();

        assert_eq!(
            hal.with_registers(|regs| regs.regs.peek(Register::Timif)),
            bits::TIMIF_T1OVFIM | bits::TIMIF_T3OVFIF
        );
    }

    #[test]
    fn callback_may_stop_its_own_timer() {
        static HITS: AtomicU32 = AtomicU32::new(0);
        let hal: &'static TimerHal<'static, RegisterFile> =
            Box::leak(Box::new(TimerHal::new(RegisterFile::new())));
        let callback: Callback<'static> =
            Box::leak(Box::new(move |timer: LogicalTimer, _: Channel, _: ChannelMode| {
                HITS.fetch_add(1, Ordering::Relaxed);
                hal.stop(timer).unwrap();
            }));
        hal.init(&TimerHalConfig::default()).unwrap();
        hal.configure(
            LogicalTimer::Timer2,
            OperatingMode::FreeRunning,
            Channel::Single,
            ChannelMode::Overflow,
            true,
            Some(callback),
        )
        .unwrap();
        hal.start(LogicalTimer::Timer2, 100).unwrap();
        hal.with_registers(|regs| regs.raise(Register::Timif, bits::TIMIF_T4OVFIF));

        hal.timer4_vector();

        assert_eq!(HITS.load(Ordering::Relaxed), 1);
        assert_eq!(hal.with_registers(|regs| regs.peek(Register::T4Ctl)) & bits::T34CTL_START, 0);
    }
}
