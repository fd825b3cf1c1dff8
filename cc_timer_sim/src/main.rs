mod hardware;
mod report;

use std::path::{Path, PathBuf};
use std::time::Duration;

use cc_timer_common::{
    Channel, ChannelMode, LogicalTimer, OperatingMode, RegisterFile, TimerHal, TimerHalConfig,
};
use clap::{Parser, ValueEnum};
use log::{debug, error, info};
use tokio::time;

use crate::hardware::{Hardware, Vector};
use crate::report::{EventLog, Report};

const MAX_DURATION_MS: u64 = 60 * 60 * 1000;

#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error("cannot read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timer error: {0}")]
    Timer(#[from] cc_timer_common::Error),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    FreeRunning,
    Modulo,
    Stopped,
}

impl From<ModeArg> for OperatingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FreeRunning => OperatingMode::FreeRunning,
            ModeArg::Modulo => OperatingMode::Modulo,
            ModeArg::Stopped => OperatingMode::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelArg {
    Single,
    A,
    B,
    C,
}

impl From<ChannelArg> for Channel {
    fn from(channel: ChannelArg) -> Self {
        match channel {
            ChannelArg::Single => Channel::Single,
            ChannelArg::A => Channel::A,
            ChannelArg::B => Channel::B,
            ChannelArg::C => Channel::C,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventArg {
    Compare,
    Overflow,
    Capture,
}

impl From<EventArg> for ChannelMode {
    fn from(event: EventArg) -> Self {
        match event {
            EventArg::Compare => ChannelMode::OutputCompare,
            EventArg::Overflow => ChannelMode::Overflow,
            EventArg::Capture => ChannelMode::InputCapture,
        }
    }
}

/// Runs one logical timer against simulated timer hardware and prints the
/// dispatched events as JSON.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Logical timer id: 0, 2 or 3.
    #[arg(short, long, default_value_t = 0)]
    timer: u8,

    #[arg(short, long, value_enum, default_value_t = ModeArg::Modulo)]
    mode: ModeArg,

    #[arg(long, value_enum, default_value_t = ChannelArg::Single)]
    channel: ChannelArg,

    #[arg(short, long, value_enum, default_value_t = EventArg::Overflow)]
    event: EventArg,

    /// Period in microseconds.
    #[arg(short, long, default_value_t = 1000)]
    period: u32,

    /// Dispatch from the interrupt vector instead of the polled tick.
    #[arg(short, long)]
    interrupts: bool,

    /// Simulated run time in milliseconds, at most one hour.
    #[arg(short, long, default_value_t = 20)]
    #[arg(value_parser = clap::value_parser!(u64).range(1..=MAX_DURATION_MS))]
    duration: u64,

    /// Hardware model granularity in microseconds.
    #[arg(long, default_value_t = 100)]
    #[arg(value_parser = clap::value_parser!(u64).range(1..=1_000_000))]
    step_us: u64,

    /// Main-loop tick interval in microseconds.
    #[arg(long, default_value_t = 500)]
    #[arg(value_parser = clap::value_parser!(u64).range(1..=1_000_000))]
    poll_us: u64,

    /// JSON file with per-timer clock settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    pretty_env_logger::init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<TimerHalConfig, SimError> {
    let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

async fn run(args: Args) -> Result<(), SimError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TimerHalConfig::default(),
    };
    debug!("clock configuration: {:?}", config);

    let timer = LogicalTimer::try_from(args.timer)?;
    let log = EventLog::default();
    let callback = |timer: LogicalTimer, channel: Channel, mode: ChannelMode| {
        log.record(timer, channel, mode)
    };

    let hal = TimerHal::new(RegisterFile::new());
    hal.init(&config)?;
    hal.configure(
        timer,
        args.mode.into(),
        args.channel.into(),
        args.event.into(),
        args.interrupts,
        Some(&callback),
    )?;
    hal.start(timer, args.period)?;
    info!("{:?} running on {:?}", timer, timer.width());

    let duration_us = args.duration * 1000;
    let mut hardware = Hardware::new(config);
    tokio::join!(
        hardware.run(&hal, &log, duration_us, args.step_us),
        poll(&hal, duration_us, args.poll_us),
    );
    hal.stop(timer)?;
    debug!(
        "final counters: T1 {} T3 {} T4 {}",
        hardware.counter(Vector::Timer1),
        hardware.counter(Vector::Timer3),
        hardware.counter(Vector::Timer4)
    );

    let report = Report::new(hal.snapshot(timer)?, timer, args.period, log.now_us(), log.take());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// The main loop's side: calls `tick` at a fixed interval.
async fn poll(hal: &TimerHal<'_, RegisterFile>, duration_us: u64, poll_us: u64) {
    let mut interval = time::interval(Duration::from_micros(poll_us));
    let mut elapsed = 0;
    while elapsed < duration_us {
        interval.tick().await;
        hal.tick();
        elapsed += poll_us;
    }
}
