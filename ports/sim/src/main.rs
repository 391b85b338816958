use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hub_drv::bluetooth::{
    Bluetooth, BluetoothConfig, SimulatedBackend, SimulationContext, SimulationProcess,
};
use hub_os::{Process, Scheduler, SchedulerConfig};
use hub_sim::{Board, Echo, StdClock, StdinStream, StdoutSink};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the hub scheduler and drivers on the host")]
struct Opts {
    /// Milliseconds between scheduler ticks
    #[arg(long = "tick-ms", default_value_t = 1)]
    tick_ms: u64,

    /// Name the simulated hub advertises
    #[arg(long = "hub-name", default_value = "Pybricks Hub")]
    hub_name: String,

    /// Log filter, overridden by RUST_LOG
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// Stop after this many ticks
    #[arg(long = "max-ticks", value_name = "COUNT")]
    max_ticks: Option<u64>,
}

type Backend = SimulatedBackend<StdoutSink>;

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(opts.log_level.as_str()),
    )
    .init();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            hub_os::request_poll();
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let mut board = Board::new();
    board.init().context("board init failed")?;

    let config = BluetoothConfig::builder().hub_name(&opts.hub_name).build();
    let bluetooth: Bluetooth<Backend, StdClock> =
        Bluetooth::new(SimulatedBackend::new(StdoutSink::stdout()), StdClock::new(), config);

    let mut radio: Process<
        SimulationProcess<Backend>,
        SimulationContext<'_, Backend, StdClock, StdinStream>,
    > = Process::new(
        "bluetooth",
        SimulationContext::new(&bluetooth, StdinStream::stdin()),
    );
    let mut echo: Process<Echo, &Bluetooth<Backend, StdClock>> = Process::new("echo", &bluetooth);

    let mut scheduler: Scheduler<'_> =
        Scheduler::new(SchedulerConfig::builder().name("virtual-hub").build());
    scheduler
        .start(&mut radio)
        .context("cannot start bluetooth")?;
    scheduler.start(&mut echo).context("cannot start echo")?;

    info!("virtual hub running, tick {} ms", opts.tick_ms);

    let tick = Duration::from_millis(opts.tick_ms.max(1));
    let mut ticks = 0u64;
    scheduler.run_while(|| {
        thread::sleep(tick);
        ticks += 1;
        hub_os::request_poll();
        running.load(Ordering::SeqCst) && opts.max_ticks.map_or(true, |max| ticks <= max)
    });

    info!("stopping after {} ticks", ticks);
    board.power_off().context("power off failed")?;
    Ok(())
}
