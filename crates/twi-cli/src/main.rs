//! twi - two-wire bus simulator demo.
//!
//! Spawns one thread per target, then drives a suite of transactions
//! from the main thread: register read, single and multi-octet writes,
//! an interrupted read with bus recovery, a read from a non-existent
//! address, and the clock-stretching exchanges against `T53`.
//!
//! Every participant thread enters a `node` span, so each log line is
//! prefixed with the node doing the talking. `--debug` (or `RUST_LOG`)
//! lowers the filter to the bit-level protocol steps.

use anyhow::{anyhow, ensure, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;
use twi_bus::Bus;
use twi_device::devices::CounterTarget;
use twi_device::{fmt, Controller, ReadFlags, WriteFlags};

/// First target address; the rest follow consecutively.
const BASE_ADDRESS: u8 = 0x50;

/// twi - two-wire bus simulator demo
#[derive(Parser, Debug)]
#[command(name = "twi")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging (bit-level protocol steps)
    #[arg(short, long)]
    debug: bool,

    /// Number of targets to attach, addresses 0x50 upwards
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(4..=32))]
    targets: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let bus = Arc::new(Bus::new());

    let mut targets = Vec::new();
    let mut threads = Vec::new();

    for i in 0..args.targets {
        let address = BASE_ADDRESS + i;
        let name = format!("T{}", fmt::octet(address));

        let target = Arc::new(
            CounterTarget::attach(name.clone(), address, Arc::clone(&bus))
                .with_context(|| format!("attach target {name}"))?,
        );

        let runner = Arc::clone(&target);
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let span = info_span!("node", name = %name);
                let _guard = span.enter();
                runner.run()
            })
            .context("spawn target thread")?;

        targets.push(target);
        threads.push(thread);
    }

    let span = info_span!("node", name = "C00");
    let guard = span.enter();

    let mut controller = Controller::attach("C00", bus).context("attach controller")?;
    run_transactions(&mut controller)?;

    info!("bus demo complete");
    drop(guard);

    for target in &targets {
        target.stop();
    }
    for thread in threads {
        thread
            .join()
            .map_err(|_| anyhow!("target thread panicked"))??;
    }

    Ok(())
}

fn run_transactions(controller: &mut Controller) -> Result<()> {
    register_read(controller, BASE_ADDRESS)?;
    write_value(controller, BASE_ADDRESS + 1)?;
    multi_write(controller, BASE_ADDRESS + 2)?;
    interrupted_read(controller, BASE_ADDRESS + 2)?;
    read_with_restart(controller, BASE_ADDRESS + 1)?;
    read_nonexistent(controller, 0x20)?;
    read_expecting(controller, BASE_ADDRESS + 2, 0x20)?;

    // Clock stretching.
    write_value(controller, BASE_ADDRESS + 3)?;
    read_expecting(controller, BASE_ADDRESS + 3, 0x30)?;

    Ok(())
}

fn write_octet_for(address: u8) -> u8 {
    address << 1
}

fn read_octet_for(address: u8) -> u8 {
    (address << 1) | 0x01
}

fn register_read(controller: &mut Controller, address: u8) -> Result<()> {
    const REGISTER: u8 = 0xAD;

    info!(
        "[ read address {} register {} (write address, register, restart, read) ]",
        fmt::octet(address),
        fmt::octet(REGISTER)
    );

    let nack = controller.write(write_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "address {} not acknowledged", fmt::octet(address));

    let nack = controller.write(REGISTER, WriteFlags::empty())?;
    ensure!(!nack, "register {} not acknowledged", fmt::octet(REGISTER));

    let nack = controller.write(read_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "read address {} not acknowledged", fmt::octet(address));

    for expected in 0x00..0x03 {
        let octet = controller.read(ReadFlags::empty())?;
        ensure!(octet == expected, "expected {}", fmt::octet(expected));
    }
    let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP)?;
    ensure!(octet == 0x03, "expected 03");

    Ok(())
}

fn write_value(controller: &mut Controller, address: u8) -> Result<()> {
    info!("[ write value to address {} ]", fmt::octet(address));

    let nack = controller.write(write_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "address {} not acknowledged", fmt::octet(address));

    let nack = controller.write(0x42, WriteFlags::STOP)?;
    ensure!(!nack, "value not acknowledged");

    Ok(())
}

fn multi_write(controller: &mut Controller, address: u8) -> Result<()> {
    info!("[ write multiple values to address {} ]", fmt::octet(address));

    let nack = controller.write(write_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "address {} not acknowledged", fmt::octet(address));

    for value in [0x01, 0x02] {
        let nack = controller.write(value, WriteFlags::empty())?;
        ensure!(!nack, "value {} not acknowledged", fmt::octet(value));
    }
    let nack = controller.write(0x03, WriteFlags::STOP)?;
    ensure!(!nack, "value 03 not acknowledged");

    Ok(())
}

fn interrupted_read(controller: &mut Controller, address: u8) -> Result<()> {
    info!("[ read address {} (read, recover) ]", fmt::octet(address));

    let nack = controller.write(read_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "address {} not acknowledged", fmt::octet(address));

    // The octet is ACK'd and not stopped: the target starts clocking
    // out the next one.
    let octet = controller.read(ReadFlags::empty())?;
    ensure!(octet == 0x20, "expected 20, read {}", fmt::octet(octet));

    // Recover from the interrupted transaction.
    controller.recover()?;

    Ok(())
}

fn read_with_restart(controller: &mut Controller, address: u8) -> Result<()> {
    info!(
        "[ read address {} (read, nack, restart, read, nack, stop) ]",
        fmt::octet(address)
    );

    let nack = controller.write(read_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "address {} not acknowledged", fmt::octet(address));

    let first = controller.read(ReadFlags::NACK)?;

    let nack = controller.write(read_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "restart address not acknowledged");

    let second = controller.read(ReadFlags::NACK | ReadFlags::STOP)?;
    ensure!(
        first == second,
        "restart re-seeds the counter: {} vs {}",
        fmt::octet(first),
        fmt::octet(second)
    );

    Ok(())
}

fn read_nonexistent(controller: &mut Controller, address: u8) -> Result<()> {
    info!(
        "[ read non-existent address {} (read, nack, stop) ]",
        fmt::octet(address)
    );

    let nack = controller.write(read_octet_for(address), WriteFlags::START)?;
    ensure!(nack, "unexpected acknowledgement");

    let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP)?;
    ensure!(octet == 0xFF, "expected FF, read {}", fmt::octet(octet));

    Ok(())
}

fn read_expecting(controller: &mut Controller, address: u8, expected: u8) -> Result<()> {
    info!("[ read address {} (read, nack, stop) ]", fmt::octet(address));

    let nack = controller.write(read_octet_for(address), WriteFlags::START)?;
    ensure!(!nack, "address {} not acknowledged", fmt::octet(address));

    let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP)?;
    ensure!(
        octet == expected,
        "expected {}, read {}",
        fmt::octet(expected),
        fmt::octet(octet)
    );

    Ok(())
}
