//! End-to-end bus transactions: one controller, four counter targets.
//!
//! The expected payloads follow from the counter device's seeding rule:
//! target `0xNN` serves `NN << 4` (truncated) first, incrementing from
//! there. `T53` (address byte `0xA6`) is the clock-stretching target.

mod common;

use common::{read_address, write_address, BusFixture};
use twi_device::{ReadFlags, WriteFlags};

// ─── Reads ─────────────────────────────────────────────────────────

#[test]
fn register_read() {
    let (_fixture, mut controller) = BusFixture::start();

    const REGISTER: u8 = 0xAD;

    // Write the register index, then restart into a read.
    let nack = controller
        .write(write_address(0x50), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    let nack = controller.write(REGISTER, WriteFlags::empty()).unwrap();
    assert!(!nack);

    let nack = controller
        .write(read_address(0x50), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    assert_eq!(controller.read(ReadFlags::empty()).unwrap(), 0x00);
    assert_eq!(controller.read(ReadFlags::empty()).unwrap(), 0x01);
    assert_eq!(controller.read(ReadFlags::empty()).unwrap(), 0x02);
    assert_eq!(
        controller.read(ReadFlags::NACK | ReadFlags::STOP).unwrap(),
        0x03
    );
}

#[test]
fn plain_read() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(read_address(0x52), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    assert_eq!(
        controller.read(ReadFlags::NACK | ReadFlags::STOP).unwrap(),
        0x20
    );
}

#[test]
fn read_with_restart() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(read_address(0x51), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    let octet = controller.read(ReadFlags::NACK).unwrap();
    assert_eq!(octet, 0x10);

    // Restart re-seeds the counter.
    let nack = controller
        .write(read_address(0x51), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP).unwrap();
    assert_eq!(octet, 0x10);
}

#[test]
fn read_nonexistent_target() {
    let (_fixture, mut controller) = BusFixture::start();

    // Address 0x20: nobody answers, the address write floats unacked.
    let nack = controller
        .write(read_address(0x20), WriteFlags::START)
        .unwrap();
    assert!(nack);

    let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP).unwrap();
    assert_eq!(octet, 0xFF);
}

// ─── Writes ────────────────────────────────────────────────────────

#[test]
fn simple_write() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(write_address(0x51), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    let nack = controller.write(0x42, WriteFlags::STOP).unwrap();
    assert!(!nack);
}

#[test]
fn multi_byte_write() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(write_address(0x52), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    let nack = controller.write(0x01, WriteFlags::empty()).unwrap();
    assert!(!nack);
    let nack = controller.write(0x02, WriteFlags::empty()).unwrap();
    assert!(!nack);
    let nack = controller.write(0x03, WriteFlags::STOP).unwrap();
    assert!(!nack);
}

// ─── Recovery ──────────────────────────────────────────────────────

#[test]
fn interrupted_read_recovers() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(read_address(0x52), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    // ACK without stop: the target starts clocking out its next octet.
    let octet = controller.read(ReadFlags::empty()).unwrap();
    assert_eq!(octet, 0x20);

    // Pulse SCL until SDA is released, then stop.
    controller.recover().unwrap();
}

// ─── Clock stretching ──────────────────────────────────────────────

#[test]
fn clock_stretching_write() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(write_address(0x53), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    let nack = controller.write(0x42, WriteFlags::STOP).unwrap();
    assert!(!nack);
}

#[test]
fn clock_stretching_read() {
    let (_fixture, mut controller) = BusFixture::start();

    let nack = controller
        .write(read_address(0x53), WriteFlags::START)
        .unwrap();
    assert!(!nack);

    assert_eq!(
        controller.read(ReadFlags::NACK | ReadFlags::STOP).unwrap(),
        0x30
    );
}
