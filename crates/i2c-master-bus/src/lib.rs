#![no_std]
//! Master-side session and transaction manager for an I2C bus.
//!
//! An [`I2cMasterBus`] owns one physical bus opened through an
//! [`I2cEngine`], the low-level driver that actually clocks the pins. Devices
//! are attached with [`I2cMasterBus::add_device`] and talked to through the
//! returned [`I2cDevice`] using three blocking transaction shapes: write,
//! read, and write-then-read in a single envelope.
//!
//! ```text
//! create ──► add_device ──► transmit / receive / transmit_receive
//!                                   ──► remove ──► delete
//! ```
//!
//! Constructors either fully succeed or allocate nothing. Failures are never
//! retried. Device handles borrow their bus, so a bus cannot be deleted while
//! one of its devices is still in scope.

extern crate alloc;

mod bus;
pub mod config;
mod device;
mod engine;
mod error;

pub use bus::I2cMasterBus;
pub use config::{
    AddressMode, BusConfig, ClockSource, DeviceAddress, DeviceConfig, Timeout,
};
pub use device::I2cDevice;
pub use engine::{I2cEngine, Status};
pub use error::{AllocationFailure, Error, InvalidArgument, Violation};
