use crate::config::{BusConfig, DeviceConfig, Timeout, FAST_MODE_PLUS_HZ};

/// Status codes reported by the low-level engine. Success is `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Generic failure, including NACK and arbitration loss.
    Fail,
    InvalidArg,
    NoMem,
    Timeout,
    NotFound,
    InvalidState,
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Status::Fail => "fail",
            Status::InvalidArg => "invalid argument",
            Status::NoMem => "no memory",
            Status::Timeout => "timeout",
            Status::NotFound => "not found",
            Status::InvalidState => "invalid state",
        };
        f.write_str(name)
    }
}

/// Abstracts the driver that actually moves bits on the wire.
///
/// Implementors own pin muxing, clocking and interrupt handling. Buses and
/// devices are referred to through opaque tokens handed out by
/// [`open_bus`](Self::open_bus) and [`attach_device`](Self::attach_device).
///
/// All methods take `&self`: the engine serializes access to each physical
/// bus on its own, so devices on one bus may be driven from several threads.
pub trait I2cEngine {
    /// Token identifying an open bus.
    type Bus: Copy + core::fmt::Debug;
    /// Token identifying an attached device session.
    type Device: Copy + core::fmt::Debug;

    /// Claim the port and pins described by `config`.
    fn open_bus(&self, config: &BusConfig) -> Result<Self::Bus, Status>;

    /// Release a bus. Every device must have been detached first.
    fn close_bus(&self, bus: Self::Bus) -> Result<(), Status>;

    /// Allocate a device session on `bus`. Does not touch the wire.
    fn attach_device(
        &self,
        bus: Self::Bus,
        config: &DeviceConfig,
    ) -> Result<Self::Device, Status>;

    fn detach_device(&self, device: Self::Device) -> Result<(), Status>;

    /// START - ADDR(W) - DATA - STOP
    fn write(
        &self,
        device: Self::Device,
        data: &[u8],
        timeout: Timeout,
    ) -> Result<(), Status>;

    /// START - ADDR(R) - DATA - STOP
    fn read(
        &self,
        device: Self::Device,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status>;

    /// START - ADDR(W) - DATA - REPEATED START - ADDR(R) - DATA - STOP
    ///
    /// The bus is not released between the two phases.
    fn write_read(
        &self,
        device: Self::Device,
        write: &[u8],
        read: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status>;

    /// Highest SCL frequency the engine can generate.
    fn max_scl_speed_hz(&self) -> u32 {
        FAST_MODE_PLUS_HZ
    }
}

impl<E: I2cEngine + ?Sized> I2cEngine for &E {
    type Bus = E::Bus;
    type Device = E::Device;

    fn open_bus(&self, config: &BusConfig) -> Result<Self::Bus, Status> {
        (**self).open_bus(config)
    }

    fn close_bus(&self, bus: Self::Bus) -> Result<(), Status> {
        (**self).close_bus(bus)
    }

    fn attach_device(
        &self,
        bus: Self::Bus,
        config: &DeviceConfig,
    ) -> Result<Self::Device, Status> {
        (**self).attach_device(bus, config)
    }

    fn detach_device(&self, device: Self::Device) -> Result<(), Status> {
        (**self).detach_device(device)
    }

    fn write(
        &self,
        device: Self::Device,
        data: &[u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        (**self).write(device, data, timeout)
    }

    fn read(
        &self,
        device: Self::Device,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        (**self).read(device, buf, timeout)
    }

    fn write_read(
        &self,
        device: Self::Device,
        write: &[u8],
        read: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        (**self).write_read(device, write, read, timeout)
    }

    fn max_scl_speed_hz(&self) -> u32 {
        (**self).max_scl_speed_hz()
    }
}
