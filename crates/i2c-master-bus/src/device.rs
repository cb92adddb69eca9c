use alloc::vec;
use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::{Operation, SevenBitAddress, TenBitAddress};

use crate::bus::I2cMasterBus;
use crate::config::{DeviceAddress, DeviceConfig, Timeout};
use crate::engine::I2cEngine;
use crate::error::{Error, InvalidArgument, Violation};

/// Session with one addressed device on an [`I2cMasterBus`].
///
/// All transactions block for at most the given [`Timeout`] and are
/// all-or-nothing: a buffer is only returned when the whole transaction
/// succeeded. Nothing is retried.
///
/// Call [`remove`](Self::remove) to release the session and observe the
/// result. A handle that is dropped while still attached is detached on drop.
pub struct I2cDevice<'a, M: RawMutex, E: I2cEngine> {
    bus: &'a I2cMasterBus<M, E>,
    device: E::Device,
    config: DeviceConfig,
    attached: bool,
    default_timeout: Timeout,
}

impl<'a, M: RawMutex, E: I2cEngine> I2cDevice<'a, M, E> {
    /// Create a new handle. Only called by `I2cMasterBus`.
    pub(crate) fn new(
        bus: &'a I2cMasterBus<M, E>,
        device: E::Device,
        config: DeviceConfig,
    ) -> Self {
        Self {
            bus,
            device,
            config,
            attached: true,
            default_timeout: Timeout::Forever,
        }
    }

    fn session(&self) -> Result<E::Device, Error> {
        if self.attached {
            Ok(self.device)
        } else {
            Err(Violation::DeviceRemoved.into())
        }
    }

    /// Write `data` to the device.
    ///
    /// An empty `data` still addresses the device, which makes it usable as
    /// a presence probe.
    pub fn transmit(
        &self,
        data: &[u8],
        timeout: impl Into<Timeout>,
    ) -> Result<(), Error> {
        let device = self.session()?;
        self.bus.engine().write(device, data, timeout.into())?;
        Ok(())
    }

    /// Read `len` bytes from the device.
    pub fn receive(
        &self,
        len: usize,
        timeout: impl Into<Timeout>,
    ) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; len];
        self.receive_into(&mut buf, timeout)?;
        Ok(buf)
    }

    /// Fill `buf` from the device.
    ///
    /// The contents of `buf` are unspecified if this returns an error.
    pub fn receive_into(
        &self,
        buf: &mut [u8],
        timeout: impl Into<Timeout>,
    ) -> Result<(), Error> {
        let device = self.session()?;
        if buf.is_empty() {
            return Ok(());
        }
        self.bus.engine().read(device, buf, timeout.into())?;
        Ok(())
    }

    /// Write `data`, then read `len` bytes, without releasing the bus in
    /// between.
    pub fn transmit_receive(
        &self,
        data: &[u8],
        len: usize,
        timeout: impl Into<Timeout>,
    ) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; len];
        self.transmit_receive_into(data, &mut buf, timeout)?;
        Ok(buf)
    }

    /// Buffer-filling form of [`transmit_receive`](Self::transmit_receive).
    ///
    /// The contents of `buf` are unspecified if this returns an error.
    pub fn transmit_receive_into(
        &self,
        data: &[u8],
        buf: &mut [u8],
        timeout: impl Into<Timeout>,
    ) -> Result<(), Error> {
        if buf.is_empty() {
            return self.transmit(data, timeout);
        }
        let device = self.session()?;
        self.bus
            .engine()
            .write_read(device, data, buf, timeout.into())?;
        Ok(())
    }

    /// Release the session.
    ///
    /// After success every further call on this handle, including another
    /// `remove`, fails with [`Violation::DeviceRemoved`]. On failure the
    /// handle stays attached and the call may be repeated.
    pub fn remove(&mut self) -> Result<(), Error> {
        let device = self.session()?;
        self.bus.detach(device, self.config.address)?;
        self.attached = false;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn address(&self) -> DeviceAddress {
        self.config.address
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Timeout used by the `embedded-hal` methods.
    pub fn default_timeout(&self) -> Timeout {
        self.default_timeout
    }

    pub fn set_default_timeout(&mut self, timeout: impl Into<Timeout>) {
        self.default_timeout = timeout.into();
    }

    fn check_address(&self, address: DeviceAddress) -> Result<(), Error> {
        if address != self.config.address {
            return Err(InvalidArgument::WrongAddress(address).into());
        }
        Ok(())
    }

    /// Runs an `embedded-hal` operation list. Only the shapes the engine
    /// can carry out as a single transaction are accepted.
    fn run(&self, operations: &mut [Operation<'_>]) -> Result<(), Error> {
        let timeout = self.default_timeout;
        match operations {
            [] => self.session().map(|_| ()),
            [Operation::Write(data)] => self.transmit(data, timeout),
            [Operation::Read(buf)] => self.receive_into(buf, timeout),
            [Operation::Write(data), Operation::Read(buf)] => {
                self.transmit_receive_into(data, buf, timeout)
            }
            _ => Err(InvalidArgument::Rejected.into()),
        }
    }
}

/// Detaches a still-attached session.
///
/// A detach that fails here cannot be retried: the session stays registered
/// on the bus, so [`I2cMasterBus::delete`] keeps reporting it and dropping
/// the bus leaks it. Call [`I2cDevice::remove`] to handle the error instead.
impl<M: RawMutex, E: I2cEngine> Drop for I2cDevice<'_, M, E> {
    fn drop(&mut self) {
        if !self.attached {
            return;
        }
        if let Err(_e) = self.bus.detach(self.device, self.config.address) {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "i2c{}: detach of {:#x} on drop failed: {}",
                self.bus.port(),
                self.config.address.address,
                _e
            );
        }
    }
}

impl<M: RawMutex, E: I2cEngine> core::fmt::Debug for I2cDevice<'_, M, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("I2cDevice")
            .field("port", &self.bus.port())
            .field("device", &self.device)
            .field("config", &self.config)
            .field("attached", &self.attached)
            .finish()
    }
}

impl<M: RawMutex, E: I2cEngine> embedded_hal::i2c::ErrorType
    for I2cDevice<'_, M, E>
{
    type Error = Error;
}

impl<M: RawMutex, E: I2cEngine> embedded_hal::i2c::I2c<SevenBitAddress>
    for I2cDevice<'_, M, E>
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.check_address(DeviceAddress::seven_bit(address))?;
        self.run(operations)
    }
}

impl<M: RawMutex, E: I2cEngine> embedded_hal::i2c::I2c<TenBitAddress>
    for I2cDevice<'_, M, E>
{
    fn transaction(
        &mut self,
        address: TenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.check_address(DeviceAddress::ten_bit(address))?;
        self.run(operations)
    }
}
