use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicUsize, Ordering};

use crate::config::{BusConfig, DeviceAddress, DeviceConfig};
use crate::device::I2cDevice;
use crate::engine::I2cEngine;
use crate::error::{AllocationFailure, Error, Violation};

/// Master-side controller for one physical I2C bus.
///
/// Owns the engine's bus token from [`create`](Self::create) until
/// [`delete`](Self::delete) (or drop), and hands out [`I2cDevice`] sessions
/// that borrow it. Because devices borrow the bus, the bus cannot be deleted
/// or dropped while a device handle is alive.
///
/// `M` guards the table of attached addresses. Use `NoopRawMutex` when the
/// bus stays on one thread and `CriticalSectionRawMutex` when devices are
/// driven from several. The lock is never held across an engine call.
pub struct I2cMasterBus<M: RawMutex, E: I2cEngine> {
    engine: E,
    config: BusConfig,
    bus: E::Bus,
    attached: Mutex<M, RefCell<Vec<DeviceAddress>>>,
    devices: AtomicUsize,
    deleted: bool,
}

impl<M: RawMutex, E: I2cEngine> I2cMasterBus<M, E> {
    /// Open a bus on `engine`.
    ///
    /// Either the bus is fully set up or nothing was allocated.
    pub fn create(engine: E, config: BusConfig) -> Result<Self, Error> {
        config.validate()?;
        let bus = engine.open_bus(&config).map_err(Error::allocation)?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "i2c{}: bus open (sda={}, scl={})",
            config.port,
            config.sda,
            config.scl
        );

        Ok(Self {
            engine,
            config,
            bus,
            attached: Mutex::new(RefCell::new(Vec::new())),
            devices: AtomicUsize::new(0),
            deleted: false,
        })
    }

    /// Attach a device session for `config.address`.
    ///
    /// Nothing is sent on the wire. Fails without allocating when the
    /// address or speed is out of range, when the address is already
    /// attached on this bus, or when the engine refuses the session.
    pub fn add_device(
        &self,
        config: DeviceConfig,
    ) -> Result<I2cDevice<'_, M, E>, Error> {
        config.validate(self.engine.max_scl_speed_hz())?;

        // Reserve the address under the lock. The engine is called with the
        // lock released.
        self.attached.lock(|attached| {
            let mut attached = attached.borrow_mut();
            if attached.contains(&config.address) {
                return Err(Error::ResourceAllocation(
                    AllocationFailure::DuplicateAddress(config.address),
                ));
            }
            attached.push(config.address);
            Ok(())
        })?;

        let device = match self.engine.attach_device(self.bus, &config) {
            Ok(device) => device,
            Err(status) => {
                self.forget(config.address);
                return Err(Error::allocation(status));
            }
        };
        self.devices.fetch_add(1, Ordering::AcqRel);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "i2c{}: attached {:#x} at {} Hz",
            self.config.port,
            config.address.address,
            config.scl_speed_hz
        );

        Ok(I2cDevice::new(self, device, config))
    }

    /// Release the bus.
    ///
    /// Refuses while device sessions are still attached. On failure the bus
    /// is handed back together with the error so it is not lost.
    pub fn delete(mut self) -> Result<(), (Error, Self)> {
        let n = self.device_count();
        if n > 0 {
            return Err((Violation::DevicesAttached(n).into(), self));
        }

        match self.engine.close_bus(self.bus) {
            Ok(()) => {
                self.deleted = true;

                #[cfg(feature = "defmt")]
                defmt::debug!("i2c{}: bus closed", self.config.port);

                Ok(())
            }
            Err(status) => Err((status.into(), self)),
        }
    }

    /// Detach a session and forget its address. Called by [`I2cDevice`].
    ///
    /// On engine failure the address stays registered and the session
    /// still counts as attached.
    pub(crate) fn detach(
        &self,
        device: E::Device,
        address: DeviceAddress,
    ) -> Result<(), Error> {
        self.engine.detach_device(device)?;
        self.forget(address);
        self.devices.fetch_sub(1, Ordering::AcqRel);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "i2c{}: detached {:#x}",
            self.config.port,
            address.address
        );

        Ok(())
    }

    fn forget(&self, address: DeviceAddress) {
        self.attached
            .lock(|attached| attached.borrow_mut().retain(|a| *a != address));
    }

    pub fn port(&self) -> u8 {
        self.config.port
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Returns the number of attached device sessions.
    pub fn device_count(&self) -> usize {
        self.devices.load(Ordering::Acquire)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<M: RawMutex, E: I2cEngine> Drop for I2cMasterBus<M, E> {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }

        // Sessions can only outlive the borrow through a leaked handle. The
        // engine must not close a bus under them, so leak the bus as well.
        let n = self.device_count();
        if n > 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "i2c{}: dropped with {} devices attached, leaking bus",
                self.config.port,
                n
            );
            return;
        }

        if let Err(_status) = self.engine.close_bus(self.bus) {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "i2c{}: close on drop failed: {}",
                self.config.port,
                _status
            );
        }
    }
}

impl<M: RawMutex, E: I2cEngine> core::fmt::Debug for I2cMasterBus<M, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("I2cMasterBus")
            .field("port", &self.config.port)
            .field("bus", &self.bus)
            .field("devices", &self.device_count())
            .finish()
    }
}
