//! Bus and device configuration.
//!
//! Every option the engine understands is a named field with a documented
//! default, so call sites never carry bare magic numbers.

use crate::error::InvalidArgument;

/// Standard mode (100 kHz).
pub const STANDARD_MODE_HZ: u32 = 100_000;
/// Fast mode (400 kHz).
pub const FAST_MODE_HZ: u32 = 400_000;
/// Fast mode plus (1 MHz).
pub const FAST_MODE_PLUS_HZ: u32 = 1_000_000;

/// Source clock feeding the bus timing generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Whatever the engine picks when nothing is requested.
    #[default]
    Default,
    /// Peripheral bus clock.
    Apb,
    /// Internal fast RC oscillator.
    RcFast,
    /// External crystal.
    Xtal,
}

/// Bus controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Platform bus port number.
    pub port: u8,
    /// Data line pin.
    pub sda: u8,
    /// Clock line pin.
    pub scl: u8,
    pub clock_source: ClockSource,
    /// Glitches shorter than this many source clock periods are ignored.
    pub glitch_ignore_cnt: u8,
    /// Interrupt priority, 0 lets the engine choose.
    pub intr_priority: u8,
    /// Depth of the engine's internal transaction queue, 0 lets the engine
    /// choose.
    pub trans_queue_depth: usize,
    pub enable_internal_pullup: bool,
    /// Allow the bus to be powered down in light sleep.
    pub allow_pd: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: 0,
            sda: 4,
            scl: 5,
            clock_source: ClockSource::Default,
            glitch_ignore_cnt: 7,
            intr_priority: 0,
            trans_queue_depth: 0,
            enable_internal_pullup: true,
            allow_pd: false,
        }
    }
}

impl BusConfig {
    /// Default configuration on the given pins.
    pub fn with_pins(sda: u8, scl: u8) -> Self {
        Self { sda, scl, ..Self::default() }
    }

    /// Checks the parts of the configuration that do not need the engine.
    ///
    /// Pin existence, pin ownership and clock source support are the
    /// engine's call and surface as allocation failures from `open_bus`.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if self.sda == self.scl {
            return Err(InvalidArgument::PinConflict(self.sda));
        }
        Ok(())
    }
}

/// Width of the target address on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressMode {
    #[default]
    SevenBit,
    TenBit,
}

impl AddressMode {
    /// Highest address representable in this mode.
    pub const fn max_address(self) -> u16 {
        match self {
            AddressMode::SevenBit => 0x7F,
            AddressMode::TenBit => 0x3FF,
        }
    }
}

/// Target address together with its addressing mode.
///
/// Two devices collide on a bus only when both the address and the mode
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress {
    pub address: u16,
    pub mode: AddressMode,
}

impl DeviceAddress {
    pub const fn seven_bit(address: u8) -> Self {
        Self { address: address as u16, mode: AddressMode::SevenBit }
    }

    pub const fn ten_bit(address: u16) -> Self {
        Self { address, mode: AddressMode::TenBit }
    }

    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if self.address > self.mode.max_address() {
            return Err(InvalidArgument::Address(*self));
        }
        Ok(())
    }
}

impl From<u8> for DeviceAddress {
    fn from(address: u8) -> Self {
        Self::seven_bit(address)
    }
}

/// Per-device configuration handed to the engine on attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    pub address: DeviceAddress,
    /// Clock speed used while talking to this device.
    pub scl_speed_hz: u32,
    /// Time the device may hold the clock low before it is ready, 0 for the
    /// engine default.
    pub scl_wait_us: u32,
    /// Ignore missing ACKs from this device.
    pub disable_ack_check: bool,
}

impl DeviceConfig {
    /// Standard-mode configuration with ACK checking enabled.
    pub fn new(address: impl Into<DeviceAddress>) -> Self {
        Self {
            address: address.into(),
            scl_speed_hz: STANDARD_MODE_HZ,
            scl_wait_us: 0,
            disable_ack_check: false,
        }
    }

    pub fn with_speed(mut self, scl_speed_hz: u32) -> Self {
        self.scl_speed_hz = scl_speed_hz;
        self
    }

    /// Checks address range and clock speed against what the engine can
    /// drive.
    pub fn validate(
        &self,
        max_scl_speed_hz: u32,
    ) -> Result<(), InvalidArgument> {
        self.address.validate()?;
        if self.scl_speed_hz == 0 || self.scl_speed_hz > max_scl_speed_hz {
            return Err(InvalidArgument::SclSpeed(self.scl_speed_hz));
        }
        Ok(())
    }
}

/// How long a transaction may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Block until the engine finishes.
    #[default]
    Forever,
    Millis(u32),
}

impl Timeout {
    /// The bound in milliseconds, `None` when blocking forever.
    pub const fn as_millis(self) -> Option<u32> {
        match self {
            Timeout::Forever => None,
            Timeout::Millis(ms) => Some(ms),
        }
    }
}

/// Negative values are the "block forever" sentinel.
impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        if ms < 0 {
            Timeout::Forever
        } else {
            Timeout::Millis(ms as u32)
        }
    }
}

impl From<u32> for Timeout {
    fn from(ms: u32) -> Self {
        Timeout::Millis(ms)
    }
}
