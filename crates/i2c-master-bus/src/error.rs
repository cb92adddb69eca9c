use crate::config::DeviceAddress;
use crate::engine::Status;

/// Errors surfaced by bus and device operations.
///
/// Nothing is retried or recovered internally; every failure reported by the
/// engine reaches the caller through one of these variants.
#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The bus or device session could not be created.
    ResourceAllocation(AllocationFailure),
    /// The device did not complete the transaction within the bound.
    Timeout,
    /// NACK, arbitration loss or an electrical fault on the bus.
    BusFault,
    /// Malformed address, speed, length or configuration.
    InvalidArgument(InvalidArgument),
    /// Operation issued against a handle or bus in the wrong lifecycle state.
    PreconditionViolation(Violation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocationFailure {
    /// The engine refused to allocate (pins or port busy, table full, ...).
    Engine(Status),
    /// Another session already owns this address on the bus.
    DuplicateAddress(DeviceAddress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidArgument {
    /// Address out of range for its addressing mode.
    Address(DeviceAddress),
    /// Clock speed of zero or above what the engine can drive.
    SclSpeed(u32),
    /// SDA and SCL assigned to the same pin.
    PinConflict(u8),
    /// Transaction addressed to a device other than the handle's own.
    WrongAddress(DeviceAddress),
    /// The engine rejected the arguments of a call.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Violation {
    /// The device session was already removed.
    DeviceRemoved,
    /// The bus still has `n` attached devices.
    DevicesAttached(usize),
    /// The engine reported `NotFound` or `InvalidState` for the handle.
    Engine(Status),
}

impl Error {
    /// Maps an engine status returned while creating a bus or device.
    pub(crate) fn allocation(status: Status) -> Self {
        Error::ResourceAllocation(AllocationFailure::Engine(status))
    }
}

/// Maps an engine status returned by a transaction or a release.
impl From<Status> for Error {
    fn from(status: Status) -> Self {
        match status {
            Status::Timeout => Error::Timeout,
            Status::Fail => Error::BusFault,
            Status::InvalidArg => {
                Error::InvalidArgument(InvalidArgument::Rejected)
            }
            Status::NoMem => Error::allocation(status),
            Status::NotFound | Status::InvalidState => {
                Error::PreconditionViolation(Violation::Engine(status))
            }
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ResourceAllocation(AllocationFailure::Engine(status)) => {
                write!(f, "resource allocation failed: {}", status)
            }
            Error::ResourceAllocation(AllocationFailure::DuplicateAddress(
                addr,
            )) => write!(f, "address {:#x} already attached", addr.address),
            Error::Timeout => write!(f, "transaction timed out"),
            Error::BusFault => write!(f, "bus fault"),
            Error::InvalidArgument(InvalidArgument::Address(addr)) => {
                write!(
                    f,
                    "address {:#x} out of range for {:?}",
                    addr.address, addr.mode
                )
            }
            Error::InvalidArgument(InvalidArgument::SclSpeed(hz)) => {
                write!(f, "unsupported SCL speed: {} Hz", hz)
            }
            Error::InvalidArgument(InvalidArgument::PinConflict(pin)) => {
                write!(f, "SDA and SCL both on pin {}", pin)
            }
            Error::InvalidArgument(InvalidArgument::WrongAddress(addr)) => {
                write!(f, "handle cannot address {:#x}", addr.address)
            }
            Error::InvalidArgument(InvalidArgument::Rejected) => {
                write!(f, "invalid argument")
            }
            Error::PreconditionViolation(Violation::DeviceRemoved) => {
                write!(f, "device already removed")
            }
            Error::PreconditionViolation(Violation::DevicesAttached(n)) => {
                write!(f, "bus still has {} attached devices", n)
            }
            Error::PreconditionViolation(Violation::Engine(status)) => {
                write!(f, "invalid handle state: {}", status)
            }
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            Error::BusFault => embedded_hal::i2c::ErrorKind::Bus,
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}
