//! DDDK Runtime - Runtime support for platform device drivers
//!
//! This crate provides the types and traits a platform driver is written
//! against: error types, the register window abstraction, and the
//! collaborators a driver talks to but does not implement itself.
//!
//! # Integration Points
//! - Discovery: [`PlatformDevice`] describes a hardware node (compatible
//!   strings, memory resources, properties)
//! - Mapping: [`ResourceMapper`] turns a [`MemResource`] into a [`RegisterWindow`]
//! - Power: [`PmHold`] keeps a [`PowerDomain`] active for an instance's lifetime
//! - Dispatch: [`DeviceRegistry`] exposes [`CharDevice`]s under a node name
//! - User copies: [`UserSource`] / [`UserSink`] model the protection boundary
//!
//! # Testing Strategy
//! The `mock` feature provides test doubles for every collaborator so drivers
//! can be exercised on the host.

use std::collections::TryReserveError;

use thiserror::Error;

pub mod chardev;
pub mod errno;
pub mod mmio;
pub mod platform;
pub mod power;
pub mod uaccess;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use chardev::{CharDevice, DeviceRegistry, MiscRegistry};
pub use mmio::{MapError, MmioMapper, MmioRegion, RegisterWindow, ResourceMapper};
pub use platform::{MemResource, PlatformDevice, PlatformDriver};
pub use power::{PmHold, PowerDomain};
pub use uaccess::{NoArg, UserFault, UserSink, UserSlice, UserSource};

/// Driver error types
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Device has no memory resource")]
    NoResource,

    #[error("Allocation failed: {0}")]
    AllocationFailure(#[from] TryReserveError),

    #[error("MMIO mapping failed: {0}")]
    MappingFailure(#[from] MapError),

    #[error("No such device: unknown request {request:#x}")]
    NoSuchDevice { request: u32 },

    #[error("Bad address: {0}")]
    BadAddress(#[from] UserFault),

    #[error("Operation not supported")]
    NotSupported,

    #[error("Device not ready after {polls} polls")]
    Timeout { polls: u32 },

    #[error("Device is not handled by driver {driver}")]
    NotMatched { driver: &'static str },

    #[error("Device at {base:#x} is already bound")]
    Busy { base: u64 },

    #[error("Registration of {name} failed: {reason}")]
    Registration { name: String, reason: String },

    #[error("Power management error: {0}")]
    Power(String),

    #[error("Device has been removed")]
    Removed,
}

impl DriverError {
    /// Negative errno a file-style dispatch layer hands back to its caller.
    pub fn errno(&self) -> i32 {
        let code = match self {
            DriverError::NoResource | DriverError::NotMatched { .. } | DriverError::Removed => {
                errno::ENODEV
            }
            DriverError::AllocationFailure(_) => errno::ENOMEM,
            DriverError::MappingFailure(cause) => cause.errno(),
            DriverError::NoSuchDevice { .. } => errno::ENXIO,
            DriverError::BadAddress(_) => errno::EFAULT,
            DriverError::NotSupported => errno::EINVAL,
            DriverError::Timeout { .. } => errno::ETIMEDOUT,
            DriverError::Busy { .. } => errno::EBUSY,
            DriverError::Registration { .. } => errno::EEXIST,
            DriverError::Power(_) => errno::EIO,
        };
        -code
    }
}

pub type Result<T> = core::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(DriverError::NoResource.errno(), -errno::ENODEV);
        assert_eq!(DriverError::NoSuchDevice { request: 7 }.errno(), -errno::ENXIO);
        assert_eq!(DriverError::BadAddress(UserFault { offset: 3 }).errno(), -errno::EFAULT);
        assert_eq!(DriverError::NotSupported.errno(), -errno::EINVAL);
        assert_eq!(DriverError::Timeout { polls: 10 }.errno(), -errno::ETIMEDOUT);
    }

    #[test]
    fn test_mapping_failure_keeps_cause() {
        use std::error::Error;

        let err = DriverError::from(MapError::Busy { start: 0x4806_a000, end: 0x4806_b000 });
        assert_eq!(err.errno(), -errno::EBUSY);

        let source = err.source().expect("mapping failure has a source");
        assert!(source.to_string().contains("0x4806a000"));
    }

    #[test]
    fn test_allocation_failure_from_try_reserve() {
        let mut v: Vec<u8> = Vec::new();
        let err = DriverError::from(v.try_reserve(usize::MAX).unwrap_err());
        assert!(matches!(err, DriverError::AllocationFailure(_)));
        assert_eq!(err.errno(), -errno::ENOMEM);
    }
}
