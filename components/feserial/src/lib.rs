//! feserial - Driver for free-electrons serial ports
//!
//! # Purpose
//! Binds to 16550-compatible UARTs with an OMAP mode register, programs
//! them for 115200-8N1 and exposes each one as a write-only character
//! device with a byte counter.
//!
//! # Integration Points
//! - Depends on: `dddk-runtime` collaborators (platform device, mapper,
//!   power domain, device registry)
//! - Provides to: whoever dispatches file calls, via [`dddk_runtime::CharDevice`]
//! - Node names: `feserial-<hex physical base>`
//!
//! # Architecture
//! - [`regs`]: register map
//! - [`uart`]: divisor computation, hardware setup, polled transmit
//! - [`device`]: per-instance write path and counter ioctls
//! - [`driver`]: probe/remove and resource ownership
//! - [`config`]: driver configuration
//!
//! # Testing Strategy
//! - Unit tests: divisor, register sequencing, counter semantics
//! - Integration tests: full probe → write → ioctl → remove cycles against
//!   the `dddk-runtime` mocks

pub mod config;
pub mod device;
pub mod driver;
pub mod regs;
pub mod uart;

pub use config::{ConfigError, DriverConfig, TxWait};
pub use device::{device_name, FeSerial, SERIAL_GET_COUNTER, SERIAL_RESET_COUNTER};
pub use driver::FeSerialDriver;
pub use uart::{baud_divisor, BAUD_RATE};

/// Driver name, also the default node name prefix
pub const DRIVER_NAME: &str = "feserial";

/// Device tree compatible string
pub const COMPATIBLE: &str = "free-electrons,serial";

/// Input clock property (Hz)
pub const CLOCK_FREQUENCY: &str = "clock-frequency";
