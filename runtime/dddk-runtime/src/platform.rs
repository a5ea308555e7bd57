//! Platform devices - what discovery hands to a driver
//!
//! Enumeration itself (device tree walking, static board tables) happens
//! elsewhere; a driver only sees the resulting [`PlatformDevice`] on probe
//! and again on removal.

use std::sync::Arc;

use crate::power::PowerDomain;
use crate::Result;

/// Physical memory resource `[start, start + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemResource {
    pub start: u64,
    pub size: u64,
}

impl MemResource {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// Exclusive end address
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub fn overlaps(&self, other: &MemResource) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// A discovered hardware node
pub trait PlatformDevice {
    /// Node name (for logging)
    fn name(&self) -> &str;

    /// Whether the node lists `compatible` among its compatible strings
    fn is_compatible(&self, compatible: &str) -> bool;

    /// Memory resource number `index`, if present
    fn mem_resource(&self, index: usize) -> Option<MemResource>;

    /// 32-bit property `name`, if present
    fn property_u32(&self, name: &str) -> Option<u32>;

    /// Power domain the node sits in
    fn power_domain(&self) -> Arc<dyn PowerDomain>;
}

/// Trait for platform driver lifecycle
pub trait PlatformDriver {
    /// Handle to a bound instance
    type Instance;

    /// Get the driver name
    fn driver_name(&self) -> &'static str;

    /// Whether this driver handles `pdev`
    fn matches(&self, pdev: &dyn PlatformDevice) -> bool;

    /// Bind to a newly discovered device
    fn probe(&mut self, pdev: &dyn PlatformDevice) -> Result<Self::Instance>;

    /// Unbind from a device that went away. Removal cannot fail.
    fn remove(&mut self, pdev: &dyn PlatformDevice);
}
