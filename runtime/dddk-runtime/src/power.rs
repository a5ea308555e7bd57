//! Runtime power management
//!
//! Reference counting lives in the [`PowerDomain`] implementation. Drivers
//! hold a [`PmHold`] for as long as an instance is bound; dropping it is the
//! one and only release.

use std::sync::Arc;

use crate::Result;

/// Runtime-PM controls for one device
pub trait PowerDomain: Send + Sync {
    /// Allow runtime PM for the device
    fn enable(&self);

    /// Take a usage reference and resume the device synchronously
    fn get_sync(&self) -> Result<()>;

    /// Drop a usage reference
    fn put(&self);

    /// Disallow runtime PM for the device
    fn disable(&self);
}

/// Scoped power hold: device resumed on acquire, released on drop
pub struct PmHold {
    domain: Arc<dyn PowerDomain>,
}

impl PmHold {
    /// Enable runtime PM and resume the device
    ///
    /// On failure runtime PM is disabled again and nothing is held.
    pub fn acquire(domain: Arc<dyn PowerDomain>) -> Result<Self> {
        domain.enable();
        if let Err(e) = domain.get_sync() {
            domain.disable();
            return Err(e);
        }
        Ok(Self { domain })
    }
}

impl Drop for PmHold {
    fn drop(&mut self) {
        self.domain.put();
        self.domain.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPower;

    #[test]
    fn test_hold_released_once_on_drop() {
        let power = Arc::new(MockPower::new());

        let hold = PmHold::acquire(power.clone()).unwrap();
        assert_eq!(power.active(), 1);
        assert!(power.enabled());

        drop(hold);
        assert_eq!(power.active(), 0);
        assert_eq!(power.puts(), 1);
        assert!(!power.enabled());
    }

    #[test]
    fn test_failed_resume_holds_nothing() {
        let power = Arc::new(MockPower::failing());

        assert!(PmHold::acquire(power.clone()).is_err());
        assert_eq!(power.active(), 0);
        assert_eq!(power.puts(), 0);
        assert!(!power.enabled());
    }
}
