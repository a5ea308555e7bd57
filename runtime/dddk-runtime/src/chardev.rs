//! Character devices and the registry that dispatches to them

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::uaccess::{UserSink, UserSource};
use crate::{DriverError, Result};

/// File-style operations a registered device node supports
pub trait CharDevice: Send + Sync {
    /// Write the caller's bytes, returning how many were transferred
    fn write(&self, src: &dyn UserSource) -> Result<usize>;

    /// Read into `buf`
    fn read(&self, _buf: &mut [u8]) -> Result<usize> {
        Err(DriverError::NotSupported)
    }

    /// Device-specific control request
    fn ioctl(&self, request: u32, _arg: &mut dyn UserSink) -> Result<()> {
        Err(DriverError::NoSuchDevice { request })
    }
}

/// Registers device nodes by name
pub trait DeviceRegistry {
    fn register(&mut self, name: &str, device: Arc<dyn CharDevice>) -> Result<()>;

    /// Remove `name`. Unknown names are ignored.
    fn unregister(&mut self, name: &str);
}

/// Name-keyed registry of miscellaneous character devices
#[derive(Default)]
pub struct MiscRegistry {
    nodes: BTreeMap<String, Arc<dyn CharDevice>>,
}

impl MiscRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node the way an `open()` would
    pub fn open(&self, name: &str) -> Option<Arc<dyn CharDevice>> {
        self.nodes.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DeviceRegistry for MiscRegistry {
    fn register(&mut self, name: &str, device: Arc<dyn CharDevice>) -> Result<()> {
        if self.nodes.contains_key(name) {
            return Err(DriverError::Registration {
                name: name.to_string(),
                reason: "name already registered".to_string(),
            });
        }
        self.nodes.insert(name.to_string(), device);
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        self.nodes.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uaccess::{NoArg, UserSlice};

    struct Sink;

    impl CharDevice for Sink {
        fn write(&self, src: &dyn UserSource) -> Result<usize> {
            Ok(src.len())
        }
    }

    #[test]
    fn test_default_operations() {
        let dev = Sink;
        assert!(matches!(dev.read(&mut [0u8; 4]), Err(DriverError::NotSupported)));
        assert!(matches!(
            dev.ioctl(9, &mut NoArg),
            Err(DriverError::NoSuchDevice { request: 9 })
        ));
    }

    #[test]
    fn test_register_and_open() {
        let mut registry = MiscRegistry::new();
        registry.register("sink", Arc::new(Sink)).unwrap();

        let dev = registry.open("sink").unwrap();
        assert_eq!(dev.write(&UserSlice::new(b"hello")).unwrap(), 5);
        assert!(registry.open("other").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = MiscRegistry::new();
        registry.register("sink", Arc::new(Sink)).unwrap();

        let result = registry.register("sink", Arc::new(Sink));
        assert!(matches!(result, Err(DriverError::Registration { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = MiscRegistry::new();
        registry.register("sink", Arc::new(Sink)).unwrap();

        registry.unregister("sink");
        registry.unregister("sink");
        assert!(registry.is_empty());
    }
}
