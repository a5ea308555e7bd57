//! Instance manager: probe and remove
//!
//! Probe order is resource → bookkeeping → mapping → power → hardware setup
//! → node registration. Any failure undoes the steps before it, so a failed
//! probe leaves nothing mapped, held or registered.

use std::sync::Arc;

use dddk_runtime::{
    DeviceRegistry, DriverError, MapError, MemResource, PlatformDevice, PlatformDriver, PmHold,
    RegisterWindow, ResourceMapper, Result,
};
use log::{error, info, warn};

use crate::config::DriverConfig;
use crate::device::{device_name, FeSerial};
use crate::regs::REG_BLOCK_SIZE;
use crate::{uart, CLOCK_FREQUENCY, DRIVER_NAME};

/// Everything held on behalf of one bound device
struct Binding<W: RegisterWindow> {
    res: MemResource,
    device: Arc<FeSerial<W>>,
    // Released on drop, after the node is gone
    _power: PmHold,
}

/// Platform driver for free-electrons serial ports
pub struct FeSerialDriver<M: ResourceMapper, R: DeviceRegistry> {
    config: DriverConfig,
    mapper: M,
    registry: R,
    bound: Vec<Binding<M::Window>>,
}

impl<M, R> FeSerialDriver<M, R>
where
    M: ResourceMapper,
    M::Window: 'static,
    R: DeviceRegistry,
{
    pub fn new(config: DriverConfig, mapper: M, registry: R) -> Self {
        Self {
            config,
            mapper,
            registry,
            bound: Vec::new(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut M {
        &mut self.mapper
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Number of currently bound devices
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    fn find(&self, base: u64) -> Option<usize> {
        self.bound.iter().position(|b| b.res.start == base)
    }
}

impl<M, R> PlatformDriver for FeSerialDriver<M, R>
where
    M: ResourceMapper,
    M::Window: 'static,
    R: DeviceRegistry,
{
    type Instance = Arc<FeSerial<M::Window>>;

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn matches(&self, pdev: &dyn PlatformDevice) -> bool {
        self.config.compatible.iter().any(|c| pdev.is_compatible(c))
    }

    fn probe(&mut self, pdev: &dyn PlatformDevice) -> Result<Self::Instance> {
        if !self.matches(pdev) {
            return Err(DriverError::NotMatched { driver: DRIVER_NAME });
        }

        let res = pdev.mem_resource(0).ok_or_else(|| {
            error!("{}: cannot get memory resource", pdev.name());
            DriverError::NoResource
        })?;

        if self.find(res.start).is_some() {
            return Err(DriverError::Busy { base: res.start });
        }

        if res.size < REG_BLOCK_SIZE {
            error!("{}: resource of {:#x} bytes cannot hold the registers", pdev.name(), res.size);
            return Err(MapError::TooSmall {
                size: res.size,
                required: REG_BLOCK_SIZE,
            }
            .into());
        }

        self.bound.try_reserve(1)?;
        let name = device_name(&self.config.name_prefix, res.start)?;

        let mut regs = self.mapper.map(&res).map_err(|e| {
            error!("{}: cannot remap registers: {}", pdev.name(), e);
            e
        })?;

        let power = match PmHold::acquire(pdev.power_domain()) {
            Ok(hold) => hold,
            Err(e) => {
                error!("{}: cannot resume device: {}", pdev.name(), e);
                self.mapper.unmap(&res);
                return Err(e);
            }
        };

        let clock = pdev.property_u32(CLOCK_FREQUENCY).unwrap_or(0);
        let divisor = uart::configure(&mut regs, clock);

        let device = Arc::new(FeSerial::new(name, regs, self.config.tx_wait));
        if let Err(e) = self.registry.register(device.name(), device.clone()) {
            error!("{}: cannot register {}: {}", pdev.name(), device.name(), e);
            device.detach();
            drop(power);
            self.mapper.unmap(&res);
            return Err(e);
        }

        info!(
            "{}: {} at {:#x} (clock {} Hz, divisor {})",
            pdev.name(),
            device.name(),
            res.start,
            clock,
            divisor
        );

        self.bound.push(Binding {
            res,
            device: device.clone(),
            _power: power,
        });
        Ok(device)
    }

    fn remove(&mut self, pdev: &dyn PlatformDevice) {
        let Some(pos) = pdev.mem_resource(0).and_then(|res| self.find(res.start)) else {
            warn!("{}: remove of unbound device ignored", pdev.name());
            return;
        };

        let binding = self.bound.swap_remove(pos);
        self.registry.unregister(binding.device.name());
        binding.device.detach();
        self.mapper.unmap(&binding.res);

        info!("{}: removed {}", pdev.name(), binding.device.name());
    }
}
