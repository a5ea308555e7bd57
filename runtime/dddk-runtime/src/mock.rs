//! Mock collaborators for host-side driver tests
//!
//! Every type here is cheap to clone or share, so a test can hand one copy
//! to the driver and keep another to inspect what the driver did.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use spin::Mutex;

use crate::mmio::{MapError, RegisterWindow, ResourceMapper};
use crate::platform::{MemResource, PlatformDevice};
use crate::power::PowerDomain;
use crate::uaccess::{UserFault, UserSource};
use crate::{DriverError, Result};

// 16550 register indices and bits the model cares about
const THR: usize = 0;
const LCR: usize = 3;
const LSR: usize = 5;
const LCR_DLAB: u32 = 0x80;
const LSR_TX_READY: u32 = 0x60;

#[derive(Default)]
struct UartState {
    regs: BTreeMap<usize, u32>,
    writes: Vec<(usize, u32)>,
    tx: Vec<u8>,
    busy_per_byte: u32,
    busy_left: u32,
    stuck: bool,
    lsr_reads: usize,
}

/// Register-level model of a 16550-compatible UART
///
/// Bytes written to THR with DLAB clear are captured as transmitted. After
/// each byte, LSR reports the transmitter busy for a configurable number of
/// reads before THRE comes back.
#[derive(Clone, Default)]
pub struct Mock16550 {
    state: Arc<Mutex<UartState>>,
}

impl Mock16550 {
    /// Transmitter always ready
    pub fn new() -> Self {
        Self::default()
    }

    /// Transmitter busy for `polls` LSR reads before every byte
    pub fn with_busy_polls(polls: u32) -> Self {
        let uart = Self::default();
        {
            let mut s = uart.state.lock();
            s.busy_per_byte = polls;
            s.busy_left = polls;
        }
        uart
    }

    /// Transmitter never becomes ready
    pub fn stuck() -> Self {
        let uart = Self::default();
        uart.state.lock().stuck = true;
        uart
    }

    /// Every register write so far, as `(offset, value)`
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().writes.clone()
    }

    /// Bytes that went out on the wire
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().tx.clone()
    }

    /// Number of LSR reads so far
    pub fn lsr_reads(&self) -> usize {
        self.state.lock().lsr_reads
    }

    /// Last value written to register `offset`
    pub fn reg(&self, offset: usize) -> u32 {
        self.state.lock().regs.get(&offset).copied().unwrap_or(0)
    }

    /// Forget recorded writes and transmitted bytes
    pub fn clear_log(&self) {
        let mut s = self.state.lock();
        s.writes.clear();
        s.tx.clear();
    }
}

impl RegisterWindow for Mock16550 {
    fn read32(&self, offset: usize) -> u32 {
        let mut s = self.state.lock();
        if offset != LSR {
            return s.regs.get(&offset).copied().unwrap_or(0);
        }

        s.lsr_reads += 1;
        if s.stuck {
            0
        } else if s.busy_left > 0 {
            s.busy_left -= 1;
            0
        } else {
            LSR_TX_READY
        }
    }

    fn write32(&mut self, value: u32, offset: usize) {
        let mut s = self.state.lock();
        s.writes.push((offset, value));

        let dlab = s.regs.get(&LCR).copied().unwrap_or(0) & LCR_DLAB != 0;
        if offset == THR && !dlab {
            s.tx.push(value as u8);
            s.busy_left = s.busy_per_byte;
        }
        s.regs.insert(offset, value);
    }
}

/// Power domain that counts usage references
#[derive(Default)]
pub struct MockPower {
    gets: AtomicUsize,
    puts: AtomicUsize,
    enabled: AtomicBool,
    fail_resume: bool,
}

impl MockPower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Domain whose resume always fails
    pub fn failing() -> Self {
        Self {
            fail_resume: true,
            ..Self::default()
        }
    }

    /// Outstanding usage references
    pub fn active(&self) -> usize {
        self.gets.load(Ordering::SeqCst) - self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl PowerDomain for MockPower {
    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn get_sync(&self) -> Result<()> {
        if self.fail_resume {
            return Err(DriverError::Power("resume failed".to_string()));
        }
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn put(&self) {
        self.puts.fetch_add(1, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

/// Hand-built platform device
pub struct MockPlatformDevice {
    name: String,
    compatible: Vec<String>,
    mem: Vec<MemResource>,
    props: BTreeMap<String, u32>,
    power: Arc<MockPower>,
}

impl MockPlatformDevice {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            compatible: Vec::new(),
            mem: Vec::new(),
            props: BTreeMap::new(),
            power: Arc::new(MockPower::new()),
        }
    }

    pub fn compatible(mut self, compatible: &str) -> Self {
        self.compatible.push(compatible.to_string());
        self
    }

    pub fn mem(mut self, start: u64, size: u64) -> Self {
        self.mem.push(MemResource::new(start, size));
        self
    }

    pub fn property(mut self, name: &str, value: u32) -> Self {
        self.props.insert(name.to_string(), value);
        self
    }

    pub fn with_power(mut self, power: Arc<MockPower>) -> Self {
        self.power = power;
        self
    }

    pub fn power(&self) -> Arc<MockPower> {
        self.power.clone()
    }
}

impl PlatformDevice for MockPlatformDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_compatible(&self, compatible: &str) -> bool {
        self.compatible.iter().any(|c| c == compatible)
    }

    fn mem_resource(&self, index: usize) -> Option<MemResource> {
        self.mem.get(index).copied()
    }

    fn property_u32(&self, name: &str) -> Option<u32> {
        self.props.get(name).copied()
    }

    fn power_domain(&self) -> Arc<dyn PowerDomain> {
        self.power.clone()
    }
}

/// Mapper that hands out [`Mock16550`] windows keyed by physical base
#[derive(Default)]
pub struct MockMapper {
    windows: BTreeMap<u64, Mock16550>,
    mapped: Vec<MemResource>,
    fail_next: Option<MapError>,
}

impl MockMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `window` for the resource starting at `base`
    pub fn prepare(&mut self, base: u64, window: Mock16550) {
        self.windows.insert(base, window);
    }

    /// Handle on the window mapped (or prepared) for `base`
    pub fn window(&self, base: u64) -> Option<Mock16550> {
        self.windows.get(&base).cloned()
    }

    /// Make the next `map` call fail with `err`
    pub fn fail_next(&mut self, err: MapError) {
        self.fail_next = Some(err);
    }

    pub fn is_mapped(&self, base: u64) -> bool {
        self.mapped.iter().any(|r| r.start == base)
    }
}

impl ResourceMapper for MockMapper {
    type Window = Mock16550;

    fn map(&mut self, res: &MemResource) -> core::result::Result<Mock16550, MapError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        if let Some(other) = self.mapped.iter().find(|r| r.overlaps(res)) {
            return Err(MapError::Busy {
                start: other.start,
                end: other.end(),
            });
        }
        self.mapped.push(*res);
        Ok(self.windows.entry(res.start).or_default().clone())
    }

    fn unmap(&mut self, res: &MemResource) {
        self.mapped.retain(|r| r != res);
    }
}

/// Caller buffer whose memory becomes inaccessible at `fault_at`
pub struct FaultingSource {
    bytes: Vec<u8>,
    fault_at: usize,
}

impl FaultingSource {
    pub fn new(bytes: &[u8], fault_at: usize) -> Self {
        Self {
            bytes: bytes.to_vec(),
            fault_at,
        }
    }
}

impl UserSource for FaultingSource {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn fetch(&self, index: usize) -> core::result::Result<u8, UserFault> {
        if index >= self.fault_at {
            return Err(UserFault { offset: index });
        }
        self.bytes.get(index).copied().ok_or(UserFault { offset: index })
    }
}
