//! MMIO - Register windows and resource mapping
//!
//! A [`RegisterWindow`] is the only way a driver touches device registers.
//! Offsets are register indices, not byte offsets: register `n` lives at
//! `base + 4 * n`, and every access is a full 32-bit volatile load or store.

use core::ptr::{read_volatile, write_volatile};

use thiserror::Error;

use crate::errno;
use crate::platform::MemResource;

/// Width of one register slot in bytes
pub const REG_STRIDE: usize = 4;

/// Offset-indexed 32-bit register access
pub trait RegisterWindow: Send {
    /// Read register `offset`
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to register `offset`
    fn write32(&mut self, value: u32, offset: usize);
}

/// Memory-mapped register window
///
/// Accesses are issued in program order and never cached. Offsets past the
/// end of the window are a programming error and only checked in debug builds.
#[derive(Debug)]
pub struct MmioRegion {
    base: usize,
    size: usize,
}

impl MmioRegion {
    /// Create a new MMIO region
    ///
    /// # Safety
    /// Caller must ensure `[base, base + size)` is mapped device memory that
    /// stays valid for the lifetime of the region, and that `base` is 4-byte
    /// aligned.
    pub unsafe fn new(base: usize, size: usize) -> Self {
        debug_assert!(base % REG_STRIDE == 0);
        Self { base, size }
    }

    /// Get base address
    pub fn base(&self) -> usize {
        self.base
    }

    /// Get size
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn addr(&self, offset: usize) -> usize {
        debug_assert!((offset + 1) * REG_STRIDE <= self.size);
        self.base + offset * REG_STRIDE
    }
}

impl RegisterWindow for MmioRegion {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: `new` guarantees the window is valid aligned device memory.
        unsafe { read_volatile(self.addr(offset) as *const u32) }
    }

    #[inline]
    fn write32(&mut self, value: u32, offset: usize) {
        // SAFETY: as above.
        unsafe { write_volatile(self.addr(offset) as *mut u32, value) }
    }
}

/// Mapping failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("Resource is empty")]
    EmptyResource,

    #[error("Resource {start:#x}..{end:#x} lies outside the device aperture")]
    OutsideAperture { start: u64, end: u64 },

    #[error("Physical range {start:#x}..{end:#x} is already mapped")]
    Busy { start: u64, end: u64 },

    #[error("Resource of {size:#x} bytes is smaller than the {required:#x} byte register block")]
    TooSmall { size: u64, required: u64 },
}

impl MapError {
    /// Errno (positive) matching the failure
    pub fn errno(&self) -> i32 {
        match self {
            MapError::EmptyResource
            | MapError::OutsideAperture { .. }
            | MapError::TooSmall { .. } => errno::EINVAL,
            MapError::Busy { .. } => errno::EBUSY,
        }
    }
}

/// Turns a memory resource into a register window
pub trait ResourceMapper {
    type Window: RegisterWindow;

    /// Map `res`, claiming its physical range until [`unmap`](Self::unmap)
    fn map(&mut self, res: &MemResource) -> Result<Self::Window, MapError>;

    /// Release the physical range claimed for `res`
    fn unmap(&mut self, res: &MemResource);
}

/// MMIO mapper for a linearly mapped device aperture
///
/// The kernel maps the physical device aperture once at a fixed virtual
/// offset; this mapper hands out windows inside it and refuses overlapping
/// claims, so each physical register block has at most one owner.
pub struct MmioMapper {
    /// Physical aperture start
    aperture_base: u64,

    /// Physical aperture size
    aperture_size: u64,

    /// Virtual address minus physical address
    virt_offset: usize,

    /// Claimed physical ranges
    claimed: Vec<MemResource>,
}

impl MmioMapper {
    /// Create a new MMIO mapper
    ///
    /// # Safety
    /// Caller must ensure every physical address in
    /// `[aperture_base, aperture_base + aperture_size)` is mapped uncached at
    /// `paddr + virt_offset` for as long as windows from this mapper exist.
    pub unsafe fn new(aperture_base: u64, aperture_size: u64, virt_offset: usize) -> Self {
        Self {
            aperture_base,
            aperture_size,
            virt_offset,
            claimed: Vec::new(),
        }
    }

    /// Number of live mappings
    pub fn mapped_count(&self) -> usize {
        self.claimed.len()
    }

    fn check(&self, res: &MemResource) -> Result<(), MapError> {
        if res.size == 0 {
            return Err(MapError::EmptyResource);
        }

        let aperture_end = self.aperture_base.saturating_add(self.aperture_size);
        if res.start < self.aperture_base || res.end() > aperture_end {
            return Err(MapError::OutsideAperture {
                start: res.start,
                end: res.end(),
            });
        }

        if let Some(other) = self.claimed.iter().find(|c| c.overlaps(res)) {
            return Err(MapError::Busy {
                start: other.start,
                end: other.end(),
            });
        }

        Ok(())
    }
}

impl ResourceMapper for MmioMapper {
    type Window = MmioRegion;

    fn map(&mut self, res: &MemResource) -> Result<MmioRegion, MapError> {
        self.check(res)?;

        let outside = MapError::OutsideAperture {
            start: res.start,
            end: res.end(),
        };
        let paddr = usize::try_from(res.start).map_err(|_| outside.clone())?;
        let size = usize::try_from(res.size).map_err(|_| outside)?;
        // The offset may encode a negative virtual-minus-physical distance
        let vaddr = paddr.wrapping_add(self.virt_offset);

        self.claimed.push(*res);
        log::debug!("mmio: {:#x}+{:#x} -> {:#x}", res.start, res.size, vaddr);

        // SAFETY: the range is inside the aperture, which `new` guarantees is
        // mapped at `virt_offset`, and it is now exclusively claimed.
        Ok(unsafe { MmioRegion::new(vaddr, size) })
    }

    fn unmap(&mut self, res: &MemResource) {
        self.claimed.retain(|c| c != res);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> MmioMapper {
        unsafe { MmioMapper::new(0x4800_0000, 0x10_0000, 0) }
    }

    #[test]
    fn test_region_accesses_are_word_indexed() {
        let mut backing = vec![0u32; 16];
        let mut region = unsafe { MmioRegion::new(backing.as_mut_ptr() as usize, 64) };

        region.write32(0xdead_beef, 3);
        region.write32(0x20, 5);

        assert_eq!(region.read32(3), 0xdead_beef);
        assert_eq!(region.read32(5), 0x20);
        drop(region);
        assert_eq!(backing[3], 0xdead_beef);
        assert_eq!(backing[4], 0);
    }

    #[test]
    fn test_map_inside_aperture() {
        let mut mapper = unsafe { MmioMapper::new(0x4800_0000, 0x10_0000, 0x1000_0000) };
        let region = mapper
            .map(&MemResource::new(0x4806_a000, 0x1000))
            .unwrap();

        assert_eq!(region.base(), 0x5806_a000);
        assert_eq!(region.size(), 0x1000);
        assert_eq!(mapper.mapped_count(), 1);
    }

    #[test]
    fn test_map_below_physical_addresses() {
        // Aperture at 0x4800_0000 seen at virtual 0x0800_0000
        let offset = 0usize.wrapping_sub(0x4000_0000);
        let mut mapper = unsafe { MmioMapper::new(0x4800_0000, 0x10_0000, offset) };

        let region = mapper.map(&MemResource::new(0x4806_a000, 0x1000)).unwrap();
        assert_eq!(region.base(), 0x0806_a000);
    }

    #[test]
    fn test_map_empty_resource() {
        let result = mapper().map(&MemResource::new(0x4806_a000, 0));
        assert!(matches!(result, Err(MapError::EmptyResource)));
    }

    #[test]
    fn test_map_outside_aperture() {
        let result = mapper().map(&MemResource::new(0x44e0_9000, 0x1000));
        assert!(matches!(result, Err(MapError::OutsideAperture { .. })));

        // Straddling the end is just as bad
        let result = mapper().map(&MemResource::new(0x480f_f800, 0x1000));
        assert!(matches!(result, Err(MapError::OutsideAperture { .. })));
    }

    #[test]
    fn test_overlapping_claim_is_busy() {
        let mut mapper = mapper();
        mapper.map(&MemResource::new(0x4806_a000, 0x1000)).unwrap();

        let result = mapper.map(&MemResource::new(0x4806_a800, 0x100));
        assert_eq!(
            result.unwrap_err(),
            MapError::Busy { start: 0x4806_a000, end: 0x4806_b000 }
        );

        // Adjacent blocks do not overlap
        assert!(mapper.map(&MemResource::new(0x4806_b000, 0x1000)).is_ok());
    }

    #[test]
    fn test_unmap_releases_claim() {
        let mut mapper = mapper();
        let res = MemResource::new(0x4806_a000, 0x1000);

        mapper.map(&res).unwrap();
        mapper.unmap(&res);
        assert_eq!(mapper.mapped_count(), 0);
        assert!(mapper.map(&res).is_ok());
    }
}
