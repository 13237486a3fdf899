//! Engine configuration. The defaults mirror the values the VES driver ships with on the
//! vendor SDK.

use crate::container::{ContainerLayout, MAX_CELL_COUNT};
use crate::error::Error;
use crate::platform::Platform;
use crate::raw::retire_marker_range;

pub const DEFAULT_CONTAINER_SIZE: usize = 64;

/// For a partition of `x` bytes the virtual address space is
/// `x / multiplier / container_size * max_payload` bytes. The remaining flash is headroom for
/// stale containers, which keeps garbage collection cheap.
pub const DEFAULT_MULTIPLIER: usize = 8;

/// More sectors are possible but double the RAM used for address translation.
pub const DEFAULT_MAX_SECTOR_COUNT: usize = 256;

/// Selects which sector the garbage collector reclaims.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GcThreshold {
    /// Always reclaim the sector with the most dirty containers. Totally dirty sectors are
    /// recycled without copying anything, at the cost of slightly uneven wear.
    MostDirty,

    /// Reclaim the oldest sector with at least this many dirty containers, even if it still
    /// holds live data. Causes more erases overall but levels the wear across sectors.
    ///
    /// If no sector reaches the threshold the collector falls back to
    /// [`GcThreshold::MostDirty`], so the threshold orders candidates but never blocks a write
    /// while space can be reclaimed.
    DirtyContainers(u16),
}

impl GcThreshold {
    /// Converts the numeric form where `-1` selects [`GcThreshold::MostDirty`].
    pub const fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            GcThreshold::MostDirty
        } else if raw > u16::MAX as i32 {
            GcThreshold::DirtyContainers(u16::MAX)
        } else {
            GcThreshold::DirtyContainers(raw as u16)
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Size of one container in bytes, has to be a multiple of the flash read and write size.
    pub container_size: usize,
    /// Protect every container with a CRC16, costs 2 bytes of payload per container.
    pub crc: bool,
    pub max_sector_count: usize,
    pub gc_threshold: GcThreshold,
    pub multiplier: usize,
    /// Reject all modifications, e.g. for factory data partitions.
    pub read_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            container_size: DEFAULT_CONTAINER_SIZE,
            crc: false,
            max_sector_count: DEFAULT_MAX_SECTOR_COUNT,
            gc_threshold: GcThreshold::MostDirty,
            multiplier: DEFAULT_MULTIPLIER,
            read_only: false,
        }
    }

    pub const fn with_container_size(mut self, container_size: usize) -> Self {
        self.container_size = container_size;
        self
    }

    pub const fn with_crc(mut self, crc: bool) -> Self {
        self.crc = crc;
        self
    }

    pub const fn with_max_sector_count(mut self, max_sector_count: usize) -> Self {
        self.max_sector_count = max_sector_count;
        self
    }

    pub const fn with_gc_threshold(mut self, gc_threshold: GcThreshold) -> Self {
        self.gc_threshold = gc_threshold;
        self
    }

    pub const fn with_multiplier(mut self, multiplier: usize) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Payload bytes per container for this configuration.
    pub const fn max_payload(&self) -> usize {
        ContainerLayout::max_payload_for(self.container_size, self.crc)
    }

    /// Checks the configuration against the flash geometry.
    pub(crate) fn geometry<T: Platform>(&self, partition_size: usize) -> Result<Geometry, Error> {
        let sector_size = T::ERASE_SIZE;
        let sector_count = partition_size / sector_size;
        if sector_count < 2
            || sector_count > self.max_sector_count
            || sector_count > u16::MAX as usize
        {
            return Err(Error::InvalidPartitionSize);
        }

        let container_size = self.container_size;
        if container_size == 0
            || !container_size.is_multiple_of(T::READ_SIZE)
            || !container_size.is_multiple_of(T::WRITE_SIZE)
            || container_size < retire_marker_range::<T>().end
            || self.max_payload() == 0
            || self.max_payload() > u8::MAX as usize
            || container_size * 2 > sector_size
        {
            return Err(Error::InvalidConfig);
        }

        // the first slot of every sector holds the sector header
        let slots_per_sector = sector_size / container_size - 1;
        if slots_per_sector > u16::MAX as usize {
            return Err(Error::InvalidConfig);
        }

        if self.multiplier == 0 {
            return Err(Error::InvalidConfig);
        }
        let cell_count = partition_size / self.multiplier / container_size;
        // one sector is always kept in reserve for garbage collection
        if cell_count == 0
            || cell_count > MAX_CELL_COUNT
            || cell_count >= (sector_count - 1) * slots_per_sector
        {
            return Err(Error::InvalidConfig);
        }

        Ok(Geometry {
            sector_size,
            sector_count: sector_count as u16,
            slots_per_sector: slots_per_sector as u16,
            cell_count: cell_count as u16,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Geometry {
    pub(crate) sector_size: usize,
    pub(crate) sector_count: u16,
    pub(crate) slots_per_sector: u16,
    pub(crate) cell_count: u16,
}
