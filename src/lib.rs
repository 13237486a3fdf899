#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod config;
mod container;
pub mod error;
mod gc;
mod get;
mod internal;
pub mod platform;
mod raw;
mod sector;
mod set;
pub mod shared;
mod translator;

pub use config::{Config, GcThreshold};
pub use get::Get;
pub use sector::SectorState;
pub use set::Set;
pub use shared::VesInstance;

extern crate alloc;

use crate::config::Geometry;
use crate::container::ContainerLayout;
use crate::error::Error;
use crate::platform::Platform;
use crate::sector::Sector;
use crate::translator::Translator;
use alloc::vec;
use alloc::vec::Vec;
use embedded_storage::{ReadStorage, Storage};

#[derive(Debug, Clone, PartialEq)]
pub struct VesStatistics {
    pub sectors: SectorStatistics,
    pub containers_per_sector: Vec<ContainerStatistics>,
    pub containers_overall: ContainerStatistics,
    /// Cells currently holding a value.
    pub values: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorStatistics {
    pub free: u16,
    pub active: u16,
    pub full_live: u16,
    pub dirty: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStatistics {
    pub free: u32,
    pub live: u32,
    pub dirty: u32,
}

/// The Ves struct keeps a small record per sector plus the address translation table in memory.
/// RAM usage grows with the number of sectors and cells of the partition.
pub struct Ves<T: Platform> {
    pub(crate) hal: T,
    pub(crate) base_address: usize,
    pub(crate) config: Config,
    pub(crate) layout: ContainerLayout,
    pub(crate) geometry: Geometry,
    pub(crate) faulted: bool,

    // set after calling self.load_sectors
    pub(crate) sectors: Vec<Sector>,
    pub(crate) translator: Translator,
    pub(crate) active: Option<u16>,
}

impl<T: Platform> Ves<T> {
    /// Validates the partition geometry against `config` and reads all sectors of the partition
    /// to rebuild the address translation. Sectors left behind by an interrupted garbage
    /// collection are cleaned up unless the configuration is read-only.
    pub fn new(
        partition_offset: usize,
        partition_size: usize,
        config: Config,
        hal: T,
    ) -> Result<Ves<T>, Error> {
        if !partition_offset.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidPartitionOffset);
        }

        if !partition_size.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidPartitionSize);
        }

        let geometry = config.geometry::<T>(partition_size)?;
        let layout = ContainerLayout {
            size: config.container_size,
            crc: config.crc,
            cell_count: geometry.cell_count,
        };

        let mut ves: Ves<T> = Self {
            hal,
            base_address: partition_offset,
            config,
            layout,
            geometry,
            faulted: false,
            sectors: Vec::with_capacity(geometry.sector_count as _),
            translator: Translator::new(geometry.cell_count),
            active: None,
        };

        match ves.load_sectors() {
            Ok(()) => Ok(ves),
            Err(Error::FlashError) => {
                ves.faulted = true;
                Err(Error::FlashError)
            }
            Err(e) => Err(e),
        }
    }

    /// Drops all in-memory state and scans the partition again. This is the only way to recover
    /// from a `FlashError`.
    pub fn rebuild_from_flash(&mut self) -> Result<(), Error> {
        self.faulted = false;
        let result = self.load_sectors();
        self.track_fault(result)
    }

    /// Copies the value of `offset` into `buf` and returns the number of bytes copied. If `buf`
    /// is shorter than the value, the value is truncated.
    ///
    /// Returns `NotFound` if the offset was never written or was erased.
    pub fn read(&mut self, offset: u16, buf: &mut [u8]) -> Result<usize, Error> {
        self.check_offset(offset)?;

        let result = self.load_payload(offset);
        let payload = self.track_fault(result)?.ok_or(Error::NotFound)?;

        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(len)
    }

    /// Writes `data` as the new value of `offset`. Every call appends a container, even if the
    /// data didn't change, and may run a garbage collection cycle first.
    pub fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), Error> {
        self.ensure_writable()?;
        self.check_offset(offset)?;

        let raw = self.layout.encode(offset, data, T::crc16)?;
        let result = self.append_container(offset, &raw, false);
        self.track_fault(result).map(|_| ())
    }

    /// Erase an offset
    ///
    /// Ignores offsets that were never written or are already erased
    pub fn erase(&mut self, offset: u16) -> Result<(), Error> {
        self.ensure_writable()?;
        self.check_offset(offset)?;

        match self.translator.lookup(offset) {
            None => return Ok(()),
            Some(entry) if entry.tombstone => return Ok(()),
            Some(_) => {}
        }

        let raw = self.layout.encode_tombstone(offset, T::crc16);
        let result = self.append_container(offset, &raw, true);
        self.track_fault(result).map(|_| ())
    }

    /// Reads `buf.len()` bytes of the virtual EEPROM starting at byte `address`. The address
    /// space is made of all cells laid out back to back, bytes never written read as `0xFF`.
    pub fn read_at(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Error> {
        let end = self.checked_end(address, buf.len())?;
        let max_payload = self.layout.max_payload();

        let mut position = address;
        while position < end {
            let cell = position / max_payload;
            let start = position % max_payload;
            let len = (max_payload - start).min(end - position);
            let dst = &mut buf[position - address..][..len];

            let result = self.load_payload(cell as u16);
            let current = self.track_fault(result)?.unwrap_or_default();

            dst.fill(0xFF);
            if start < current.len() {
                let available = (current.len() - start).min(len);
                dst[..available].copy_from_slice(&current[start..start + available]);
            }

            position += len;
        }

        Ok(())
    }

    /// Writes `data` to the virtual EEPROM starting at byte `address`. Every touched cell is
    /// read, patched and written back, cells whose content doesn't change are skipped.
    pub fn write_at(&mut self, address: usize, data: &[u8]) -> Result<(), Error> {
        self.ensure_writable()?;
        let end = self.checked_end(address, data.len())?;
        let max_payload = self.layout.max_payload();

        let mut position = address;
        while position < end {
            let cell = position / max_payload;
            let start = position % max_payload;
            let len = (max_payload - start).min(end - position);
            let src = &data[position - address..][..len];

            let result = self.patch_cell(cell as u16, start, src);
            self.track_fault(result)?;

            position += len;
        }

        Ok(())
    }

    fn patch_cell(&mut self, offset: u16, start: usize, bytes: &[u8]) -> Result<(), Error> {
        let current = self.load_payload(offset)?.unwrap_or_default();

        let mut cell = vec![0xFFu8; self.layout.max_payload()];
        cell[..current.len()].copy_from_slice(&current);

        let end = start + bytes.len();
        if cell[start..end] == *bytes {
            return Ok(());
        }
        cell[start..end].copy_from_slice(bytes);

        let raw = self
            .layout
            .encode(offset, &cell[..end.max(current.len())], T::crc16)?;
        self.append_container(offset, &raw, false).map(|_| ())
    }

    /// Get a value from the flash.
    ///
    /// Supported types are bool, signed and unsigned integers up to 64-bit width, String and Vec.
    pub fn get<R>(&mut self, offset: u16) -> Result<R, Error>
    where
        Ves<T>: Get<R>,
    {
        match Get::get(self, offset) {
            Ok(val) => Ok(val),
            Err(Error::FlashError) => {
                self.faulted = true;
                Err(Error::FlashError)
            }
            Err(e) => Err(e),
        }
    }

    /// Set a value and write it to the flash
    ///
    /// Type support:
    ///  * bool, signed and unsigned integers up to 64-bit width: little endian, exactly as wide
    ///    as the type
    ///  * &str and &[u8]: up to `max_payload` bytes
    pub fn set<R>(&mut self, offset: u16, value: R) -> Result<(), Error>
    where
        Ves<T>: Set<R>,
    {
        self.ensure_writable()?;

        match Set::set(self, offset, value) {
            Ok(()) => Ok(()),
            Err(Error::FlashError) => {
                self.faulted = true;
                Err(Error::FlashError)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs one garbage collection cycle ahead of time, e.g. while the system is idle, so that
    /// later writes don't have to.
    ///
    /// Returns `OutOfSpace` if no sector can be reclaimed.
    pub fn collect_garbage(&mut self) -> Result<(), Error> {
        self.ensure_writable()?;

        let result = self.collect_garbage_once();
        self.track_fault(result)
    }

    /// Payload bytes available per cell.
    pub fn max_payload(&self) -> usize {
        self.layout.max_payload()
    }

    pub fn cell_count(&self) -> u16 {
        self.geometry.cell_count
    }

    /// Size of the byte addressed view used by `read_at` and `write_at`.
    pub fn virtual_size(&self) -> usize {
        self.geometry.cell_count as usize * self.layout.max_payload()
    }

    pub fn sector_count(&self) -> u16 {
        self.geometry.sector_count
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns detailed statistics about the VES partition usage
    pub fn statistics(&mut self) -> Result<VesStatistics, Error> {
        if self.faulted {
            return Err(Error::FlashError);
        }

        let slots = self.geometry.slots_per_sector;
        let mut sector_stats = SectorStatistics {
            free: 0,
            active: 0,
            full_live: 0,
            dirty: 0,
        };

        let containers_per_sector = self
            .sectors
            .iter()
            .map(|sector| {
                match sector.state(slots) {
                    SectorState::Free => sector_stats.free += 1,
                    SectorState::Active => sector_stats.active += 1,
                    SectorState::FullLive => sector_stats.full_live += 1,
                    SectorState::Dirty => sector_stats.dirty += 1,
                }

                ContainerStatistics {
                    free: sector.free_slots(slots) as _,
                    live: sector.live as _,
                    dirty: sector.dirty() as _,
                }
            })
            .collect::<Vec<_>>();

        let containers_overall = containers_per_sector.iter().fold(
            ContainerStatistics {
                free: 0,
                live: 0,
                dirty: 0,
            },
            |acc, x| ContainerStatistics {
                free: acc.free + x.free,
                live: acc.live + x.live,
                dirty: acc.dirty + x.dirty,
            },
        );

        Ok(VesStatistics {
            sectors: sector_stats,
            containers_per_sector,
            containers_overall,
            values: self.translator.value_count() as _,
        })
    }

    fn ensure_writable(&self) -> Result<(), Error> {
        if self.faulted {
            return Err(Error::FlashError);
        }
        if self.config.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    fn check_offset(&self, offset: u16) -> Result<(), Error> {
        if offset >= self.geometry.cell_count {
            return Err(Error::AddressOutOfRange);
        }
        Ok(())
    }

    fn checked_end(&self, address: usize, len: usize) -> Result<usize, Error> {
        address
            .checked_add(len)
            .filter(|&end| end <= self.virtual_size())
            .ok_or(Error::AddressOutOfRange)
    }

    fn track_fault<R>(&mut self, result: Result<R, Error>) -> Result<R, Error> {
        if let Err(Error::FlashError) = result {
            self.faulted = true;
        }
        result
    }
}

/// Byte addressed access through the generic `embedded-storage` traits, see
/// [`Ves::read_at`] and [`Ves::write_at`].
impl<T: Platform> ReadStorage for Ves<T> {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_at(offset as usize, bytes)
    }

    fn capacity(&self) -> usize {
        self.virtual_size()
    }
}

impl<T: Platform> Storage for Ves<T> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_at(offset as usize, bytes)
    }
}
