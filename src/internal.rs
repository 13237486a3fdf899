use crate::Ves;
use crate::container::{HEADER_LEN, Slot};
use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use crate::raw::{self, HeaderState, write_aligned};
use crate::sector::{Sector, SectorUse};
use crate::translator::{Entry, Location};
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{debug, trace, warn};

/// Free sectors held back so that garbage collection always has a destination.
pub(crate) const RESERVED_SECTORS: usize = 1;

impl<T> Ves<T>
where
    T: Platform,
{
    pub(crate) fn slot_address(&self, location: Location) -> usize {
        self.sectors[location.sector as usize].address
            + (location.slot as usize + 1) * self.layout.size
    }

    /// Rebuilds every piece of in-RAM state from the flash content:
    /// 1. Classify each sector by its header
    /// 2. Decode every container and keep the newest one per virtual offset, ordered by
    ///    (sector generation, slot)
    /// 3. Pick the active sector
    /// 4. Finish a garbage collection cycle that was interrupted before the drained sector
    ///    could be erased
    pub(crate) fn load_sectors(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("load_sectors");

        #[cfg(feature = "debug-logs")]
        println!("internal: load_sectors");

        self.sectors.clear();
        self.translator.clear();
        self.active = None;

        let mut buf = vec![0u8; self.geometry.sector_size];
        for index in 0..self.geometry.sector_count {
            let address = self.base_address + index as usize * self.geometry.sector_size;
            self.hal
                .read(address as _, &mut buf)
                .map_err(|_| Error::FlashError)?;
            self.load_sector(index, address, &buf);
        }

        self.select_active();

        if !self.config.read_only {
            self.restore_reserve()?;
        }

        Ok(())
    }

    fn load_sector(&mut self, index: u16, address: usize, buf: &[u8]) {
        let generation = match raw::parse_sector_header::<T>(buf, T::crc16) {
            HeaderState::Erased => {
                self.sectors.push(Sector::free(address, false));
                return;
            }
            HeaderState::Stale => {
                #[cfg(feature = "defmt")]
                warn!("load_sector: @{:#08x} is stale, will be erased before use", address);

                #[cfg(feature = "debug-logs")]
                println!("  internal: load_sector: 0x{address:08x} -> stale");

                self.sectors.push(Sector::free(address, true));
                return;
            }
            HeaderState::InUse { generation } => generation,
        };

        #[cfg(feature = "debug-logs")]
        println!("  internal: load_sector: 0x{address:08x} -> generation {generation}");

        self.sectors.push(Sector::in_use(address, generation));

        let size = self.layout.size;
        let mut used = 0u16;
        for slot in 0..self.geometry.slots_per_sector {
            let start = (slot as usize + 1) * size;
            match self.layout.decode(&buf[start..start + size], T::crc16) {
                Slot::Erased => continue,
                Slot::Corrupt => {
                    #[cfg(feature = "defmt")]
                    debug!("load_sector: @{:#08x}[{}] corrupt, skipping", address, slot);

                    #[cfg(feature = "debug-logs")]
                    println!("  internal: load_sector: slot {slot} corrupt, skipping");

                    used = slot + 1;
                }
                Slot::Valid(container) => {
                    used = slot + 1;
                    self.record_scanned(
                        container.offset,
                        Location {
                            sector: index,
                            slot,
                        },
                        container.tombstone,
                    );
                }
            }
        }

        // erased slots below the last written one are lost until the next erase
        self.sectors[index as usize].used = used;
    }

    fn record_scanned(&mut self, offset: u16, location: Location, tombstone: bool) {
        if let Some(existing) = self.translator.lookup(offset) {
            let existing_age = (
                self.sectors[existing.location.sector as usize].generation,
                existing.location.slot,
            );
            let age = (
                self.sectors[location.sector as usize].generation,
                location.slot,
            );
            if age <= existing_age {
                return;
            }
        }

        self.record_write(offset, Entry { location, tombstone });
    }

    /// Only the newest sector may receive appends, otherwise new containers would look older
    /// than containers in sectors with a higher generation.
    fn select_active(&mut self) {
        let Some(index) = self.newest_sector() else {
            return;
        };

        let sector = &mut self.sectors[index];
        if sector.used < self.geometry.slots_per_sector {
            sector.usage = SectorUse::Active;
            self.active = Some(index as u16);
        }
    }

    /// Without a free sector, the partition was interrupted after a garbage collection target was
    /// allocated but before the drained sector got erased.
    fn restore_reserve(&mut self) -> Result<(), Error> {
        if self.free_sector_count() >= RESERVED_SECTORS {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        warn!("restore_reserve: no free sector, continuing garbage collection");

        #[cfg(feature = "debug-logs")]
        println!("internal: restore_reserve");

        match self.collect_garbage_once() {
            Ok(()) | Err(Error::OutOfSpace) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn newest_sector(&self) -> Option<usize> {
        self.sectors
            .iter()
            .enumerate()
            .filter(|(_, sector)| sector.holds_data())
            .max_by_key(|(_, sector)| sector.generation)
            .map(|(index, _)| index)
    }

    pub(crate) fn free_sector_count(&self) -> usize {
        self.sectors.iter().filter(|sector| sector.is_free()).count()
    }

    pub(crate) fn record_write(&mut self, offset: u16, entry: Entry) {
        self.sectors[entry.location.sector as usize].live += 1;
        if let Some(superseded) = self.translator.record_write(offset, entry) {
            self.sectors[superseded.location.sector as usize].live -= 1;
        }
    }

    pub(crate) fn read_container(&mut self, location: Location) -> Result<Vec<u8>, Error> {
        #[cfg(feature = "defmt")]
        trace!("read_container: {}", location);

        let mut buf = vec![0u8; self.layout.size];
        let address = self.slot_address(location);
        self.hal
            .read(address as _, &mut buf)
            .map_err(|_| Error::FlashError)?;
        Ok(buf)
    }

    /// The current value of `offset`, `None` if it was never written or erased.
    pub(crate) fn load_payload(&mut self, offset: u16) -> Result<Option<Vec<u8>>, Error> {
        let Some(entry) = self.translator.lookup(offset) else {
            return Ok(None);
        };
        if entry.tombstone {
            return Ok(None);
        }

        let raw = self.read_container(entry.location)?;
        match self.layout.decode(&raw, T::crc16) {
            Slot::Valid(container) if container.offset == offset && !container.tombstone => {
                Ok(Some(container.payload.to_vec()))
            }
            _ => {
                #[cfg(feature = "defmt")]
                warn!("load_payload: container for {} changed on flash", offset);

                #[cfg(feature = "debug-logs")]
                println!("internal: load_payload: container for {offset} changed on flash");

                Ok(None)
            }
        }
    }

    /// Appends an encoded container to the active sector, running the garbage collector if
    /// needed, and points `offset` at it.
    pub(crate) fn append_container(
        &mut self,
        offset: u16,
        raw: &[u8],
        tombstone: bool,
    ) -> Result<Location, Error> {
        let location = self.reserve_slot()?;
        self.program_container(location, raw)?;
        self.record_write(offset, Entry { location, tombstone });
        Ok(location)
    }

    /// Writes everything but the commit chunk first. The commit chunk ends with the container
    /// header, so the container only becomes valid once all of its bytes are on flash.
    pub(crate) fn program_container(
        &mut self,
        location: Location,
        raw: &[u8],
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("program_container: {}", location);

        #[cfg(feature = "debug-logs")]
        println!(
            "internal: program_container: sector {} slot {}",
            location.sector, location.slot
        );

        // the slot counts as consumed even if programming fails halfway
        let sector = &mut self.sectors[location.sector as usize];
        debug_assert_eq!(sector.used, location.slot);
        sector.used += 1;

        let address = self.slot_address(location);
        let commit = T::align_write_ceil(HEADER_LEN).min(raw.len());
        let (body, tail) = raw.split_at(raw.len() - commit);

        if body.iter().any(|&b| b != 0xFF) {
            write_aligned(&mut self.hal, address as _, body).map_err(|_| Error::FlashError)?;
        }
        write_aligned(&mut self.hal, (address + body.len()) as _, tail)
            .map_err(|_| Error::FlashError)
    }

    pub(crate) fn active_slot(&self) -> Option<Location> {
        let index = self.active?;
        let sector = &self.sectors[index as usize];
        (sector.used < self.geometry.slots_per_sector).then_some(Location {
            sector: index,
            slot: sector.used,
        })
    }

    /// Every iteration either allocates a sector or reclaims one, garbage collection fails with
    /// `OutOfSpace` once nothing can be reclaimed.
    pub(crate) fn reserve_slot(&mut self) -> Result<Location, Error> {
        loop {
            if let Some(location) = self.active_slot() {
                return Ok(location);
            }

            self.retire_active();

            if self.free_sector_count() > RESERVED_SECTORS {
                self.activate_free_sector()?;
            } else {
                self.collect_garbage_once()?;
            }
        }
    }

    pub(crate) fn retire_active(&mut self) {
        if let Some(index) = self.active.take() {
            #[cfg(feature = "defmt")]
            trace!("retire_active: {}", index);

            self.sectors[index as usize].usage = SectorUse::Retired;
        }
    }

    /// Turns the next free sector into the active one. Sectors are handed out round robin,
    /// starting after the newest one, to spread the erases.
    pub(crate) fn activate_free_sector(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("activate_free_sector");

        let count = self.sectors.len();
        let start = self.newest_sector().map_or(0, |index| index + 1);
        let index = (start..start + count)
            .map(|index| index % count)
            .find(|&index| self.sectors[index].is_free())
            .ok_or(Error::OutOfSpace)?;

        let generation = self.next_generation()?;

        if self.sectors[index].usage == (SectorUse::Free { needs_erase: true }) {
            self.erase_sector(index)?;
        }

        #[cfg(feature = "debug-logs")]
        println!("internal: activate_free_sector: sector {index} generation {generation}");

        let address = self.sectors[index].address;
        let header = raw::encode_sector_header(generation, T::crc16);
        write_aligned(&mut self.hal, address as _, &header).map_err(|_| Error::FlashError)?;

        let mut sector = Sector::in_use(address, generation);
        sector.usage = SectorUse::Active;
        self.sectors[index] = sector;
        self.active = Some(index as u16);

        Ok(())
    }

    fn next_generation(&self) -> Result<u32, Error> {
        match self.newest_sector() {
            Some(index) => self.sectors[index]
                .generation
                .checked_add(1)
                .ok_or(Error::OutOfSpace),
            None => Ok(0),
        }
    }

    pub(crate) fn erase_sector(&mut self, index: usize) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase_sector: {}", index);

        #[cfg(feature = "debug-logs")]
        println!("internal: erase_sector {index}");

        let address = self.sectors[index].address;
        self.hal
            .erase(address as _, (address + self.geometry.sector_size) as _)
            .map_err(|_| Error::FlashError)?;

        self.sectors[index] = Sector::free(address, false);
        Ok(())
    }
}
