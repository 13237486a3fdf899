use crate::Ves;
use crate::config::GcThreshold;
use crate::container::Slot;
use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{retire_marker_range, write_aligned};
use crate::sector::{Sector, SectorUse};
use crate::translator::{Entry, Location};
use alloc::vec;
use core::cmp::Reverse;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

impl<T> Ves<T>
where
    T: Platform,
{
    /// Retired sector to reclaim next, if any would free at least one slot. Only sectors
    /// accepted by `eligible` are considered.
    pub(crate) fn select_candidate(&self, eligible: impl Fn(&Sector) -> bool) -> Option<usize> {
        let slots = self.geometry.slots_per_sector;
        let eligible = &eligible;
        let candidates = || {
            self.sectors.iter().enumerate().filter(move |(_, sector)| {
                sector.usage == SectorUse::Retired
                    && sector.reclaimable(slots) > 0
                    && eligible(sector)
            })
        };

        if let GcThreshold::DirtyContainers(threshold) = self.config.gc_threshold {
            let oldest = candidates()
                .filter(|(_, sector)| sector.dirty() >= threshold)
                .min_by_key(|(_, sector)| sector.generation);
            if let Some((index, _)) = oldest {
                return Some(index);
            }
        }

        candidates()
            .max_by_key(|(_, sector)| {
                (
                    sector.dirty(),
                    sector.reclaimable(slots),
                    Reverse(sector.generation),
                )
            })
            .map(|(index, _)| index)
    }

    /// Slots left in the active sector.
    fn active_room(&self) -> u16 {
        self.active.map_or(0, |index| {
            self.sectors[index as usize].free_slots(self.geometry.slots_per_sector)
        })
    }

    /// Runs one garbage collection cycle: moves the live containers of the selected sector to the
    /// active sector (or a freshly allocated one) and erases it.
    pub(crate) fn collect_garbage_once(&mut self) -> Result<(), Error> {
        let room = self.active_room();
        let candidate = if self.free_sector_count() > 0 {
            self.select_candidate(|_| true)
        } else {
            // nowhere to allocate, the candidate has to fit into the active sector
            self.select_candidate(|sector| sector.live <= room)
        }
        .ok_or(Error::OutOfSpace)?;

        #[cfg(feature = "defmt")]
        trace!("collect_garbage_once: sector {}", candidate);

        #[cfg(feature = "debug-logs")]
        println!(
            "gc: collecting sector {candidate}: used {} live {}",
            self.sectors[candidate].used, self.sectors[candidate].live
        );

        if self.sectors[candidate].live > room {
            self.retire_active();
            self.activate_free_sector()?;
        }

        self.relocate_live_containers(candidate)?;
        self.reclaim_sector(candidate)
    }

    fn relocate_live_containers(&mut self, candidate: usize) -> Result<(), Error> {
        let address = self.sectors[candidate].address;
        let used = self.sectors[candidate].used;
        let generation = self.sectors[candidate].generation;

        // Tombstones only shadow older containers. Once no sector older than the candidate is
        // left, there is nothing to shadow and they can go.
        let drop_tombstones = self
            .sectors
            .iter()
            .enumerate()
            .filter(|(index, sector)| *index != candidate && sector.holds_data())
            .all(|(_, sector)| sector.generation > generation);

        let mut buf = vec![0u8; self.geometry.sector_size];
        self.hal
            .read(address as _, &mut buf)
            .map_err(|_| Error::FlashError)?;

        let size = self.layout.size;
        for slot in 0..used {
            let start = (slot as usize + 1) * size;
            let raw = &buf[start..start + size];
            let Slot::Valid(container) = self.layout.decode(raw, T::crc16) else {
                continue;
            };

            let location = Location {
                sector: candidate as u16,
                slot,
            };
            if !self.translator.points_to(container.offset, location) {
                continue;
            }

            if container.tombstone && drop_tombstones {
                self.translator.remove(container.offset);
                self.sectors[candidate].live -= 1;
                continue;
            }

            let target = self.active_slot().ok_or(Error::OutOfSpace)?;
            self.program_container(target, raw)?;
            self.record_write(
                container.offset,
                Entry {
                    location: target,
                    tombstone: container.tombstone,
                },
            );
        }

        if self.sectors[candidate].live > 0 {
            // containers that decoded at mount time but no longer do
            let lost = self.translator.forget_sector(candidate as u16);

            #[cfg(feature = "defmt")]
            warn!("relocate_live_containers: {} unreadable containers dropped", lost);

            #[cfg(feature = "debug-logs")]
            println!("gc: {lost} unreadable containers dropped");

            self.sectors[candidate].live -= lost;
        }

        Ok(())
    }

    /// Marks the drained sector as retired on flash before erasing it, so that an interrupted
    /// erase can't bring its containers back.
    fn reclaim_sector(&mut self, index: usize) -> Result<(), Error> {
        #[cfg(feature = "debug-logs")]
        println!("gc: reclaiming sector {index}");

        let address = self.sectors[index].address;
        let marker = retire_marker_range::<T>();
        let zeros = vec![0u8; marker.len()];

        self.sectors[index].usage = SectorUse::Free { needs_erase: true };
        write_aligned(&mut self.hal, (address + marker.start) as _, &zeros)
            .map_err(|_| Error::FlashError)?;

        self.erase_sector(index)
    }
}
