use alloc::vec;
use alloc::vec::Vec;

/// Physical position of a container: sector index within the partition and slot index within
/// the sector (the header slot is not counted).
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct Location {
    pub(crate) sector: u16,
    pub(crate) slot: u16,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub(crate) struct Entry {
    pub(crate) location: Location,
    pub(crate) tombstone: bool,
}

/// Maps every virtual offset to the newest container written for it. Rebuilt from flash on
/// every mount, it is never persisted.
pub(crate) struct Translator {
    entries: Vec<Option<Entry>>,
}

impl Translator {
    pub(crate) fn new(cell_count: u16) -> Self {
        Self {
            entries: vec![None; cell_count as usize],
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.iter_mut().for_each(|entry| *entry = None);
    }

    pub(crate) fn lookup(&self, offset: u16) -> Option<Entry> {
        self.entries.get(offset as usize).copied().flatten()
    }

    /// Returns the superseded entry, if any, so that the caller can account for the stale
    /// container.
    pub(crate) fn record_write(&mut self, offset: u16, entry: Entry) -> Option<Entry> {
        self.entries[offset as usize].replace(entry)
    }

    pub(crate) fn remove(&mut self, offset: u16) -> Option<Entry> {
        self.entries[offset as usize].take()
    }

    /// Whether `offset` currently resolves to exactly this location.
    pub(crate) fn points_to(&self, offset: u16, location: Location) -> bool {
        self.lookup(offset)
            .is_some_and(|entry| entry.location == location)
    }

    /// Drops every entry located in `sector` and returns how many were dropped.
    pub(crate) fn forget_sector(&mut self, sector: u16) -> u16 {
        let mut dropped = 0;
        for entry in self.entries.iter_mut() {
            if entry.is_some_and(|entry| entry.location.sector == sector) {
                *entry = None;
                dropped += 1;
            }
        }
        dropped
    }

    /// Number of virtual offsets holding a value, tombstones excluded.
    pub(crate) fn value_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Some(entry) if !entry.tombstone))
            .count()
    }
}
