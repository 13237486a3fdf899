/// Life-cycle state of a sector as reported by [`crate::Ves::statistics`].
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SectorState {
    /// Erased (or to be erased before use), holds no containers.
    Free,
    /// Currently receiving new containers. There is at most one.
    Active,
    /// Every slot holds a live container.
    FullLive,
    /// Holds stale containers or slots that can't be used anymore.
    Dirty,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub(crate) enum SectorUse {
    Free { needs_erase: bool },
    Active,
    /// Holds containers but doesn't accept new ones.
    Retired,
}

/// In-RAM bookkeeping for one sector. Only the counters are kept, containers are read from
/// flash on demand.
#[derive(Debug, Clone)]
pub(crate) struct Sector {
    pub(crate) address: usize,
    pub(crate) usage: SectorUse,
    pub(crate) generation: u32,
    /// Write cursor: slots below are consumed, whether they hold valid data or not.
    pub(crate) used: u16,
    /// Slots referenced by the address translator.
    pub(crate) live: u16,
}

impl Sector {
    pub(crate) fn free(address: usize, needs_erase: bool) -> Self {
        Self {
            address,
            usage: SectorUse::Free { needs_erase },
            generation: 0,
            used: 0,
            live: 0,
        }
    }

    pub(crate) fn in_use(address: usize, generation: u32) -> Self {
        Self {
            address,
            usage: SectorUse::Retired,
            generation,
            used: 0,
            live: 0,
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        matches!(self.usage, SectorUse::Free { .. })
    }

    pub(crate) fn holds_data(&self) -> bool {
        !self.is_free()
    }

    pub(crate) fn dirty(&self) -> u16 {
        self.used - self.live
    }

    pub(crate) fn free_slots(&self, slots_per_sector: u16) -> u16 {
        slots_per_sector - self.used
    }

    /// Slots gained by draining and erasing this sector.
    pub(crate) fn reclaimable(&self, slots_per_sector: u16) -> u16 {
        slots_per_sector - self.live
    }

    pub(crate) fn state(&self, slots_per_sector: u16) -> SectorState {
        match self.usage {
            SectorUse::Free { .. } => SectorState::Free,
            SectorUse::Active => SectorState::Active,
            SectorUse::Retired if self.live == slots_per_sector => SectorState::FullLive,
            SectorUse::Retired => SectorState::Dirty,
        }
    }
}
