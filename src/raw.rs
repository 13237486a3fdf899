use crate::platform::{AlignedOps, FnCrc16, Platform};
use alloc::vec;
use core::ops::Range;
#[cfg(feature = "defmt")]
use defmt::trace;

/// "1VES" in little endian
pub(crate) const SECTOR_MAGIC: u32 = 0x5345_5631;

/// magic (4) + generation (4) + crc16 (2) + reserved (2)
pub(crate) const SECTOR_HEADER_LEN: usize = 12;

const RETIRE_MARKER_LEN: usize = 4;

const MAGIC_RANGE: Range<usize> = 0..4;
const GENERATION_RANGE: Range<usize> = 4..8;
const CRC_RANGE: Range<usize> = 8..10;

/// What the first slot of a sector tells about the whole sector.
#[derive(Debug, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum HeaderState {
    /// Every byte of the sector is in the erased state.
    Erased,

    /// No usable header: torn erase, torn header write or a sector that was drained by the
    /// garbage collector and retired before its erase completed. Content must be ignored and the
    /// sector erased before reuse.
    Stale,

    /// Valid header, the sector holds containers.
    InUse { generation: u32 },
}

/// The retire marker lives in its own write unit right after the header so that programming it
/// never touches bytes that were already written.
pub(crate) fn retire_marker_range<T: Platform>() -> Range<usize> {
    let start = T::align_write_ceil(SECTOR_HEADER_LEN);
    start..start + T::align_write_ceil(RETIRE_MARKER_LEN)
}

pub(crate) fn encode_sector_header(generation: u32, crc16: FnCrc16) -> [u8; SECTOR_HEADER_LEN] {
    let mut buf = [0xFFu8; SECTOR_HEADER_LEN];
    buf[MAGIC_RANGE].copy_from_slice(&SECTOR_MAGIC.to_le_bytes());
    buf[GENERATION_RANGE].copy_from_slice(&generation.to_le_bytes());
    let crc = crc16(u16::MAX, &buf[..CRC_RANGE.start]);
    buf[CRC_RANGE].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Classifies a sector from its raw content. `sector` has to be the complete sector as the
/// erased state can only be confirmed by looking at every byte.
pub(crate) fn parse_sector_header<T: Platform>(sector: &[u8], crc16: FnCrc16) -> HeaderState {
    let header = &sector[..SECTOR_HEADER_LEN];

    if header.iter().all(|&b| b == 0xFF) {
        return if sector.iter().all(|&b| b == 0xFF) {
            HeaderState::Erased
        } else {
            HeaderState::Stale
        };
    }

    let magic = u32::from_le_bytes(header[MAGIC_RANGE].try_into().unwrap_or([0; 4]));
    if magic != SECTOR_MAGIC {
        return HeaderState::Stale;
    }

    let stored_crc = u16::from_le_bytes([header[CRC_RANGE.start], header[CRC_RANGE.start + 1]]);
    if stored_crc != crc16(u16::MAX, &header[..CRC_RANGE.start]) {
        return HeaderState::Stale;
    }

    if sector[retire_marker_range::<T>()].iter().any(|&b| b != 0xFF) {
        return HeaderState::Stale;
    }

    let generation = u32::from_le_bytes(header[GENERATION_RANGE].try_into().unwrap_or([0; 4]));
    HeaderState::InUse { generation }
}

#[inline(always)]
pub(crate) fn write_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("write_aligned @{:#08x}: [{}]", offset, bytes.len());

    if bytes.len().is_multiple_of(T::WRITE_SIZE) {
        hal.write(offset, bytes)
    } else {
        let pivot = T::align_write_floor(bytes.len());
        let header = &bytes[..pivot];
        let trailer = &bytes[pivot..];
        if !header.is_empty() {
            hal.write(offset, header)?;
        }

        // an all-ones trailer is already the erased state of the flash
        if trailer.iter().any(|&e| e != 0xFF) {
            let mut buf = vec![0xFFu8; T::WRITE_SIZE];
            buf[..trailer.len()].copy_from_slice(trailer);
            hal.write(offset + (pivot as u32), &buf)?
        }

        Ok(())
    }
}
