//! Fixed-size on-flash record holding the value of one virtual offset.
//!
//! ```text
//! [0 .. P)        payload area, unused tail is 0xFF
//! [P .. P+2)      CRC16, only in CRC mode
//! [S-2 .. S)      header (u16, little endian): cell index in the low 14 bits, kind in the top 2
//! ```
//!
//! A value that doesn't fill the payload area keeps its length in the last byte of the area, a
//! full one needs no length. The header is the last field of the container and is programmed
//! last. The erased pattern `0b11` is not a valid kind, so a write that is interrupted before
//! the high byte of the header is programmed never decodes as valid.

use crate::error::Error;
use crate::platform::FnCrc16;
use alloc::vec;
use alloc::vec::Vec;

pub(crate) const HEADER_LEN: usize = 2;
pub(crate) const CRC_LEN: usize = 2;

const KIND_SHIFT: u32 = 14;
const OFFSET_MASK: u16 = (1 << KIND_SHIFT) - 1;

/// Cell indices have to fit next to the kind bits.
pub(crate) const MAX_CELL_COUNT: usize = OFFSET_MASK as usize;

#[derive(strum::FromRepr, Debug, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub(crate) enum Kind {
    Tombstone = 0b00,
    /// Shorter than the payload area, the length is stored in the last byte of the area.
    Partial = 0b01,
    /// Fills the whole payload area.
    Full = 0b10,
}

/// Result of decoding one container slot.
#[derive(Debug, PartialEq)]
pub(crate) enum Slot<'a> {
    /// Never written since the last erase.
    Erased,
    Valid(Container<'a>),
    /// Torn write, bit rot or CRC mismatch. Treated as if it never happened.
    Corrupt,
}

#[derive(Debug, PartialEq)]
pub(crate) struct Container<'a> {
    pub(crate) offset: u16,
    pub(crate) tombstone: bool,
    pub(crate) payload: &'a [u8],
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct ContainerLayout {
    pub(crate) size: usize,
    pub(crate) crc: bool,
    pub(crate) cell_count: u16,
}

impl ContainerLayout {
    pub(crate) const fn max_payload_for(size: usize, crc: bool) -> usize {
        let overhead = if crc { HEADER_LEN + CRC_LEN } else { HEADER_LEN };
        size.saturating_sub(overhead)
    }

    pub(crate) const fn max_payload(&self) -> usize {
        Self::max_payload_for(self.size, self.crc)
    }

    fn header_start(&self) -> usize {
        self.size - HEADER_LEN
    }

    pub(crate) fn encode(
        &self,
        offset: u16,
        payload: &[u8],
        crc16: FnCrc16,
    ) -> Result<Vec<u8>, Error> {
        let max_payload = self.max_payload();
        if payload.len() > max_payload {
            return Err(Error::PayloadTooLarge);
        }

        let mut buf = vec![0xFFu8; self.size];
        buf[..payload.len()].copy_from_slice(payload);

        let kind = if payload.len() == max_payload {
            Kind::Full
        } else {
            buf[max_payload - 1] = payload.len() as u8;
            Kind::Partial
        };
        self.seal(&mut buf, offset, kind, crc16);
        Ok(buf)
    }

    pub(crate) fn encode_tombstone(&self, offset: u16, crc16: FnCrc16) -> Vec<u8> {
        let mut buf = vec![0xFFu8; self.size];
        self.seal(&mut buf, offset, Kind::Tombstone, crc16);
        buf
    }

    fn seal(&self, buf: &mut [u8], offset: u16, kind: Kind, crc16: FnCrc16) {
        let header = ((kind as u16) << KIND_SHIFT) | (offset & OFFSET_MASK);
        let start = self.header_start();
        buf[start..].copy_from_slice(&header.to_le_bytes());

        if self.crc {
            let crc = self.checksum(buf, crc16);
            let crc_start = self.max_payload();
            buf[crc_start..crc_start + CRC_LEN].copy_from_slice(&crc.to_le_bytes());
        }
    }

    fn checksum(&self, buf: &[u8], crc16: FnCrc16) -> u16 {
        let crc = crc16(u16::MAX, &buf[..self.max_payload()]);
        crc16(crc, &buf[self.header_start()..])
    }

    pub(crate) fn decode<'a>(&self, raw: &'a [u8], crc16: FnCrc16) -> Slot<'a> {
        debug_assert_eq!(raw.len(), self.size);

        if raw.iter().all(|&b| b == 0xFF) {
            return Slot::Erased;
        }

        let start = self.header_start();
        let header = u16::from_le_bytes([raw[start], raw[start + 1]]);
        let Some(kind) = Kind::from_repr((header >> KIND_SHIFT) as u8) else {
            return Slot::Corrupt;
        };
        let offset = header & OFFSET_MASK;
        if offset >= self.cell_count {
            return Slot::Corrupt;
        }

        let max_payload = self.max_payload();
        let len = match kind {
            Kind::Tombstone => 0,
            Kind::Full => max_payload,
            Kind::Partial => match raw[max_payload - 1] as usize {
                len if len < max_payload => len,
                _ => return Slot::Corrupt,
            },
        };

        if self.crc {
            let crc_start = max_payload;
            let stored = u16::from_le_bytes([raw[crc_start], raw[crc_start + 1]]);
            if stored != self.checksum(raw, crc16) {
                return Slot::Corrupt;
            }
        }

        Slot::Valid(Container {
            offset,
            tombstone: kind == Kind::Tombstone,
            payload: &raw[..len],
        })
    }
}
