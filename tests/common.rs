#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use crc::{CRC_16_IBM_3740, Crc};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub const FLASH_SECTOR_SIZE: usize = 4096;
// Taken from https://github.com/esp-rs/esp-hal/blob/main/esp-storage/src/stub.rs
pub const WORD_SIZE: usize = 4;
pub const CONTAINER_SIZE: usize = 64;
pub const SLOTS_PER_SECTOR: usize = FLASH_SECTOR_SIZE / CONTAINER_SIZE - 1;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

pub const SECTOR_MAGIC: u32 = 0x5345_5631;
pub const SECTOR_HEADER_SIZE: usize = 12;

/// A valid header of an in-use sector.
pub fn sector_header(generation: u32) -> [u8; SECTOR_HEADER_SIZE] {
    let mut header = [0xFFu8; SECTOR_HEADER_SIZE];
    header[..4].copy_from_slice(&SECTOR_MAGIC.to_le_bytes());
    header[4..8].copy_from_slice(&generation.to_le_bytes());
    let crc = <Flash as nvms_ves::platform::Crc>::crc16(u16::MAX, &header[..8]);
    header[8..10].copy_from_slice(&crc.to_le_bytes());
    header
}

/// Flash address of a container slot, slot 0 follows the sector header.
pub fn slot_address(sector: usize, slot: usize) -> usize {
    sector * FLASH_SECTOR_SIZE + (slot + 1) * CONTAINER_SIZE
}

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    /// Bytes of the failing write that still reach the flash, simulates a power loss in the
    /// middle of programming.
    pub torn_write_bytes: usize,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl Flash {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SECTOR_SIZE * sectors],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    pub fn new_with_fault(sectors: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SECTOR_SIZE * sectors],
            fail_after_operation,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.torn_write_bytes = 0;
    }

    pub fn fail_in(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn program(&mut self, offset: usize, bytes: &[u8]) {
        for (i, &val) in bytes.iter().enumerate() {
            // NOR flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));

        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: read:  0x{offset:04X} FAULT");
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = FLASH_SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: erase: {from:04X} - {to:04X} FAULT");
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));
        assert!(!bytes.is_empty());

        if self.operations.len() >= self.fail_after_operation {
            let torn = self.torn_write_bytes.min(bytes.len());
            println!(
                "    flash: write: 0x{offset:04X}[0x{:04X}] FAULT after {torn} bytes",
                bytes.len()
            );
            self.program(offset as usize, &bytes[..torn]);
            return Err(FlashError);
        }

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        self.program(offset as usize, bytes);
        Ok(())
    }
}

impl nvms_ves::platform::Crc for Flash {
    fn crc16(init: u16, data: &[u8]) -> u16 {
        let mut digest = CRC16.digest_with_initial(init);
        digest.update(data);
        digest.finalize()
    }
}
