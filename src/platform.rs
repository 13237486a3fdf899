use embedded_storage::nor_flash::NorFlash;

/// Everything the engine needs from the hardware: a NOR flash whose `ERASE_SIZE` is the sector
/// size, and a CRC16 implementation (usually the ROM or a hardware CRC unit).
pub trait Platform: Crc + NorFlash {}

impl<T: Crc + NorFlash> Platform for T {}

pub type FnCrc16 = fn(init: u16, data: &[u8]) -> u16;

/// `crc16` has to be chainable: feeding the result of one call as `init` into the next call
/// must give the same result as a single call over the concatenated data.
pub trait Crc {
    fn crc16(init: u16, data: &[u8]) -> u16;
}

impl<T: Crc> Crc for &mut T {
    fn crc16(init: u16, data: &[u8]) -> u16 {
        T::crc16(init, data)
    }
}

pub trait AlignedOps: Platform {
    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use crate::platform::Crc;

    impl Crc for FlashStorage<'_> {
        fn crc16(init: u16, data: &[u8]) -> u16 {
            esp_hal::rom::crc::crc16_le(init, data)
        }
    }
}
