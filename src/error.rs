use thiserror::Error;

/// Errors that can occur during VES operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. A caller would usually only handle `NotFound`,
/// `OutOfSpace` and `FlashError` as the other errors are static misuse of the API.
///
/// Corrupted containers found on flash are never reported: they are treated as if they were
/// never written.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The partition offset has to be aligned to the size of a flash sector
    #[error("invalid partition offset")]
    InvalidPartitionOffset,

    /// The partition size has to be a multiple of the flash sector size and span at least two
    /// sectors but no more than `Config::max_sector_count`
    #[error("invalid partition size")]
    InvalidPartitionSize,

    /// The container size or utilization multiplier don't fit the flash geometry
    #[error("invalid configuration")]
    InvalidConfig,

    /// The internal error value is returned from the provided `NorFlash`. Once returned, the
    /// instance refuses writes until `Ves::rebuild_from_flash` succeeded.
    #[error("internal flash error")]
    FlashError,

    /// The virtual offset was never written, was erased or all copies are corrupted.
    #[error("virtual offset not found")]
    NotFound,

    /// The value doesn't fit into a single container, see `Ves::max_payload`.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Garbage collection found no sector to reclaim.
    #[error("out of space")]
    OutOfSpace,

    /// The virtual offset or byte range is beyond the virtual address space.
    #[error("address out of range")]
    AddressOutOfRange,

    /// The partition was mounted read-only.
    #[error("partition is read-only")]
    ReadOnly,

    /// The stored value has a different width than the requested type.
    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    /// Stored data can't be interpreted as the requested type, e.g. invalid UTF-8.
    #[error("corrupted data")]
    CorruptedData,

    /// The shared instance is already locked by the current call chain.
    #[error("instance busy")]
    Busy,
}
