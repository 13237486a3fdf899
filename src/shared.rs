//! Shared access to one partition from multiple tasks.

use crate::error::Error;
use crate::platform::Platform;
use crate::{Config, Get, Set, Ves, VesStatistics};
use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

/// A [`Ves`] behind a blocking mutex. Every method locks the mutex for the duration of the call,
/// so operations of different tasks never interleave.
///
/// Pick the raw mutex like for any other `embassy-sync` primitive, e.g. `CriticalSectionRawMutex`
/// when sharing with interrupts or `NoopRawMutex` within a single executor.
pub struct VesInstance<M: RawMutex, T: Platform> {
    inner: Mutex<M, RefCell<Ves<T>>>,
}

impl<M: RawMutex, T: Platform> VesInstance<M, T> {
    pub fn new(ves: Ves<T>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(ves)),
        }
    }

    /// Mounts the partition, see [`Ves::new`].
    pub fn mount(
        partition_offset: usize,
        partition_size: usize,
        config: Config,
        hal: T,
    ) -> Result<Self, Error> {
        Ves::new(partition_offset, partition_size, config, hal).map(Self::new)
    }

    /// Runs `f` with exclusive access to the instance. Calling back into the same instance from
    /// within `f` returns `Busy`.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ves<T>) -> Result<R, Error>) -> Result<R, Error> {
        self.inner.lock(|cell| {
            let mut ves = cell.try_borrow_mut().map_err(|_| Error::Busy)?;
            f(&mut ves)
        })
    }

    pub fn read(&self, offset: u16, buf: &mut [u8]) -> Result<usize, Error> {
        self.with(|ves| ves.read(offset, buf))
    }

    pub fn write(&self, offset: u16, data: &[u8]) -> Result<(), Error> {
        self.with(|ves| ves.write(offset, data))
    }

    pub fn erase(&self, offset: u16) -> Result<(), Error> {
        self.with(|ves| ves.erase(offset))
    }

    pub fn read_at(&self, address: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.with(|ves| ves.read_at(address, buf))
    }

    pub fn write_at(&self, address: usize, data: &[u8]) -> Result<(), Error> {
        self.with(|ves| ves.write_at(address, data))
    }

    pub fn get<R>(&self, offset: u16) -> Result<R, Error>
    where
        Ves<T>: Get<R>,
    {
        self.with(|ves| ves.get(offset))
    }

    pub fn set<R>(&self, offset: u16, value: R) -> Result<(), Error>
    where
        Ves<T>: Set<R>,
    {
        self.with(|ves| ves.set(offset, value))
    }

    pub fn collect_garbage(&self) -> Result<(), Error> {
        self.with(|ves| ves.collect_garbage())
    }

    pub fn rebuild_from_flash(&self) -> Result<(), Error> {
        self.with(|ves| ves.rebuild_from_flash())
    }

    pub fn statistics(&self) -> Result<VesStatistics, Error> {
        self.with(|ves| ves.statistics())
    }

    pub fn into_inner(self) -> Ves<T> {
        self.inner.into_inner().into_inner()
    }
}
