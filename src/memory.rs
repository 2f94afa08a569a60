use std::{
    fmt,
    ops::{Deref, DerefMut},
    os::raw::c_void,
    ptr::NonNull,
    slice,
};

use crate::device::Driver;
use crate::error::{Error, Result};

/// Memory used for buffer exchange
///
/// Only memory-mapped buffers are supported.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Mmap = 1,
}

/// Memory-mapped region
///
/// The backing memory is owned by the driver. It is mapped into the process so frame data can
/// be read once the driver hands the buffer back on dequeue.
///
/// The mapping remembers its own length. It is released through the driver that created it,
/// either explicitly via [`Mapping::unmap`] or by the destructor.
pub struct Mapping<'a, D: Driver + ?Sized> {
    driver: &'a D,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a, D: Driver + ?Sized> Mapping<'a, D> {
    /// Takes ownership of a region returned by [`Driver::mmap`].
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live mapping of exactly `len` bytes created by `driver`, and
    /// nothing else may release it.
    pub(crate) unsafe fn from_raw(driver: &'a D, ptr: NonNull<u8>, len: usize) -> Self {
        Mapping { driver, ptr, len }
    }

    /// Start address of the mapping
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Releases the mapping and reports errors instead of swallowing them
    pub fn unmap(self) -> Result<()> {
        let this = std::mem::ManuallyDrop::new(self);
        unsafe {
            this.driver
                .munmap(this.ptr.as_ptr() as *mut c_void, this.len)
                .map_err(Error::Io)
        }
    }
}

impl<D: Driver + ?Sized> Drop for Mapping<'_, D> {
    fn drop(&mut self) {
        let ret = unsafe {
            self.driver
                .munmap(self.ptr.as_ptr() as *mut c_void, self.len)
        };
        if let Err(e) = ret {
            log::warn!("failed to unmap {} bytes at {:p}: {}", self.len, self.ptr, e);
        }
    }
}

impl<D: Driver + ?Sized> Deref for Mapping<'_, D> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<D: Driver + ?Sized> DerefMut for Mapping<'_, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<D: Driver + ?Sized> fmt::Debug for Mapping<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
