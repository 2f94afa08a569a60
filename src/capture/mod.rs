//! Device control surface
//!
//! Each function performs exactly one kernel control operation on an already opened device and
//! returns what the driver filled in. The usual call sequence is
//!
//! 1. [`query_caps`], [`Formats`], [`FrameSizes`] in any order
//! 2. [`set_format`]
//! 3. [`request_buffers`]
//! 4. [`query_buffer`] and [`map_buffer`] for every slot
//! 5. [`stream_on`]
//! 6. [`queue_buffer`] / [`dequeue_buffer`] and reading the mapping, repeatedly
//! 7. [`stream_off`], [`unmap_buffer`], [`free_buffers`]
//!
//! Calls made out of order are passed on to the driver as-is and fail however the driver
//! decides they fail. [`Session`] runs the sequence for you.

use std::os::raw::c_void;
use std::{mem, ptr::NonNull};

use crate::buffer::{Descriptor, Type};
use crate::capability::Capabilities;
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::{Format, FourCC};
use crate::memory::{Mapping, Memory};
use crate::v4l2::vidioc;
use crate::v4l_sys::*;

mod cursor;
pub use cursor::{Formats, FrameSizes};

mod session;
pub use session::{Config, Frame, Session};

/// Issues `request` with `arg` and tags a failure with the request name.
///
/// # Safety
///
/// `T` must be the argument type encoded in `request`.
pub(crate) unsafe fn xioctl<D: Driver + ?Sized, T>(
    dev: &D,
    request: vidioc::_IOC_TYPE,
    arg: &mut T,
) -> Result<()> {
    dev.ioctl(request, arg as *mut T as *mut c_void)
        .map_err(|source| Error::Ioctl {
            call: vidioc::name(request),
            source,
        })
}

/// Queries the device capabilities
///
/// No interpretation of the returned flags takes place.
pub fn query_caps<D: Driver + ?Sized>(dev: &D) -> Result<Capabilities> {
    let mut v4l2_caps: v4l2_capability = unsafe { mem::zeroed() };
    unsafe { xioctl(dev, vidioc::VIDIOC_QUERYCAP, &mut v4l2_caps)? };

    Ok(Capabilities::from(v4l2_caps))
}

/// Returns the capture format currently configured on the device
pub fn format<D: Driver + ?Sized>(dev: &D) -> Result<Format> {
    let mut v4l2_fmt: v4l2_format = unsafe { mem::zeroed() };
    v4l2_fmt.type_ = Type::VideoCapture as u32;
    unsafe {
        xioctl(dev, vidioc::VIDIOC_G_FMT, &mut v4l2_fmt)?;
        Ok(Format::from(v4l2_fmt.fmt.pix))
    }
}

/// Negotiates the capture format
///
/// The driver may substitute the closest values it supports. The format it actually settled
/// on is returned; no error is raised when it differs from the request.
///
/// # Arguments
///
/// * `fourcc` - Pixel format
/// * `width` - Width in pixels
/// * `height` - Height in pixels
pub fn set_format<D: Driver + ?Sized>(
    dev: &D,
    fourcc: FourCC,
    width: u32,
    height: u32,
) -> Result<Format> {
    let requested = Format::new(width, height, fourcc);

    let mut v4l2_fmt: v4l2_format = unsafe { mem::zeroed() };
    v4l2_fmt.type_ = Type::VideoCapture as u32;
    v4l2_fmt.fmt.pix = requested.into();

    let negotiated = unsafe {
        xioctl(dev, vidioc::VIDIOC_S_FMT, &mut v4l2_fmt)?;
        Format::from(v4l2_fmt.fmt.pix)
    };

    if (negotiated.fourcc, negotiated.width, negotiated.height) != (fourcc, width, height) {
        log::debug!(
            "requested {} {}x{}, driver chose {} {}x{}",
            fourcc,
            width,
            height,
            negotiated.fourcc,
            negotiated.width,
            negotiated.height
        );
    }

    Ok(negotiated)
}

/// Asks the driver for a pool of memory-mapped capture buffers
///
/// Returns the number of buffers the driver actually allocated, which may differ from `count`.
/// A request for at least one buffer that yields none is reported as [`Error::NoBuffers`].
///
/// # Arguments
///
/// * `count` - Desired number of buffers, usually 1
pub fn request_buffers<D: Driver + ?Sized>(dev: &D, count: u32) -> Result<u32> {
    let granted = reqbufs(dev, count)?;

    if count > 0 && granted == 0 {
        return Err(Error::NoBuffers);
    }
    if granted != count {
        log::debug!("requested {} buffers, driver granted {}", count, granted);
    }

    Ok(granted)
}

/// Releases the buffer pool by requesting zero buffers
///
/// All mappings must be gone by then, drivers refuse to free mapped buffers.
pub fn free_buffers<D: Driver + ?Sized>(dev: &D) -> Result<()> {
    reqbufs(dev, 0).map(|_| ())
}

fn reqbufs<D: Driver + ?Sized>(dev: &D, count: u32) -> Result<u32> {
    let mut v4l2_reqbufs: v4l2_requestbuffers = unsafe { mem::zeroed() };
    v4l2_reqbufs.type_ = Type::VideoCapture as u32;
    v4l2_reqbufs.memory = Memory::Mmap as u32;
    v4l2_reqbufs.count = count;
    unsafe { xioctl(dev, vidioc::VIDIOC_REQBUFS, &mut v4l2_reqbufs)? };

    Ok(v4l2_reqbufs.count)
}

/// Queries length and mapping offset of a buffer slot
///
/// The descriptor always targets a memory-mapped video capture buffer.
///
/// # Arguments
///
/// * `index` - Slot within the pool, 0 for a single-buffer pool
pub fn query_buffer<D: Driver + ?Sized>(dev: &D, index: u32) -> Result<Descriptor> {
    let mut buf = Descriptor::new(index);
    unsafe { xioctl(dev, vidioc::VIDIOC_QUERYBUF, buf.as_raw_mut())? };

    Ok(buf)
}

/// Maps a buffer slot into process memory
///
/// The mapping is shared and read/write, spans `buf.length()` bytes at `buf.offset()`, and is
/// zero-filled before it is returned.
pub fn map_buffer<'a, D: Driver + ?Sized>(dev: &'a D, buf: &Descriptor) -> Result<Mapping<'a, D>> {
    let len = buf.length() as usize;
    if len == 0 {
        return Err(Error::Map(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "buffer has zero length",
        )));
    }

    let ptr = unsafe { dev.mmap(len, buf.offset() as libc::off_t) }.map_err(Error::Map)?;
    let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| {
        Error::Map(std::io::Error::new(
            std::io::ErrorKind::Other,
            "mmap returned a null address",
        ))
    })?;

    let mut mapping = unsafe { Mapping::from_raw(dev, ptr, len) };
    mapping.fill(0);
    log::trace!(
        "mapped buffer {} ({} bytes at offset {:#x})",
        buf.index(),
        len,
        buf.offset()
    );

    Ok(mapping)
}

/// Releases a mapping created by [`map_buffer`]
///
/// `length` is checked against the length the mapping was created with. The mapping is
/// consumed either way: a different value never reaches the kernel, the region is released
/// with its recorded length and the mismatch is then reported as [`Error::UnmapLength`].
pub fn unmap_buffer<D: Driver + ?Sized>(mapping: Mapping<'_, D>, length: usize) -> Result<()> {
    let expected = mapping.len();
    if expected == length {
        return mapping.unmap();
    }

    if let Err(e) = mapping.unmap() {
        log::warn!("failed to unmap {} bytes: {}", expected, e);
    }
    Err(Error::UnmapLength {
        expected,
        actual: length,
    })
}

/// Hands a buffer to the driver's incoming queue
pub fn queue_buffer<D: Driver + ?Sized>(dev: &D, buf: &mut Descriptor) -> Result<()> {
    unsafe { xioctl(dev, vidioc::VIDIOC_QBUF, buf.as_raw_mut())? };
    log::trace!("queued buffer {}", buf.index());
    Ok(())
}

/// Takes a filled buffer from the driver's outgoing queue
///
/// Blocks until a frame is ready unless the device was opened non-blocking. The driver
/// overwrites index, bytes used, flags, sequence and timestamp of `buf`.
pub fn dequeue_buffer<D: Driver + ?Sized>(dev: &D, buf: &mut Descriptor) -> Result<()> {
    unsafe { xioctl(dev, vidioc::VIDIOC_DQBUF, buf.as_raw_mut())? };
    log::trace!(
        "dequeued buffer {} (sequence {}, {} bytes)",
        buf.index(),
        buf.sequence(),
        buf.bytes_used()
    );
    Ok(())
}

/// Starts streaming video capture buffers
pub fn stream_on<D: Driver + ?Sized>(dev: &D) -> Result<()> {
    let mut typ = Type::VideoCapture as u32;
    unsafe { xioctl(dev, vidioc::VIDIOC_STREAMON, &mut typ) }
}

/// Stops streaming, all queued buffers are returned to userspace
pub fn stream_off<D: Driver + ?Sized>(dev: &D) -> Result<()> {
    let mut typ = Type::VideoCapture as u32;
    unsafe { xioctl(dev, vidioc::VIDIOC_STREAMOFF, &mut typ) }
}
