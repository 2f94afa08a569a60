use std::ffi::CString;
use std::os::raw::{c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::{io, path::Path};

pub mod vidioc;

#[cfg(feature = "v4l-sys")]
mod detail {
    use std::os::raw::{c_char, c_int, c_void};

    use crate::v4l2::vidioc;
    use crate::v4l_sys::*;

    pub unsafe fn open(path: *const c_char, flags: i32) -> c_int {
        v4l2_open(path, flags)
    }
    pub unsafe fn close(fd: c_int) -> c_int {
        v4l2_close(fd)
    }
    pub unsafe fn ioctl(fd: c_int, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> c_int {
        // libv4l expects `request` to be a u64, which is not what every platform uses
        v4l2_ioctl(fd, request as _, argp)
    }
    pub unsafe fn mmap(
        start: *mut c_void,
        length: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: libc::off_t,
    ) -> *mut c_void {
        v4l2_mmap(start, length as _, prot, flags, fd, offset as i64)
    }
    pub unsafe fn munmap(start: *mut c_void, length: usize) -> c_int {
        v4l2_munmap(start, length as _)
    }
}

#[cfg(feature = "v4l2-sys")]
mod detail {
    use std::os::raw::{c_char, c_int, c_void};

    use crate::v4l2::vidioc;

    pub unsafe fn open(path: *const c_char, flags: i32) -> c_int {
        libc::open(path, flags)
    }
    pub unsafe fn close(fd: c_int) -> c_int {
        libc::close(fd)
    }
    pub unsafe fn ioctl(fd: c_int, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> c_int {
        /*
         * libc declares ioctl() with different request types on different
         * platforms (glibc vs. musl). syscall() takes the request as a plain
         * variadic argument, so it sidesteps the mismatch entirely.
         */
        libc::syscall(libc::SYS_ioctl, fd, request, argp) as c_int
    }
    pub unsafe fn mmap(
        start: *mut c_void,
        length: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: libc::off_t,
    ) -> *mut c_void {
        libc::mmap(start, length, prot, flags, fd, offset)
    }
    pub unsafe fn munmap(start: *mut c_void, length: usize) -> c_int {
        libc::munmap(start, length)
    }
}

/// Opens a device node.
///
/// Returns the file descriptor on success.
/// The OS error is captured right after the call, so nothing in between can clobber errno.
///
/// # Arguments
///
/// * `path` - Path to the device node
/// * `flags` - Open flags
///
/// # Example
///
/// ```
/// use webcam_v4l::v4l2;
///
/// let fd = v4l2::open("/dev/video0", libc::O_RDWR);
/// ```
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<c_int> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let fd = unsafe { detail::open(c_path.as_ptr(), flags) };
    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// Closes a file descriptor obtained by [`open`].
///
/// # Example
///
/// ```
/// use webcam_v4l::v4l2;
///
/// if let Ok(fd) = v4l2::open("/dev/video0", libc::O_RDWR) {
///     v4l2::close(fd).unwrap();
/// }
/// ```
pub fn close(fd: c_int) -> io::Result<()> {
    let ret = unsafe { detail::close(fd) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Issues a control call on a device.
///
/// The error, if any, is taken from errno immediately after the call returned.
///
/// # Arguments
///
/// * `fd` - File descriptor
/// * `request` - IO control code (see [`vidioc`])
/// * `argp` - Pointer to memory region holding the argument type
///
/// # Safety
///
/// `argp` must point to a live value of the type encoded in `request`.
///
/// # Example
///
/// ```
/// use std::mem;
///
/// use webcam_v4l::v4l_sys::*;
/// use webcam_v4l::v4l2;
///
/// if let Ok(fd) = v4l2::open("/dev/video0", libc::O_RDWR) {
///     let mut v4l2_caps: v4l2_capability = unsafe { mem::zeroed() };
///     unsafe {
///         let _ = v4l2::ioctl(
///             fd,
///             v4l2::vidioc::VIDIOC_QUERYCAP,
///             &mut v4l2_caps as *mut _ as *mut std::os::raw::c_void,
///         );
///     }
///     v4l2::close(fd).unwrap();
/// }
/// ```
pub unsafe fn ioctl(fd: c_int, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()> {
    let ret = detail::ioctl(fd, request, argp);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Maps device memory into the address space of the process.
///
/// # Arguments
///
/// * `start` - Starting address of the new mapping, usually NULL
/// * `length` - Length of the mapped region
/// * `prot` - Desired memory protection of the mapped region
/// * `flags` - Mapping flags
/// * `fd` - File descriptor representing an opened device
/// * `offset` - Offset as reported by the driver for the buffer
///
/// # Safety
///
/// `start` is handed to the kernel as-is.
pub unsafe fn mmap(
    start: *mut c_void,
    length: usize,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: libc::off_t,
) -> io::Result<*mut c_void> {
    let ret = detail::mmap(start, length, prot, flags, fd, offset);
    if ret == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Releases a mapping established by [`mmap`].
///
/// # Safety
///
/// `start` and `length` must describe a live mapping. Nothing may access the region afterwards.
pub unsafe fn munmap(start: *mut c_void, length: usize) -> io::Result<()> {
    let ret = detail::munmap(start, length);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
