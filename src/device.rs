use std::os::raw::{c_int, c_void};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::{fs, io, ptr};

use crate::camera::Camera;
use crate::v4l2;
use crate::v4l2::vidioc;

/// Kernel side of an open device
///
/// Every control operation in this crate is generic over this trait. [`Handle`] forwards to the
/// real system calls; tests substitute a scripted driver.
pub trait Driver {
    /// Issues a control call, see [`v4l2::ioctl`].
    ///
    /// # Safety
    ///
    /// `argp` must point to a live value of the type encoded in `request`.
    unsafe fn ioctl(&self, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()>;

    /// Maps `length` bytes of device memory at `offset` shared and read/write.
    ///
    /// # Safety
    ///
    /// The returned region must eventually be passed to [`Driver::munmap`] with the same length.
    unsafe fn mmap(&self, length: usize, offset: libc::off_t) -> io::Result<*mut c_void>;

    /// Releases a region returned by [`Driver::mmap`].
    ///
    /// # Safety
    ///
    /// `start` and `length` must describe a live mapping created by this driver.
    unsafe fn munmap(&self, start: *mut c_void, length: usize) -> io::Result<()>;
}

impl<D: Driver + ?Sized> Driver for &D {
    unsafe fn ioctl(&self, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()> {
        (**self).ioctl(request, argp)
    }

    unsafe fn mmap(&self, length: usize, offset: libc::off_t) -> io::Result<*mut c_void> {
        (**self).mmap(length, offset)
    }

    unsafe fn munmap(&self, start: *mut c_void, length: usize) -> io::Result<()> {
        (**self).munmap(start, length)
    }
}

/// Owned file descriptor of a video4linux device node
///
/// The descriptor is closed when the handle is dropped.
#[derive(Debug)]
pub struct Handle {
    fd: c_int,
}

impl Handle {
    /// Opens a device node by index
    ///
    /// # Arguments
    ///
    /// * `index` - Index (0: first, 1: second, ..)
    ///
    /// # Example
    ///
    /// ```
    /// use webcam_v4l::device::Handle;
    /// let handle = Handle::new(0);
    /// ```
    pub fn new(index: usize) -> io::Result<Self> {
        Self::with_path(format!("/dev/video{}", index))
    }

    /// Opens a device node by path, read/write
    ///
    /// # Example
    ///
    /// ```
    /// use webcam_v4l::device::Handle;
    /// let handle = Handle::with_path("/dev/video0");
    /// ```
    pub fn with_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let fd = v4l2::open(&path, libc::O_RDWR)?;
        log::debug!("opened {} as fd {}", path.as_ref().display(), fd);
        Ok(Handle { fd })
    }

    /// Returns the raw fd of the device
    pub fn fd(&self) -> c_int {
        self.fd
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            log::warn!("failed to close fd {}: {}", self.fd, e);
        }
    }
}

impl AsRawFd for Handle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl FromRawFd for Handle {
    /// Takes ownership of a descriptor opened elsewhere.
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Handle { fd }
    }
}

impl IntoRawFd for Handle {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }
}

impl Driver for Handle {
    unsafe fn ioctl(&self, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()> {
        v4l2::ioctl(self.fd, request, argp)
    }

    unsafe fn mmap(&self, length: usize, offset: libc::off_t) -> io::Result<*mut c_void> {
        v4l2::mmap(
            ptr::null_mut(),
            length,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            self.fd,
            offset,
        )
    }

    unsafe fn munmap(&self, start: *mut c_void, length: usize) -> io::Result<()> {
        v4l2::munmap(start, length)
    }
}

/// Represents an iterable list of potential device nodes
#[derive(Debug, Default)]
pub struct DeviceList {
    /// Position in the list
    pos: usize,
    /// All paths representing potential video4linux devices
    paths: Vec<PathBuf>,
}

impl DeviceList {
    /// Returns the `/dev/video*` nodes currently known to the system, sorted by path
    ///
    /// # Example
    ///
    /// ```
    /// use webcam_v4l::device::DeviceList;
    /// for path in DeviceList::new() {
    ///     println!("{}", path.display());
    /// }
    /// ```
    pub fn new() -> Self {
        Self::in_dir("/dev")
    }

    /// Returns the `video*` nodes found in `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let mut paths = Vec::new();

        match fs::read_dir(dir.as_ref()) {
            Ok(nodes) => {
                for node in nodes.flatten() {
                    if node.file_name().to_string_lossy().starts_with("video") {
                        paths.push(node.path());
                    }
                }
            }
            Err(e) => log::warn!("cannot list {}: {}", dir.as_ref().display(), e),
        }

        paths.sort();
        DeviceList { pos: 0, paths }
    }
}

impl Iterator for DeviceList {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let path = self.paths.get(self.pos)?.clone();
        self.pos += 1;
        Some(path)
    }
}

/// Returns the device nodes that open as streaming video capture devices
///
/// Nodes that fail to open or lack the required capabilities are skipped.
pub fn cameras() -> Vec<PathBuf> {
    DeviceList::new()
        .filter(|path| match Camera::open(path) {
            Ok(camera) => {
                log::debug!("{} is a camera: {}", path.display(), camera.name());
                true
            }
            Err(e) => {
                log::debug!("{} is not a camera: {}", path.display(), e);
                false
            }
        })
        .collect()
}
