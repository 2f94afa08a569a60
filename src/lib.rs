//! Thin control surface for video4linux capture devices
//!
//! The [`capture`] module wraps the kernel calls a program needs to grab frames from a webcam:
//! capability and format queries, format negotiation, buffer pool management, memory mapping
//! and streaming. [`Camera`] and [`capture::Session`] combine them into the usual sequence.
//!
//! ```no_run
//! use webcam_v4l::Camera;
//! use webcam_v4l::capture::Config;
//! use webcam_v4l::format::FourCC;
//!
//! let camera = Camera::open("/dev/video0").unwrap();
//! let mut session = camera.session(&Config::new(FourCC::MJPG, 1280, 720)).unwrap();
//! let frame = session.next_frame().unwrap();
//! println!("frame {}: {} bytes", frame.meta().sequence, frame.len());
//! ```

#[cfg(feature = "v4l-sys")]
pub use v4l_sys;

#[cfg(feature = "v4l2-sys")]
pub use v4l2_sys as v4l_sys;

pub mod v4l2;

pub mod buffer;
pub mod capability;
pub mod capture;
pub mod device;
pub mod error;
pub mod format;
pub mod framesize;
pub mod memory;

mod camera;
pub use camera::Camera;

mod selector;
pub use selector::{Selection, Selector};

mod snapshot;
pub use snapshot::Snapshot;

mod timestamp;
pub use timestamp::Timestamp;

pub use capability::Capabilities;
pub use device::{cameras, DeviceList, Driver, Handle};
pub use error::{Error, Result};
pub use format::{Format, FourCC};

#[cfg(test)]
mod mock;

/// Converts a fixed-size, NUL padded string field filled in by the driver
pub(crate) fn cstr(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}
