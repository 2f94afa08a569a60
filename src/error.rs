use std::{error, fmt, io};

use crate::format::FourCC;

/// Error type for device control operations
#[derive(Debug)]
pub enum Error {
    /// I/O error outside of a control call (open, close, munmap)
    Io(io::Error),

    /// A control call was rejected by the driver
    Ioctl {
        /// Name of the request, e.g. `VIDIOC_QBUF`
        call: &'static str,
        source: io::Error,
    },

    /// The buffer could not be mapped into process memory
    Map(io::Error),

    /// A mapping was released with a length different from the one it was created with
    ///
    /// Reported after the fact: the region was unmapped with its recorded length.
    UnmapLength { expected: usize, actual: usize },

    /// An enumeration cursor was advanced after it reported the end of its sequence
    CursorExhausted,

    /// The driver reported a frame size type this crate does not know
    UnknownFrameSizeType(u32),

    /// The driver granted no buffers
    NoBuffers,

    /// The driver returned a buffer index that was never requested
    BufferIndex(u32),

    /// The device cannot capture video
    NotCapture(String),

    /// The device cannot stream frames
    NotStreaming(String),

    /// The device reports no pixel formats
    NoFormats,

    /// The pixel format has no discrete frame sizes
    NoFrameSizes(FourCC),
}

impl Error {
    /// Returns the OS error code if the error originated in a system call
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(err) | Error::Map(err) => err.raw_os_error(),
            Error::Ioctl { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Ioctl { call, source } => write!(f, "{} failed: {}", call, source),
            Error::Map(err) => write!(f, "failed to map buffer: {}", err),
            Error::UnmapLength { expected, actual } => write!(
                f,
                "mapping is {} bytes long, not {}; released with the recorded length",
                expected, actual
            ),
            Error::CursorExhausted => write!(f, "enumeration already reached its end"),
            Error::UnknownFrameSizeType(typ) => write!(f, "unknown frame size type: {}", typ),
            Error::NoBuffers => write!(f, "driver granted no buffers"),
            Error::BufferIndex(index) => write!(f, "driver returned unknown buffer {}", index),
            Error::NotCapture(card) => write!(f, "device {} is not a video capture device", card),
            Error::NotStreaming(card) => write!(f, "device {} is not able to stream frames", card),
            Error::NoFormats => write!(f, "device reports no pixel formats"),
            Error::NoFrameSizes(fourcc) => {
                write!(f, "pixel format {} has no discrete frame sizes", fourcc)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) | Error::Map(err) => Some(err),
            Error::Ioctl { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
