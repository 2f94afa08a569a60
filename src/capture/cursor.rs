use std::convert::TryFrom;
use std::mem;

use crate::buffer::Type;
use crate::capture::xioctl;
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::{Description, FourCC};
use crate::framesize::FrameSize;
use crate::v4l2::vidioc;
use crate::v4l_sys::*;

/// Position of an enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing queried yet, the next call asks for index 0
    Fresh,
    /// The entry at this index was the last one returned
    At(u32),
    /// The driver reported the end of the sequence
    Done,
    /// The end was reported to the caller
    Exhausted,
}

impl State {
    fn next_index(self) -> Result<u32> {
        match self {
            State::Fresh => Ok(0),
            State::At(index) => index.checked_add(1).ok_or(Error::CursorExhausted),
            State::Done | State::Exhausted => Err(Error::CursorExhausted),
        }
    }
}

/// Cursor over the pixel formats a device supports for video capture
///
/// Each [`Formats::advance`] issues one `VIDIOC_ENUM_FMT` with the next index: 0, 1, 2, and so
/// on, never skipping or repeating one. The sequence ends when the driver answers `EINVAL`;
/// that call returns `Ok(None)`. Advancing again afterwards is an error
/// ([`Error::CursorExhausted`]), start over with a new cursor instead. Any other driver error
/// is returned as-is and also ends the enumeration.
///
/// # Example
///
/// ```
/// use webcam_v4l::capture::Formats;
/// use webcam_v4l::device::Handle;
///
/// if let Ok(dev) = Handle::new(0) {
///     for desc in Formats::new(&dev).flatten() {
///         print!("{}", desc);
///     }
/// }
/// ```
pub struct Formats<'a, D: Driver + ?Sized> {
    dev: &'a D,
    state: State,
}

impl<'a, D: Driver + ?Sized> Formats<'a, D> {
    /// Starts a fresh enumeration at index 0
    pub fn new(dev: &'a D) -> Self {
        Formats {
            dev,
            state: State::Fresh,
        }
    }

    /// Index of the entry most recently returned
    pub fn index(&self) -> Option<u32> {
        match self.state {
            State::At(index) => Some(index),
            _ => None,
        }
    }

    /// Queries the next format
    pub fn advance(&mut self) -> Result<Option<Description>> {
        if self.state == State::Done {
            self.state = State::Exhausted;
            return Ok(None);
        }
        let index = self.state.next_index()?;

        let mut v4l2_fmt: v4l2_fmtdesc = unsafe { mem::zeroed() };
        v4l2_fmt.index = index;
        v4l2_fmt.type_ = Type::VideoCapture as u32;

        match unsafe { xioctl(self.dev, vidioc::VIDIOC_ENUM_FMT, &mut v4l2_fmt) } {
            Ok(()) => {
                self.state = State::At(index);
                Ok(Some(Description::from(v4l2_fmt)))
            }
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
                self.state = State::Exhausted;
                Ok(None)
            }
            Err(e) => {
                self.state = State::Done;
                Err(e)
            }
        }
    }
}

impl<D: Driver + ?Sized> Iterator for Formats<'_, D> {
    type Item = Result<Description>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Exhausted {
            return None;
        }
        self.advance().transpose()
    }
}

/// Cursor over the frame sizes a device supports for one pixel format
///
/// Works like [`Formats`] with `VIDIOC_ENUM_FRAMESIZES`, except that any failed call ends the
/// sequence. Errors other than `EINVAL` are logged.
///
/// # Example
///
/// ```
/// use webcam_v4l::capture::FrameSizes;
/// use webcam_v4l::device::Handle;
/// use webcam_v4l::format::FourCC;
///
/// if let Ok(dev) = Handle::new(0) {
///     for size in FrameSizes::new(&dev, FourCC::MJPG).flatten() {
///         println!("{}", size);
///     }
/// }
/// ```
pub struct FrameSizes<'a, D: Driver + ?Sized> {
    dev: &'a D,
    fourcc: FourCC,
    state: State,
}

impl<'a, D: Driver + ?Sized> FrameSizes<'a, D> {
    /// Starts a fresh enumeration at index 0 for `fourcc`
    pub fn new(dev: &'a D, fourcc: FourCC) -> Self {
        FrameSizes {
            dev,
            fourcc,
            state: State::Fresh,
        }
    }

    /// Index of the entry most recently returned
    pub fn index(&self) -> Option<u32> {
        match self.state {
            State::At(index) => Some(index),
            _ => None,
        }
    }

    /// Pixel format the sizes are enumerated for
    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    /// Queries the next frame size
    ///
    /// A size type unknown to this crate is reported as [`Error::UnknownFrameSizeType`]; the
    /// enumeration carries on with the next index afterwards.
    pub fn advance(&mut self) -> Result<Option<FrameSize>> {
        let index = self.state.next_index()?;

        let mut v4l2_struct: v4l2_frmsizeenum = unsafe { mem::zeroed() };
        v4l2_struct.index = index;
        v4l2_struct.pixel_format = self.fourcc.into();

        match unsafe { xioctl(self.dev, vidioc::VIDIOC_ENUM_FRAMESIZES, &mut v4l2_struct) } {
            Ok(()) => {
                self.state = State::At(index);
                FrameSize::try_from(v4l2_struct).map(Some)
            }
            Err(e) => {
                if e.raw_os_error() != Some(libc::EINVAL) {
                    log::warn!(
                        "frame size enumeration for {} stopped at index {}: {}",
                        self.fourcc,
                        index,
                        e
                    );
                }
                self.state = State::Exhausted;
                Ok(None)
            }
        }
    }
}

impl<D: Driver + ?Sized> Iterator for FrameSizes<'_, D> {
    type Item = Result<FrameSize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Exhausted {
            return None;
        }
        self.advance().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framesize::{Discrete, FrameSizeEnum};
    use crate::mock::{Call, MockDriver};

    #[test]
    fn formats_walk_indices_in_order() {
        let dev = MockDriver::webcam();
        let mut cursor = Formats::new(&dev);
        assert_eq!(cursor.index(), None);

        let mut seen = Vec::new();
        while let Some(desc) = cursor.advance().unwrap() {
            assert_eq!(cursor.index(), Some(desc.index));
            seen.push((desc.index, desc.fourcc));
        }
        assert_eq!(seen, vec![(0, FourCC::YUYV), (1, FourCC::MJPG)]);

        let queried: Vec<u32> = dev
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::EnumFmt { index } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(queried, vec![0, 1, 2]);
    }

    #[test]
    fn formats_end_is_reported_once() {
        let dev = MockDriver::webcam();
        let mut cursor = Formats::new(&dev);
        while cursor.advance().unwrap().is_some() {}

        assert!(matches!(cursor.advance(), Err(Error::CursorExhausted)));
        assert!(matches!(cursor.advance(), Err(Error::CursorExhausted)));
        // no further driver calls once exhausted
        assert_eq!(dev.calls().len(), 3);
    }

    #[test]
    fn formats_iterator_is_fused() {
        let dev = MockDriver::webcam();
        let mut cursor = Formats::new(&dev);
        let descs: Vec<_> = cursor.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(descs.len(), 2);
        assert!(cursor.next().is_none());
    }

    #[test]
    fn formats_surface_other_errors() {
        let dev = MockDriver::webcam();
        dev.fail(vidioc::VIDIOC_ENUM_FMT, libc::EIO);

        let mut cursor = Formats::new(&dev);
        match cursor.advance() {
            Err(Error::Ioctl { call, source }) => {
                assert_eq!(call, "VIDIOC_ENUM_FMT");
                assert_eq!(source.raw_os_error(), Some(libc::EIO));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(matches!(cursor.advance(), Ok(None)));
        assert!(matches!(cursor.advance(), Err(Error::CursorExhausted)));
    }

    #[test]
    fn empty_device_ends_immediately() {
        let dev = MockDriver::webcam().without_formats();
        let mut cursor = Formats::new(&dev);
        assert!(cursor.advance().unwrap().is_none());
        assert_eq!(cursor.index(), None);
    }

    #[test]
    fn last_index_does_not_wrap() {
        assert!(matches!(
            State::At(u32::MAX).next_index(),
            Err(Error::CursorExhausted)
        ));

        let dev = MockDriver::webcam();
        let mut cursor = Formats {
            dev: &dev,
            state: State::At(u32::MAX),
        };
        assert!(matches!(cursor.advance(), Err(Error::CursorExhausted)));
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn frame_sizes_walk_indices_in_order() {
        let dev = MockDriver::webcam();
        let sizes: Vec<_> = FrameSizes::new(&dev, FourCC::MJPG)
            .collect::<Result<_>>()
            .unwrap();

        let indices: Vec<u32> = sizes.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(sizes.iter().all(|s| s.fourcc == FourCC::MJPG));
        assert_eq!(
            sizes[0].size,
            FrameSizeEnum::Discrete(Discrete {
                width: 1280,
                height: 720
            })
        );
    }

    #[test]
    fn frame_sizes_end_on_any_error() {
        let dev = MockDriver::webcam();
        dev.fail(vidioc::VIDIOC_ENUM_FRAMESIZES, libc::EIO);

        let mut cursor = FrameSizes::new(&dev, FourCC::MJPG);
        assert!(matches!(cursor.advance(), Ok(None)));
        assert!(matches!(cursor.advance(), Err(Error::CursorExhausted)));
    }

    #[test]
    fn frame_sizes_of_unknown_format_are_empty() {
        let dev = MockDriver::webcam();
        assert_eq!(FrameSizes::new(&dev, FourCC::new(b"H264")).count(), 0);
    }
}
