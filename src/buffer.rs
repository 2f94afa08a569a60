use bitflags::bitflags;
use std::{fmt, mem};

use crate::memory::Memory;
use crate::timestamp::Timestamp;
use crate::v4l_sys::*;

/// Buffer type
///
/// Specific types of devices require buffers of corresponding types.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    VideoCapture        = 1,
    VideoOutput         = 2,
    VideoOverlay        = 3,
    VbiCapture          = 4,
    VbiOutput           = 5,
    SlicedVbiCapture    = 6,
    SlicedVbiOutput     = 7,
    VideoOutputOverlay  = 8,
    VideoCaptureMplane  = 9,
    VideoOutputMplane   = 10,
    SdrCapture          = 11,
    SdrOutput           = 12,
    MetaCapture         = 13,
    MetaOutput          = 14,
}

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x00000001;
        /// Buffer is queued for processing
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Image is a keyframe (I-frame)
        const KEYFRAME              = 0x00000008;
        /// Image is a P-frame
        const PFRAME                = 0x00000010;
        /// Image is a B-frame
        const BFRAME                = 0x00000020;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
        /// Buffer is added to an unqueued request
        const IN_REQUEST            = 0x00000080;
        /// Timecode field is valid
        const TIMECODE              = 0x00000100;
        /// Buffer is prepared for queuing
        const PREPARED              = 0x00000400;
        const NO_CACHE_INVALIDATE   = 0x00000800;
        const NO_CACHE_CLEAN        = 0x00001000;
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
        const TSTAMP_SRC_SOE        = 0x00010000;
        /// mem2mem encoder/decoder
        const LAST                  = 0x00100000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Flags {
        Flags::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Number of bytes occupied by the data in the buffer
    pub bytesused: u32,
    /// Buffer flags
    pub flags: Flags,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Sequence number, counting the frames
    pub sequence: u32,
}

/// Kernel buffer slot descriptor
///
/// Wraps a `v4l2_buffer`. The same descriptor is meant to be reused across queue/dequeue
/// calls: the driver fills in bytes used, flags, sequence and timestamp on dequeue.
#[derive(Clone, Copy)]
pub struct Descriptor {
    raw: v4l2_buffer,
}

impl Descriptor {
    /// Returns a zeroed descriptor for a memory-mapped video capture buffer
    ///
    /// No driver interaction takes place, use [`crate::capture::query_buffer`] to learn the
    /// length and offset of a slot.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the buffer slot within the requested pool
    ///
    /// # Example
    ///
    /// ```
    /// use webcam_v4l::buffer::Descriptor;
    /// let buf = Descriptor::new(0);
    /// assert_eq!(buf.index(), 0);
    /// ```
    pub fn new(index: u32) -> Self {
        let mut raw: v4l2_buffer = unsafe { mem::zeroed() };
        raw.index = index;
        raw.type_ = Type::VideoCapture as u32;
        raw.memory = Memory::Mmap as u32;

        Descriptor { raw }
    }

    pub fn index(&self) -> u32 {
        self.raw.index
    }

    /// Buffer type as a raw `v4l2_buf_type`
    pub fn typ(&self) -> u32 {
        self.raw.type_
    }

    /// Memory mode as a raw `v4l2_memory`
    pub fn memory(&self) -> u32 {
        self.raw.memory
    }

    /// Size of the buffer slot in bytes (not the payload)
    pub fn length(&self) -> u32 {
        self.raw.length
    }

    /// Offset to pass to mmap for this slot
    pub fn offset(&self) -> u32 {
        // the memory mode is fixed to mmap, so the offset member of the union is the live one
        unsafe { self.raw.m.offset }
    }

    pub fn bytes_used(&self) -> u32 {
        self.raw.bytesused
    }

    pub fn sequence(&self) -> u32 {
        self.raw.sequence
    }

    pub fn flags(&self) -> Flags {
        Flags::from(self.raw.flags)
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from(self.raw.timestamp)
    }

    /// Metadata filled in by the driver on dequeue
    pub fn metadata(&self) -> Metadata {
        Metadata {
            bytesused: self.bytes_used(),
            flags: self.flags(),
            timestamp: self.timestamp(),
            sequence: self.sequence(),
        }
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut v4l2_buffer {
        &mut self.raw
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor::new(0)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("index", &self.index())
            .field("type", &self.typ())
            .field("memory", &self.memory())
            .field("length", &self.length())
            .field("offset", &self.offset())
            .field("bytesused", &self.bytes_used())
            .field("flags", &self.flags())
            .field("sequence", &self.sequence())
            .finish()
    }
}
