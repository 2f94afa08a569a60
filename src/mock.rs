//! Scripted driver for testing without hardware.
//!
//! Answers control calls from fixture data the way a single-planar capture driver would,
//! backs mappings with heap memory and records every call.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::os::raw::c_void;
use std::{io, mem, slice};

use crate::buffer::{self, Type};
use crate::capability::Flags;
use crate::device::Driver;
use crate::format::FourCC;
use crate::framesize::{Discrete, FrameSizeEnum, Stepwise};
use crate::memory::Memory;
use crate::v4l2::vidioc;
use crate::v4l_sys::*;

/// Distance between the mmap offsets of two consecutive buffers
const OFFSET_STRIDE: u32 = 0x10000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    QueryCap,
    EnumFmt { index: u32 },
    EnumFrameSizes { index: u32 },
    GFmt,
    SFmt,
    ReqBufs { count: u32 },
    QueryBuf { index: u32, typ: u32, memory: u32 },
    QBuf { index: u32 },
    DqBuf { index: u32 },
    StreamOn,
    StreamOff,
    Mmap { offset: u32, len: usize },
    Munmap { len: usize },
    Other,
}

struct State {
    calls: Vec<Call>,
    failures: HashMap<vidioc::_IOC_TYPE, i32>,
    mmap_failure: Option<i32>,
    format: v4l2_pix_format,
    granted: u32,
    /// start address -> (offset, length)
    mappings: HashMap<usize, (u32, usize)>,
    queued: VecDeque<u32>,
    streaming: bool,
    sequence: u32,
}

pub struct MockDriver {
    capabilities: Flags,
    formats: Vec<(FourCC, Vec<FrameSizeEnum>)>,
    max_buffers: u32,
    buffer_len: usize,
    state: RefCell<State>,
}

fn discrete(width: u32, height: u32) -> FrameSizeEnum {
    FrameSizeEnum::Discrete(Discrete { width, height })
}

fn os_error(errno: i32) -> io::Error {
    io::Error::from_raw_os_error(errno)
}

impl MockDriver {
    /// A USB webcam offering YUYV and MJPG
    pub fn webcam() -> Self {
        let formats = vec![
            (FourCC::YUYV, vec![discrete(1280, 720), discrete(640, 480)]),
            (
                FourCC::MJPG,
                vec![
                    discrete(1280, 720),
                    discrete(640, 480),
                    FrameSizeEnum::Stepwise(Stepwise {
                        min_width: 160,
                        max_width: 320,
                        step_width: 160,
                        min_height: 120,
                        max_height: 240,
                        step_height: 120,
                    }),
                ],
            ),
        ];

        MockDriver {
            capabilities: Flags::VIDEO_CAPTURE | Flags::STREAMING,
            formats: Vec::new(),
            max_buffers: 4,
            buffer_len: 4096,
            state: RefCell::new(State {
                calls: Vec::new(),
                failures: HashMap::new(),
                mmap_failure: None,
                format: unsafe { mem::zeroed() },
                granted: 0,
                mappings: HashMap::new(),
                queued: VecDeque::new(),
                streaming: false,
                sequence: 0,
            }),
        }
        .with_formats(formats)
    }

    pub fn with_formats(mut self, formats: Vec<(FourCC, Vec<FrameSizeEnum>)>) -> Self {
        self.formats = formats;
        let initial = self.pick_format(FourCC::default(), 0, 0);
        self.state.get_mut().format = initial.unwrap_or(unsafe { mem::zeroed() });
        self
    }

    pub fn without_formats(self) -> Self {
        self.with_formats(Vec::new())
    }

    pub fn capabilities(mut self, flags: Flags) -> Self {
        self.capabilities = flags;
        self
    }

    pub fn max_buffers(mut self, count: u32) -> Self {
        self.max_buffers = count;
        self
    }

    /// Fails the next call of `request` with `errno`
    pub fn fail(&self, request: vidioc::_IOC_TYPE, errno: i32) {
        self.state.borrow_mut().failures.insert(request, errno);
    }

    /// Fails the next mmap with `errno`
    pub fn fail_mmap(&self, errno: i32) {
        self.state.borrow_mut().mmap_failure = Some(errno);
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn live_mappings(&self) -> usize {
        self.state.borrow().mappings.len()
    }

    pub fn streaming(&self) -> bool {
        self.state.borrow().streaming
    }

    /// Frame data the driver writes for a given sequence number
    pub fn frame_pattern(&self, sequence: u32) -> Vec<u8> {
        (0..self.buffer_len * 3 / 4)
            .map(|i| ((i + sequence as usize * 7) % 251 + 1) as u8)
            .collect()
    }

    fn pick_format(&self, fourcc: FourCC, width: u32, height: u32) -> Option<v4l2_pix_format> {
        let (fourcc, sizes) = self
            .formats
            .iter()
            .find(|(f, _)| *f == fourcc)
            .or_else(|| self.formats.first())?;

        let sizes: Vec<Discrete> = sizes
            .iter()
            .filter_map(|s| match s {
                FrameSizeEnum::Discrete(d) => Some(*d),
                FrameSizeEnum::Stepwise(_) => None,
            })
            .collect();
        let size = sizes
            .iter()
            .find(|d| d.width == width && d.height == height)
            .or_else(|| sizes.first())?;

        let mut pix: v4l2_pix_format = unsafe { mem::zeroed() };
        pix.width = size.width;
        pix.height = size.height;
        pix.pixelformat = (*fourcc).into();
        pix.bytesperline = size.width * 2;
        pix.sizeimage = size.width * size.height * 2;
        Some(pix)
    }

    unsafe fn record(&self, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> Call {
        match request {
            vidioc::VIDIOC_QUERYCAP => Call::QueryCap,
            vidioc::VIDIOC_ENUM_FMT => Call::EnumFmt {
                index: (*(argp as *const v4l2_fmtdesc)).index,
            },
            vidioc::VIDIOC_ENUM_FRAMESIZES => Call::EnumFrameSizes {
                index: (*(argp as *const v4l2_frmsizeenum)).index,
            },
            vidioc::VIDIOC_G_FMT => Call::GFmt,
            vidioc::VIDIOC_S_FMT => Call::SFmt,
            vidioc::VIDIOC_REQBUFS => Call::ReqBufs {
                count: (*(argp as *const v4l2_requestbuffers)).count,
            },
            vidioc::VIDIOC_QUERYBUF => {
                let buf = &*(argp as *const v4l2_buffer);
                Call::QueryBuf {
                    index: buf.index,
                    typ: buf.type_,
                    memory: buf.memory,
                }
            }
            vidioc::VIDIOC_QBUF => Call::QBuf {
                index: (*(argp as *const v4l2_buffer)).index,
            },
            // the index is only known once the driver picked a buffer, patched in below
            vidioc::VIDIOC_DQBUF => Call::DqBuf { index: u32::MAX },
            vidioc::VIDIOC_STREAMON => Call::StreamOn,
            vidioc::VIDIOC_STREAMOFF => Call::StreamOff,
            _ => Call::Other,
        }
    }

    unsafe fn dispatch(
        &self,
        state: &mut State,
        request: vidioc::_IOC_TYPE,
        argp: *mut c_void,
    ) -> io::Result<()> {
        let capture = Type::VideoCapture as u32;
        let mmap = Memory::Mmap as u32;

        match request {
            vidioc::VIDIOC_QUERYCAP => {
                let cap = &mut *(argp as *mut v4l2_capability);
                cap.driver[..4].copy_from_slice(b"mock");
                cap.card[..11].copy_from_slice(b"Mock Webcam");
                cap.bus_info[..13].copy_from_slice(b"platform:mock");
                cap.version = 0x0006_0100;
                cap.capabilities = (self.capabilities | Flags::DEVICE_CAPS).bits();
                cap.device_caps = self.capabilities.bits();
                Ok(())
            }
            vidioc::VIDIOC_ENUM_FMT => {
                let desc = &mut *(argp as *mut v4l2_fmtdesc);
                if desc.type_ != capture {
                    return Err(os_error(libc::EINVAL));
                }
                let (fourcc, _) = self
                    .formats
                    .get(desc.index as usize)
                    .ok_or_else(|| os_error(libc::EINVAL))?;
                desc.pixelformat = (*fourcc).into();
                desc.description[..4].copy_from_slice(&fourcc.repr);
                if *fourcc == FourCC::MJPG {
                    desc.flags = 0x0001;
                }
                Ok(())
            }
            vidioc::VIDIOC_ENUM_FRAMESIZES => {
                let size = &mut *(argp as *mut v4l2_frmsizeenum);
                let fourcc = FourCC::from(size.pixel_format);
                let entry = self
                    .formats
                    .iter()
                    .find(|(f, _)| *f == fourcc)
                    .and_then(|(_, sizes)| sizes.get(size.index as usize))
                    .ok_or_else(|| os_error(libc::EINVAL))?;
                match entry {
                    FrameSizeEnum::Discrete(d) => {
                        size.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE;
                        size.__bindgen_anon_1.discrete = v4l2_frmsize_discrete {
                            width: d.width,
                            height: d.height,
                        };
                    }
                    FrameSizeEnum::Stepwise(s) => {
                        size.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_STEPWISE;
                        size.__bindgen_anon_1.stepwise = v4l2_frmsize_stepwise {
                            min_width: s.min_width,
                            max_width: s.max_width,
                            step_width: s.step_width,
                            min_height: s.min_height,
                            max_height: s.max_height,
                            step_height: s.step_height,
                        };
                    }
                }
                Ok(())
            }
            vidioc::VIDIOC_G_FMT => {
                let fmt = &mut *(argp as *mut v4l2_format);
                if fmt.type_ != capture {
                    return Err(os_error(libc::EINVAL));
                }
                fmt.fmt.pix = state.format;
                Ok(())
            }
            vidioc::VIDIOC_S_FMT => {
                let fmt = &mut *(argp as *mut v4l2_format);
                if fmt.type_ != capture || state.granted > 0 {
                    return Err(os_error(if state.granted > 0 {
                        libc::EBUSY
                    } else {
                        libc::EINVAL
                    }));
                }
                let requested = fmt.fmt.pix;
                let pix = self
                    .pick_format(
                        FourCC::from(requested.pixelformat),
                        requested.width,
                        requested.height,
                    )
                    .ok_or_else(|| os_error(libc::EINVAL))?;
                state.format = pix;
                fmt.fmt.pix = pix;
                Ok(())
            }
            vidioc::VIDIOC_REQBUFS => {
                let req = &mut *(argp as *mut v4l2_requestbuffers);
                if req.type_ != capture || req.memory != mmap {
                    return Err(os_error(libc::EINVAL));
                }
                if state.streaming || !state.mappings.is_empty() {
                    return Err(os_error(libc::EBUSY));
                }
                state.granted = req.count.min(self.max_buffers);
                state.queued.clear();
                req.count = state.granted;
                Ok(())
            }
            vidioc::VIDIOC_QUERYBUF => {
                let buf = &mut *(argp as *mut v4l2_buffer);
                if buf.type_ != capture || buf.memory != mmap || buf.index >= state.granted {
                    return Err(os_error(libc::EINVAL));
                }
                buf.length = self.buffer_len as u32;
                buf.m.offset = buf.index * OFFSET_STRIDE;
                Ok(())
            }
            vidioc::VIDIOC_QBUF => {
                let buf = &mut *(argp as *mut v4l2_buffer);
                if buf.type_ != capture
                    || buf.memory != mmap
                    || buf.index >= state.granted
                    || state.queued.contains(&buf.index)
                {
                    return Err(os_error(libc::EINVAL));
                }
                state.queued.push_back(buf.index);
                Ok(())
            }
            vidioc::VIDIOC_DQBUF => {
                let buf = &mut *(argp as *mut v4l2_buffer);
                if buf.type_ != capture || buf.memory != mmap || !state.streaming {
                    return Err(os_error(libc::EINVAL));
                }
                let index = state
                    .queued
                    .pop_front()
                    .ok_or_else(|| os_error(libc::EAGAIN))?;

                let sequence = state.sequence;
                state.sequence += 1;
                let frame = self.frame_pattern(sequence);

                let offset = index * OFFSET_STRIDE;
                if let Some((&addr, &(_, len))) =
                    state.mappings.iter().find(|(_, (o, _))| *o == offset)
                {
                    let view = slice::from_raw_parts_mut(addr as *mut u8, len);
                    let n = len.min(frame.len());
                    view[..n].copy_from_slice(&frame[..n]);
                }

                buf.index = index;
                buf.length = self.buffer_len as u32;
                buf.m.offset = offset;
                buf.bytesused = frame.len() as u32;
                buf.sequence = sequence;
                buf.flags = (buffer::Flags::MAPPED | buffer::Flags::DONE).bits();
                buf.timestamp.tv_sec = sequence as _;
                buf.timestamp.tv_usec = 500 as _;

                if let Some(Call::DqBuf { index: recorded }) = state.calls.last_mut() {
                    *recorded = index;
                }
                Ok(())
            }
            vidioc::VIDIOC_STREAMON | vidioc::VIDIOC_STREAMOFF => {
                if *(argp as *const u32) != capture {
                    return Err(os_error(libc::EINVAL));
                }
                if request == vidioc::VIDIOC_STREAMON {
                    if state.granted == 0 {
                        return Err(os_error(libc::EINVAL));
                    }
                    state.streaming = true;
                } else {
                    state.streaming = false;
                    state.queued.clear();
                }
                Ok(())
            }
            _ => Err(os_error(libc::ENOTTY)),
        }
    }
}

impl Driver for MockDriver {
    unsafe fn ioctl(&self, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()> {
        let call = self.record(request, argp);
        let mut state = self.state.borrow_mut();
        state.calls.push(call);

        if let Some(errno) = state.failures.remove(&request) {
            return Err(os_error(errno));
        }

        self.dispatch(&mut state, request, argp)
    }

    unsafe fn mmap(&self, length: usize, offset: libc::off_t) -> io::Result<*mut c_void> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Mmap {
            offset: offset as u32,
            len: length,
        });

        if let Some(errno) = state.mmap_failure.take() {
            return Err(os_error(errno));
        }
        let index = offset as u32 / OFFSET_STRIDE;
        if offset as u32 % OFFSET_STRIDE != 0 || index >= state.granted || length > self.buffer_len
        {
            return Err(os_error(libc::EINVAL));
        }

        // stale contents, so callers can tell whether the mapping was cleared
        let region = vec![0xaa_u8; length].into_boxed_slice();
        let addr = Box::into_raw(region) as *mut u8 as usize;
        state.mappings.insert(addr, (offset as u32, length));

        Ok(addr as *mut c_void)
    }

    unsafe fn munmap(&self, start: *mut c_void, length: usize) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Munmap { len: length });

        let addr = start as usize;
        match state.mappings.get(&addr) {
            Some(&(_, len)) if len == length => {
                state.mappings.remove(&addr);
                drop(Box::from_raw(slice::from_raw_parts_mut(
                    start as *mut u8,
                    length,
                )));
                Ok(())
            }
            _ => Err(os_error(libc::EINVAL)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Descriptor;
    use crate::capture;

    #[test]
    fn short_mapping_is_filled_within_bounds() {
        let dev = MockDriver::webcam();
        capture::request_buffers(&dev, 1).unwrap();

        let len = dev.buffer_len() / 8;
        let mapping = capture::map_buffer(&dev, &{
            let mut buf = capture::query_buffer(&dev, 0).unwrap();
            buf.as_raw_mut().length = len as u32;
            buf
        })
        .unwrap();
        assert_eq!(mapping.len(), len);

        let mut buf = Descriptor::new(0);
        capture::queue_buffer(&dev, &mut buf).unwrap();
        capture::stream_on(&dev).unwrap();
        capture::dequeue_buffer(&dev, &mut buf).unwrap();

        assert_eq!(&mapping[..], &dev.frame_pattern(0)[..len]);
    }
}
