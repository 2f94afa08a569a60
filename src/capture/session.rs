use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};

use crate::buffer::{Descriptor, Metadata};
use crate::capture;
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::{Format, FourCC};
use crate::framesize::Discrete;
use crate::memory::Mapping;
use crate::selector::Selection;
use crate::snapshot::Snapshot;

/// Capture parameters for a [`Session`]
///
/// # Example
///
/// ```
/// use webcam_v4l::capture::Config;
/// use webcam_v4l::format::FourCC;
///
/// let config = Config::new(FourCC::MJPG, 1280, 720).buffers(2);
/// assert_eq!(config.buffer_count(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    fourcc: FourCC,
    width: u32,
    height: u32,
    buffers: u32,
}

impl Config {
    /// Returns a configuration with a single buffer
    pub fn new(fourcc: FourCC, width: u32, height: u32) -> Self {
        Config {
            fourcc,
            width,
            height,
            buffers: 1,
        }
    }

    /// Number of buffers to request from the driver
    pub fn buffers(mut self, count: u32) -> Self {
        self.buffers = count;
        self
    }

    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffers
    }
}

impl From<Selection> for Config {
    fn from(selection: Selection) -> Self {
        Config::new(selection.fourcc, selection.width, selection.height)
    }
}

/// A captured frame, borrowed from the mapped buffer it was written to
///
/// The view is valid until the next call to [`Session::next_frame`].
pub struct Frame<'a> {
    data: &'a [u8],
    meta: Metadata,
}

impl<'a> Frame<'a> {
    /// Payload of the frame, limited to the bytes the driver reported as used
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("meta", &self.meta)
            .finish()
    }
}

/// Streaming capture over a pool of memory-mapped buffers
///
/// Opening a session negotiates the format, requests and maps the buffers, queues all of them
/// and starts the stream. Closing (or dropping) it stops the stream, unmaps every buffer and
/// frees the pool, in that order.
pub struct Session<'a, D: Driver + ?Sized> {
    dev: &'a D,
    format: Format,
    mappings: Vec<Mapping<'a, D>>,
    /// Slot handed out by the last `next_frame`, re-queued by the following one
    pending: Option<u32>,
    streaming: bool,
    released: bool,
}

impl<'a, D: Driver + ?Sized> Session<'a, D> {
    /// Sets up buffers and starts streaming
    ///
    /// If any step fails, everything set up so far is torn down again before the error is
    /// returned.
    pub fn open(dev: &'a D, config: &Config) -> Result<Self> {
        let format = capture::set_format(dev, config.fourcc, config.width, config.height)?;
        let count = capture::request_buffers(dev, config.buffers)?;

        let mut session = Session {
            dev,
            format,
            mappings: Vec::with_capacity(count as usize),
            pending: None,
            streaming: false,
            released: false,
        };

        for index in 0..count {
            let mut buf = capture::query_buffer(dev, index)?;
            session.mappings.push(capture::map_buffer(dev, &buf)?);
            capture::queue_buffer(dev, &mut buf)?;
        }

        capture::stream_on(dev)?;
        session.streaming = true;

        log::debug!(
            "streaming {} {}x{} with {} buffer(s)",
            format.fourcc,
            format.width,
            format.height,
            count
        );
        Ok(session)
    }

    /// Format the driver settled on
    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Number of mapped buffers
    pub fn buffer_count(&self) -> usize {
        self.mappings.len()
    }

    /// Waits for the next frame
    ///
    /// The buffer returned by the previous call goes back to the driver first. If that fails,
    /// the buffer stays pending and the next call tries again.
    pub fn next_frame(&mut self) -> Result<Frame<'_>> {
        if let Some(index) = self.pending {
            capture::queue_buffer(self.dev, &mut Descriptor::new(index))?;
            self.pending = None;
        }

        let mut buf = Descriptor::new(0);
        capture::dequeue_buffer(self.dev, &mut buf)?;

        let index = buf.index();
        let mapping = self
            .mappings
            .get(index as usize)
            .ok_or(Error::BufferIndex(index))?;
        self.pending = Some(index);

        let used = (buf.bytes_used() as usize).min(mapping.len());
        Ok(Frame {
            data: &mapping[..used],
            meta: buf.metadata(),
        })
    }

    /// Waits for the next frame and copies it out of the driver's buffer
    pub fn snapshot(&mut self) -> Result<Snapshot> {
        let format = self.format;
        let frame = self.next_frame()?;

        Ok(Snapshot {
            size: Discrete {
                width: format.width,
                height: format.height,
            },
            fourcc: format.fourcc,
            data: frame.data().to_vec(),
            sequence: frame.meta().sequence,
            timestamp: frame.meta().timestamp,
        })
    }

    /// Writes the payload of every frame to `writer` until `stop` is set
    ///
    /// `stop` is checked before each frame. Returns the number of frames written.
    pub fn stream_to<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        stop: &AtomicBool,
    ) -> Result<u64> {
        let mut frames = 0;
        while !stop.load(Ordering::Acquire) {
            let frame = self.next_frame()?;
            writer.write_all(frame.data())?;
            frames += 1;
        }
        writer.flush()?;

        log::debug!("streamed {} frame(s)", frames);
        Ok(frames)
    }

    /// Sends a [`Snapshot`] for every tick received
    ///
    /// Returns the number of snapshots sent once all tick senders are gone or the snapshot
    /// receiver hung up.
    pub fn stream_by_ticks(
        &mut self,
        ticks: &Receiver<()>,
        snapshots: &Sender<Snapshot>,
    ) -> Result<u64> {
        let mut sent = 0;
        for () in ticks.iter() {
            let snapshot = self.snapshot()?;
            if snapshots.send(snapshot).is_err() {
                log::debug!("snapshot receiver hung up");
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }

    /// Stops the stream and releases all buffers, reporting the first error
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut result = Ok(());

        if self.streaming {
            self.streaming = false;
            result = capture::stream_off(self.dev);
        }

        for mapping in self.mappings.drain(..) {
            let len = mapping.len();
            let ret = capture::unmap_buffer(mapping, len);
            if result.is_ok() {
                result = ret;
            }
        }

        let ret = capture::free_buffers(self.dev);
        if result.is_ok() {
            result = ret;
        }

        result
    }
}

impl<D: Driver + ?Sized> Drop for Session<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("failed to tear down capture session: {}", e);
        }
    }
}
