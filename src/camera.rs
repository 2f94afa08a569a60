use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, Sender};

use crate::capability::{Capabilities, Flags};
use crate::capture::{self, Config, Formats, FrameSizes, Session};
use crate::device::{Driver, Handle};
use crate::error::Result;
use crate::format::{Description, FourCC};
use crate::framesize::{Discrete, FrameSizeEnum};
use crate::selector::{Selection, Selector};
use crate::snapshot::Snapshot;

/// A video capture device that supports streaming I/O
///
/// # Example
///
/// ```no_run
/// use webcam_v4l::Camera;
///
/// let camera = Camera::open("/dev/video0").unwrap();
/// let selection = camera.selector().select().unwrap();
/// let snapshot = camera.snapshot(&selection).unwrap();
/// println!("{} bytes of {}", snapshot.data.len(), snapshot.fourcc);
/// ```
pub struct Camera<D: Driver = Handle> {
    driver: D,
    path: Option<PathBuf>,
    caps: Capabilities,
}

impl Camera<Handle> {
    /// Opens the device node at `path` and checks that it can stream video
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let handle = Handle::with_path(&path)?;
        let mut camera = Self::with_driver(handle)?;
        camera.path = Some(path.as_ref().to_path_buf());
        Ok(camera)
    }

    /// Device node the camera was opened from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl<D: Driver> Camera<D> {
    /// Wraps an already opened device
    ///
    /// Fails with [`crate::Error::NotCapture`] or [`crate::Error::NotStreaming`] if the
    /// device lacks the respective capability.
    pub fn with_driver(driver: D) -> Result<Self> {
        let caps = capture::query_caps(&driver)?;

        if !caps.has(Flags::VIDEO_CAPTURE) {
            return Err(crate::Error::NotCapture(caps.card));
        }
        if !caps.has(Flags::STREAMING) {
            return Err(crate::Error::NotStreaming(caps.card));
        }

        log::debug!("{} ({}) on {}", caps.card, caps.driver, caps.bus);
        Ok(Camera {
            driver,
            path: None,
            caps,
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Card name reported by the driver
    pub fn name(&self) -> &str {
        &self.caps.card
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// All pixel formats the device offers for capture
    pub fn formats(&self) -> Result<Vec<Description>> {
        Formats::new(&self.driver).collect()
    }

    pub fn supports_format(&self, fourcc: FourCC) -> Result<bool> {
        Ok(self.formats()?.iter().any(|desc| desc.fourcc == fourcc))
    }

    /// Discrete frame sizes offered for `fourcc`, stepwise ranges are left out
    pub fn discrete_sizes(&self, fourcc: FourCC) -> Result<Vec<Discrete>> {
        let mut sizes = Vec::new();
        for size in FrameSizes::new(&self.driver, fourcc) {
            if let FrameSizeEnum::Discrete(discrete) = size?.size {
                sizes.push(discrete);
            }
        }
        Ok(sizes)
    }

    pub fn supports_discrete(&self, fourcc: FourCC, width: u32, height: u32) -> Result<bool> {
        Ok(self
            .discrete_sizes(fourcc)?
            .iter()
            .any(|size| size.width == width && size.height == height))
    }

    /// Starts choosing a format and frame size, see [`Selector`]
    pub fn selector(&self) -> Selector<'_, D> {
        Selector::new(self)
    }

    /// Starts streaming, see [`Session::open`]
    pub fn session(&self, config: &Config) -> Result<Session<'_, D>> {
        Session::open(&self.driver, config)
    }

    /// Captures a single frame with a one-buffer session
    ///
    /// The reported size and format are the ones the driver settled on, which may differ from
    /// `selection`.
    pub fn snapshot(&self, selection: &Selection) -> Result<Snapshot> {
        let mut session = self.session(&Config::from(*selection))?;
        let snapshot = session.snapshot()?;
        session.close()?;
        Ok(snapshot)
    }

    /// Streams frame payloads into `writer` until `stop` is set, see [`Session::stream_to`]
    pub fn stream_to<W: Write + ?Sized>(
        &self,
        config: &Config,
        writer: &mut W,
        stop: &AtomicBool,
    ) -> Result<u64> {
        let mut session = self.session(config)?;
        let frames = session.stream_to(writer, stop)?;
        session.close()?;
        Ok(frames)
    }

    /// Answers every tick with a snapshot, see [`Session::stream_by_ticks`]
    pub fn stream_by_ticks(
        &self,
        config: &Config,
        ticks: &Receiver<()>,
        snapshots: &Sender<Snapshot>,
    ) -> Result<u64> {
        let mut session = self.session(config)?;
        let sent = session.stream_by_ticks(ticks, snapshots)?;
        session.close()?;
        Ok(sent)
    }
}
