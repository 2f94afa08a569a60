use crate::camera::Camera;
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::{Description, FourCC};
use crate::framesize::Discrete;

/// Pixel format and frame size picked by a [`Selector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub fourcc: FourCC,
    pub width: u32,
    pub height: u32,
}

/// Picks a format and frame size a camera actually supports
///
/// Unset criteria fall back to what the device lists first.
///
/// # Example
///
/// ```no_run
/// use webcam_v4l::Camera;
/// use webcam_v4l::format::FourCC;
///
/// let camera = Camera::open("/dev/video0").unwrap();
/// let selection = camera
///     .selector()
///     .fourcc(FourCC::YUYV)
///     .width(1280)
///     .select()
///     .unwrap();
/// println!("{} {}x{}", selection.fourcc, selection.width, selection.height);
/// ```
pub struct Selector<'a, D: Driver> {
    camera: &'a Camera<D>,
    fourcc: Option<FourCC>,
    width: Option<u32>,
    height: Option<u32>,
}

impl<'a, D: Driver> Selector<'a, D> {
    pub(crate) fn new(camera: &'a Camera<D>) -> Self {
        Selector {
            camera,
            fourcc: None,
            width: None,
            height: None,
        }
    }

    /// Preferred pixel format
    pub fn fourcc(mut self, fourcc: FourCC) -> Self {
        self.fourcc = Some(fourcc);
        self
    }

    /// Preferred frame width in pixels
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Preferred frame height in pixels
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Queries the camera and settles on a format and frame size
    pub fn select(&self) -> Result<Selection> {
        let formats = self.camera.formats()?;
        let fourcc = pick_format(&formats, self.fourcc).ok_or(Error::NoFormats)?;

        let sizes = self.camera.discrete_sizes(fourcc)?;
        let size =
            pick_size(&sizes, self.width, self.height).ok_or(Error::NoFrameSizes(fourcc))?;

        log::debug!("selected {} {}x{}", fourcc, size.width, size.height);
        Ok(Selection {
            fourcc,
            width: size.width,
            height: size.height,
        })
    }
}

fn pick_format(formats: &[Description], wanted: Option<FourCC>) -> Option<FourCC> {
    let listed = |fourcc: FourCC| formats.iter().any(|desc| desc.fourcc == fourcc);

    match wanted {
        Some(fourcc) if listed(fourcc) => Some(fourcc),
        Some(fourcc) => {
            log::debug!("{} is not supported, falling back", fourcc);
            fallback_format(formats)
        }
        None => fallback_format(formats),
    }
}

fn fallback_format(formats: &[Description]) -> Option<FourCC> {
    formats
        .iter()
        .find(|desc| desc.fourcc == FourCC::MJPG)
        .or_else(|| formats.first())
        .map(|desc| desc.fourcc)
}

/// First entry with the smallest distance, `min_by_key` would return the last
fn closest<T: Copy>(items: impl Iterator<Item = T>, distance: impl Fn(T) -> u32) -> Option<T> {
    let mut best: Option<(T, u32)> = None;
    for item in items {
        let d = distance(item);
        if best.map_or(true, |(_, b)| d < b) {
            best = Some((item, d));
        }
    }
    best.map(|(item, _)| item)
}

fn pick_size(sizes: &[Discrete], width: Option<u32>, height: Option<u32>) -> Option<Discrete> {
    let first = sizes.first()?;

    let width = match width {
        Some(w) => closest(sizes.iter().map(|s| s.width), |x| x.abs_diff(w))?,
        None => first.width,
    };

    let candidates = sizes.iter().filter(|s| s.width == width).copied();
    match height {
        Some(h) => closest(candidates, |s| s.height.abs_diff(h)),
        None => candidates.into_iter().next(),
    }
}
