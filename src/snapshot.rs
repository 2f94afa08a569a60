use crate::format::FourCC;
use crate::framesize::Discrete;
use crate::timestamp::Timestamp;

/// A single frame copied out of the driver's buffer
///
/// Owns its data, so it outlives the session that captured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub size: Discrete,
    pub fourcc: FourCC,
    pub data: Vec<u8>,
    pub sequence: u32,
    pub timestamp: Timestamp,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}
