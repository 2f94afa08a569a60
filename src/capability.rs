use bitflags::bitflags;
use std::fmt;

use crate::v4l_sys::*;

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x00000001;
        const VIDEO_OUTPUT          = 0x00000002;
        const VIDEO_OVERLAY         = 0x00000004;
        const VBI_CAPTURE           = 0x00000010;
        const VBI_OUTPUT            = 0x00000020;
        const SLICED_VBI_CAPTURE    = 0x00000040;
        const SLICED_VBI_OUTPUT     = 0x00000080;
        const RDS_CAPTURE           = 0x00000100;
        const VIDEO_OUTPUT_OVERLAY  = 0x00000200;
        const HW_FREQ_SEEK          = 0x00000400;
        const RDS_OUTPUT            = 0x00000800;

        const VIDEO_CAPTURE_MPLANE  = 0x00001000;
        const VIDEO_OUTPUT_MPLANE   = 0x00002000;
        const VIDEO_M2M_MPLANE      = 0x00004000;
        const VIDEO_M2M             = 0x00008000;

        const TUNER                 = 0x00010000;
        const AUDIO                 = 0x00020000;
        const RADIO                 = 0x00040000;
        const MODULATOR             = 0x00080000;

        const SDR_CAPTURE           = 0x00100000;
        const EXT_PIX_FORMAT        = 0x00200000;
        const SDR_OUTPUT            = 0x00400000;
        const META_CAPTURE          = 0x00800000;

        const READ_WRITE            = 0x01000000;
        const ASYNC_IO              = 0x02000000;
        const STREAMING             = 0x04000000;
        const META_OUTPUT           = 0x08000000;

        const TOUCH                 = 0x10000000;

        const DEVICE_CAPS           = 0x80000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = "";
        let mut flags = *self;

        let mut print_flag = |flag: Flags, info: &str| -> fmt::Result {
            if flags.contains(flag) {
                write!(f, "{}{}", prefix, info)?;
                prefix = ", ";

                // remove from input flags so we can know about flags we do not recognize
                flags.remove(flag);
            }
            Ok(())
        };

        print_flag(Flags::VIDEO_CAPTURE, "Video Capture")?;
        print_flag(Flags::VIDEO_CAPTURE_MPLANE, "Video Capture Multiplanar")?;
        print_flag(Flags::VIDEO_OUTPUT, "Video Output")?;
        print_flag(Flags::VIDEO_OUTPUT_MPLANE, "Video Output Multiplanar")?;
        print_flag(Flags::VIDEO_M2M, "Video Memory-to-Memory")?;
        print_flag(Flags::VIDEO_M2M_MPLANE, "Video Memory-to-Memory Multiplanar")?;
        print_flag(Flags::VIDEO_OVERLAY, "Video Overlay")?;
        print_flag(Flags::VIDEO_OUTPUT_OVERLAY, "Video Output Overlay")?;
        print_flag(Flags::VBI_CAPTURE, "VBI Capture")?;
        print_flag(Flags::VBI_OUTPUT, "VBI Output")?;
        print_flag(Flags::SLICED_VBI_CAPTURE, "Sliced VBI Capture")?;
        print_flag(Flags::SLICED_VBI_OUTPUT, "Sliced VBI Output")?;
        print_flag(Flags::RDS_CAPTURE, "RDS Capture")?;
        print_flag(Flags::RDS_OUTPUT, "RDS Output")?;
        print_flag(Flags::SDR_CAPTURE, "SDR Capture")?;
        print_flag(Flags::SDR_OUTPUT, "SDR Output")?;
        print_flag(Flags::META_CAPTURE, "Metadata Capture")?;
        print_flag(Flags::META_OUTPUT, "Metadata Output")?;
        print_flag(Flags::TUNER, "Tuner")?;
        print_flag(Flags::TOUCH, "Touch Device")?;
        print_flag(Flags::HW_FREQ_SEEK, "HW Frequency Seek")?;
        print_flag(Flags::MODULATOR, "Modulator")?;
        print_flag(Flags::AUDIO, "Audio")?;
        print_flag(Flags::RADIO, "Radio")?;
        print_flag(Flags::READ_WRITE, "Read/Write")?;
        print_flag(Flags::ASYNC_IO, "Async I/O")?;
        print_flag(Flags::STREAMING, "Streaming")?;
        print_flag(Flags::EXT_PIX_FORMAT, "Extended Pix Format")?;
        print_flag(Flags::DEVICE_CAPS, "Device Capabilities")?;

        if !flags.is_empty() {
            write!(f, "{}{:#x}", prefix, flags.bits())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Device capabilities
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capabilities of the physical device as a whole, as reported
    pub capabilities: Flags,
    /// Capabilities of the opened node, present if the driver sets [`Flags::DEVICE_CAPS`]
    pub device_caps: Option<Flags>,
}

impl Capabilities {
    /// Flags describing the opened node
    ///
    /// `device_caps` if the driver provides them, the physical capabilities otherwise.
    pub fn node_caps(&self) -> Flags {
        self.device_caps.unwrap_or(self.capabilities)
    }

    /// Whether the opened node supports all of the given flags
    pub fn has(&self, flags: Flags) -> bool {
        self.node_caps().contains(flags)
    }
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        let capabilities = Flags::from(cap.capabilities);
        let device_caps = if capabilities.contains(Flags::DEVICE_CAPS) {
            Some(Flags::from(cap.device_caps))
        } else {
            None
        };

        Capabilities {
            driver: crate::cstr(&cap.driver),
            card: crate::cstr(&cap.card),
            bus: crate::cstr(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            capabilities,
            device_caps,
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilities: {}", self.capabilities)?;
        if let Some(device_caps) = self.device_caps {
            writeln!(f, "Device Caps : {}", device_caps)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    fn raw(capabilities: u32, device_caps: u32) -> v4l2_capability {
        let mut cap: v4l2_capability = unsafe { mem::zeroed() };
        cap.driver[..3].copy_from_slice(b"uvc");
        cap.card[..6].copy_from_slice(b"Webcam");
        cap.bus_info[..5].copy_from_slice(b"usb-1");
        cap.version = 0x0006_0b02;
        cap.capabilities = capabilities;
        cap.device_caps = device_caps;
        cap
    }

    #[test]
    fn strings_are_trimmed_at_nul() {
        let caps = Capabilities::from(raw(0, 0));
        assert_eq!(caps.driver, "uvc");
        assert_eq!(caps.card, "Webcam");
        assert_eq!(caps.bus, "usb-1");
        assert_eq!(caps.version, (6, 11, 2));
    }

    #[test]
    fn device_caps_win_when_advertised() {
        let physical = (Flags::VIDEO_CAPTURE | Flags::META_CAPTURE | Flags::DEVICE_CAPS).bits();
        let node = (Flags::META_CAPTURE | Flags::STREAMING).bits();

        let caps = Capabilities::from(raw(physical, node));
        assert_eq!(caps.capabilities.bits(), physical);
        assert_eq!(caps.device_caps.map(|f| f.bits()), Some(node));
        assert!(caps.has(Flags::META_CAPTURE));
        assert!(!caps.has(Flags::VIDEO_CAPTURE));

        let caps = Capabilities::from(raw((Flags::VIDEO_CAPTURE | Flags::STREAMING).bits(), 0));
        assert_eq!(caps.device_caps, None);
        assert!(caps.has(Flags::VIDEO_CAPTURE | Flags::STREAMING));
    }

    #[test]
    fn display_lists_unknown_bits() {
        let flags = Flags::VIDEO_CAPTURE | Flags::STREAMING | Flags::from(0x0000_0008);
        assert_eq!(flags.to_string(), "Video Capture, Streaming, 0x8");
    }
}
