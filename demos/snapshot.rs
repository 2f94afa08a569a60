use std::fs;
use std::path::PathBuf;

use clap::Parser;
use webcam_v4l::format::FourCC;
use webcam_v4l::Camera;

/// Captures a single frame and writes the raw data to a file
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Capture device node path
    #[arg(short, long, default_value = "/dev/video0")]
    device: PathBuf,

    /// Pixel format, e.g. MJPG or YUYV
    #[arg(short, long)]
    format: Option<String>,

    /// Preferred frame width
    #[arg(long)]
    width: Option<u32>,

    /// Preferred frame height
    #[arg(long)]
    height: Option<u32>,

    /// Output file
    #[arg(short, long, default_value = "frame.raw")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let camera = Camera::open(&args.device)?;
    println!("Using {} ({})", camera.name(), args.device.display());

    let mut selector = camera.selector();
    if let Some(format) = &args.format {
        let bytes: [u8; 4] = format
            .as_bytes()
            .try_into()
            .map_err(|_| format!("pixel format must have four characters: {}", format))?;
        selector = selector.fourcc(FourCC::new(&bytes));
    }
    if let Some(width) = args.width {
        selector = selector.width(width);
    }
    if let Some(height) = args.height {
        selector = selector.height(height);
    }

    let selection = selector.select()?;
    let snapshot = camera.snapshot(&selection)?;
    fs::write(&args.output, &snapshot.data)?;

    println!(
        "Wrote frame {} ({} {}x{}, {} bytes) to {}",
        snapshot.sequence,
        snapshot.fourcc,
        snapshot.width(),
        snapshot.height(),
        snapshot.data.len(),
        args.output.display()
    );
    Ok(())
}
