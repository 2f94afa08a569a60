use clap::Parser;
use webcam_v4l::capture::{Formats, FrameSizes};
use webcam_v4l::{Camera, DeviceList};

/// Video4Linux device example
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Capture device node path or index (default: 0)
    #[arg(short, long, value_name = "INDEX or PATH", default_value = "0")]
    device: String,

    /// List all video nodes instead of describing one
    #[arg(short, long)]
    list: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        for path in DeviceList::new() {
            match Camera::open(&path) {
                Ok(camera) => println!("{}: {}", path.display(), camera.name()),
                Err(e) => println!("{}: {}", path.display(), e),
            }
        }
        return Ok(());
    }

    // Determine which device to use
    let mut path = args.device;
    if path.parse::<u64>().is_ok() {
        path = format!("/dev/video{}", path);
    }
    println!("Using device: {}\n", path);

    let camera = Camera::open(&path)?;
    println!("Device capabilities:\n{}", camera.capabilities());

    println!("Available formats:");
    for desc in Formats::new(camera.driver()) {
        let desc = desc?;
        println!("  {} ({})", desc.fourcc, desc.description);

        for size in FrameSizes::new(camera.driver(), desc.fourcc) {
            println!("    Size: {}", size?);
        }
    }

    Ok(())
}
