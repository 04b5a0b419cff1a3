use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cone_pilot")]
#[command(
    about = "Attaches to a frame region holding a 4-channel image and steers between blue and yellow cones"
)]
#[command(after_help = "Example: cone_pilot --cid=253 --name=img --width=640 --height=480 --verbose")]
#[command(version)]
pub struct Cli {
    /// OD4 session id used to receive steering requests.
    #[arg(long)]
    pub cid: u16,

    /// Name of the frame region to attach (capture source: file, device index or pipeline).
    #[arg(long)]
    pub name: String,

    /// Frame width in pixels.
    #[arg(long)]
    pub width: u32,

    /// Frame height in pixels.
    #[arg(long)]
    pub height: u32,

    /// Show the debug and contour windows.
    #[arg(long)]
    pub verbose: bool,

    /// Optional YAML file overriding detection and steering constants.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write one JSON record per frame to this file.
    #[arg(long)]
    pub record: Option<PathBuf>,
}
