/// GLT Terminal - spin a procedural solid as ASCII art
///
/// Controls:
///   - WASD / Arrow Keys: Rotate the solid
///   - E/R: Roll rotation
///   - Q/ESC: Quit
use anyhow::Result;
use clap::Parser;
use glt_terminal::{Shading, Solid, TerminalApp, ViewerConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glt-terminal")]
#[command(about = "Render procedural solids in the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    solid: Option<Solid>,

    /// Lighting model
    #[arg(long, value_enum, global = true, default_value_t = Shading::Smooth)]
    shading: Shading,

    /// TGA or BMP image whose brightness modulates the surface
    #[arg(long, global = true)]
    texture: Option<PathBuf>,

    /// Target frames per second
    #[arg(long, global = true, default_value_t = 30)]
    fps: u32,
}

fn main() -> Result<()> {
    // Logs go to stderr so they never land in the alternate screen
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ViewerConfig {
        solid: cli.solid.unwrap_or_default(),
        shading: cli.shading,
        texture: cli.texture,
        fps: cli.fps,
    };

    let mut app = TerminalApp::new(config)?;
    app.run()
}
