/// Example: Render a sphere wrapped in a generated checkerboard texture
///
/// Usage: cargo run --example textured_sphere -- [path/to/texture.tga|bmp]
use anyhow::Result;
use glt_core::image;
use glt_terminal::{Shading, Solid, TerminalApp, ViewerConfig};
use std::env;
use std::path::PathBuf;

/// Write an 8x8 checkerboard TGA and return its path.
fn checkerboard() -> Result<PathBuf> {
    let (width, height) = (64u16, 32u16);
    let mut bgr = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let light = (x / 8 + y / 8) % 2 == 0;
            let value = if light { 255 } else { 60 };
            bgr.extend_from_slice(&[value, value, value]);
        }
    }

    let path = env::temp_dir().join("glt-checkerboard.tga");
    image::write_tga_file(&path, width, height, &bgr)?;
    Ok(path)
}

fn main() -> Result<()> {
    let texture = match env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => checkerboard()?,
    };
    println!("Texture: {}", texture.display());

    let config = ViewerConfig {
        solid: Solid::Sphere {
            radius: 1.5,
            slices: 32,
            stacks: 16,
        },
        shading: Shading::Smooth,
        texture: Some(texture),
        fps: 30,
    };

    let mut app = TerminalApp::new(config)?;
    app.run()
}
