/// Terminal viewer that spins a procedural solid as ASCII art
use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use glt_core::{
    generate_cube, generate_cylinder, generate_disk, generate_sphere, generate_torus, image,
    Batch, Camera, GeometryError, Image, RotationState, Transform, TriangleBatch,
};
use nalgebra::Vector3;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub mod renderer;

pub use renderer::{AsciiRenderer, MeshHandle, RenderError, Shading};

/// Radians per key press.
const ROTATE_STEP: f32 = 0.1;

/// A solid and the parameters it is generated with
#[derive(Debug, Clone, PartialEq, clap::Subcommand)]
pub enum Solid {
    /// Sphere with poles on the z axis
    Sphere {
        #[arg(long, default_value_t = 1.5)]
        radius: f32,
        #[arg(long, default_value_t = 24)]
        slices: u32,
        #[arg(long, default_value_t = 12)]
        stacks: u32,
    },

    /// Torus around the z axis
    Torus {
        #[arg(long, default_value_t = 1.2)]
        major_radius: f32,
        #[arg(long, default_value_t = 0.4)]
        minor_radius: f32,
        #[arg(long, default_value_t = 32)]
        num_major: u32,
        #[arg(long, default_value_t = 16)]
        num_minor: u32,
    },

    /// Open cylinder or cone along z
    Cylinder {
        #[arg(long, default_value_t = 1.0)]
        base_radius: f32,
        #[arg(long, default_value_t = 1.0)]
        top_radius: f32,
        #[arg(long, default_value_t = 2.0)]
        length: f32,
        #[arg(long, default_value_t = 24)]
        slices: u32,
        #[arg(long, default_value_t = 4)]
        stacks: u32,
    },

    /// Flat annulus facing +z
    Disk {
        #[arg(long, default_value_t = 0.5)]
        inner_radius: f32,
        #[arg(long, default_value_t = 1.5)]
        outer_radius: f32,
        #[arg(long, default_value_t = 24)]
        slices: u32,
        #[arg(long, default_value_t = 3)]
        stacks: u32,
    },

    /// Axis-aligned cube
    Cube {
        #[arg(long, default_value_t = 1.0)]
        half_extent: f32,
    },
}

impl Default for Solid {
    fn default() -> Self {
        Solid::Cube { half_extent: 1.0 }
    }
}

/// Generated geometry in whichever layout its generator produces.
#[derive(Debug, Clone)]
pub enum Geometry {
    Indexed(TriangleBatch),
    Flat(Batch),
}

impl Geometry {
    pub fn triangle_count(&self) -> usize {
        match self {
            Geometry::Indexed(batch) => batch.triangle_count(),
            Geometry::Flat(batch) => batch.triangles().count(),
        }
    }

    pub fn upload(&self, renderer: &mut AsciiRenderer) -> Result<MeshHandle, RenderError> {
        match self {
            Geometry::Indexed(batch) => batch.upload(renderer),
            Geometry::Flat(batch) => batch.upload(renderer),
        }
    }
}

impl Solid {
    pub fn name(&self) -> &'static str {
        match self {
            Solid::Sphere { .. } => "sphere",
            Solid::Torus { .. } => "torus",
            Solid::Cylinder { .. } => "cylinder",
            Solid::Disk { .. } => "disk",
            Solid::Cube { .. } => "cube",
        }
    }

    pub fn generate(&self) -> Result<Geometry, GeometryError> {
        let geometry = match *self {
            Solid::Sphere {
                radius,
                slices,
                stacks,
            } => Geometry::Indexed(generate_sphere(radius, slices, stacks)?),
            Solid::Torus {
                major_radius,
                minor_radius,
                num_major,
                num_minor,
            } => Geometry::Indexed(generate_torus(major_radius, minor_radius, num_major, num_minor)?),
            Solid::Cylinder {
                base_radius,
                top_radius,
                length,
                slices,
                stacks,
            } => Geometry::Indexed(generate_cylinder(base_radius, top_radius, length, slices, stacks)?),
            Solid::Disk {
                inner_radius,
                outer_radius,
                slices,
                stacks,
            } => Geometry::Indexed(generate_disk(inner_radius, outer_radius, slices, stacks)?),
            Solid::Cube { half_extent } => Geometry::Flat(generate_cube(half_extent)?),
        };
        Ok(geometry)
    }

    /// Offset that centers the solid on the origin. Cylinders grow along +z
    /// from their base.
    fn center_offset(&self) -> Vector3<f32> {
        match *self {
            Solid::Cylinder { length, .. } => Vector3::new(0.0, 0.0, -length * 0.5),
            _ => Vector3::zeros(),
        }
    }
}

/// Everything the viewer needs besides the terminal itself
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub solid: Solid,
    pub shading: Shading,
    pub texture: Option<PathBuf>,
    pub fps: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            solid: Solid::default(),
            shading: Shading::default(),
            texture: None,
            fps: 30,
        }
    }
}

impl ViewerConfig {
    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    config: ViewerConfig,
    handle: MeshHandle,
    texture: Option<Image>,
    rotation: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Generate the configured solid and size the frame to the terminal.
    pub fn new(config: ViewerConfig) -> Result<Self> {
        let (width, height) = terminal::size().context("querying terminal size")?;
        Self::with_size(config, width as usize, height as usize)
    }

    pub fn with_size(config: ViewerConfig, width: usize, height: usize) -> Result<Self> {
        let geometry = config
            .solid
            .generate()
            .with_context(|| format!("generating {}", config.solid.name()))?;

        let texture = match &config.texture {
            Some(path) => Some(
                image::read_image_file(path)
                    .with_context(|| format!("loading texture {}", path.display()))?,
            ),
            None => None,
        };

        let mut renderer = AsciiRenderer::new(width, height);
        let handle = geometry.upload(&mut renderer)?;
        info!(
            solid = config.solid.name(),
            triangles = geometry.triangle_count(),
            textured = texture.is_some(),
            "viewer ready"
        );

        Ok(Self {
            config,
            handle,
            texture,
            rotation: RotationState::new(0.3, 0.3, 0.0),
            camera: Camera::new(width as u32, height as u32),
            renderer,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn rotation(&self) -> RotationState {
        self.rotation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> Result<()> {
        let target_frame_time = self.config.frame_time();

        while self.running {
            let frame_start = Instant::now();

            if event::poll(Duration::from_millis(0))? {
                self.handle_event(event::read()?);
            }

            self.update();
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent { code, .. }) => self.handle_key(code),
            Event::Resize(width, height) => {
                debug!(width, height, "terminal resized");
                self.renderer.resize(width as usize, height as usize);
                self.camera.aspect = width as f32 / height.max(1) as f32;
            }
            _ => {}
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('w') | KeyCode::Up => {
                self.rotation.rotate(ROTATE_STEP, 0.0, 0.0);
            }
            KeyCode::Char('s') | KeyCode::Down => {
                self.rotation.rotate(-ROTATE_STEP, 0.0, 0.0);
            }
            KeyCode::Char('a') | KeyCode::Left => {
                self.rotation.rotate(0.0, -ROTATE_STEP, 0.0);
            }
            KeyCode::Char('d') | KeyCode::Right => {
                self.rotation.rotate(0.0, ROTATE_STEP, 0.0);
            }
            KeyCode::Char('e') => {
                self.rotation.rotate(0.0, 0.0, ROTATE_STEP);
            }
            KeyCode::Char('r') => {
                self.rotation.rotate(0.0, 0.0, -ROTATE_STEP);
            }
            _ => {}
        }
    }

    fn update(&mut self) {
        // Continuous slow rotation for demo effect
        self.rotation.rotate(0.01, 0.015, 0.0);
    }

    /// Rasterize the current pose into the frame buffer.
    pub fn draw_frame(&mut self) -> Result<()> {
        let offset = self.config.solid.center_offset();
        let model = Transform::rotation_matrix(&self.rotation)
            * Transform::translation_matrix(offset.x, offset.y, offset.z);

        self.renderer.clear();
        self.renderer.draw(
            self.handle,
            &model,
            &self.camera,
            self.config.shading,
            self.texture.as_ref(),
        )?;
        Ok(())
    }

    pub fn frame_text(&self) -> String {
        self.renderer.frame_text()
    }

    fn render(&mut self) -> Result<()> {
        self.draw_frame()?;

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.present(&mut stdout)?;

        // Status line
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "GLT Terminal | {} | FPS: {:.1} | Controls: WASD/Arrows=Rotate E/R=Roll Q=Quit",
                self.config.solid.name(),
                self.fps
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}
