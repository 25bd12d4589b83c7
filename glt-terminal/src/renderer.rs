/// ASCII rasterizer that stands in for a GPU buffer backend
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use glt_core::{BufferBackend, BufferData, Camera, Image, Primitive, ScreenPoint, Transform};
use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Light floor so faces turned away from the light stay visible.
const AMBIENT: f32 = 0.1;

/// How lighting is evaluated across a triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Shading {
    /// One brightness per face from its geometric normal
    Flat,
    /// Vertex normals interpolated per cell
    #[default]
    Smooth,
}

/// Identifies geometry previously handed to [`AsciiRenderer::upload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(usize);

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("{attribute} has {found} entries, expected {expected}")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u16, vertices: usize },

    #[error("unknown mesh handle {0:?}")]
    UnknownHandle(MeshHandle),
}

/// Uploaded geometry, copied out of the borrowed [`BufferData`].
#[derive(Debug)]
struct StoredMesh {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tex_coords: Vec<Vector2<f32>>,
    corners: Vec<[usize; 3]>,
}

/// A corner after projection, carrying what the rasterizer interpolates.
#[derive(Debug, Clone, Copy)]
struct Corner {
    screen: ScreenPoint,
    normal: Vector3<f32>,
    tex_coord: Vector2<f32>,
}

/// ASCII renderer that converts 3D meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
    meshes: Vec<StoredMesh>,
}

fn check_len(attribute: &'static str, expected: usize, found: usize) -> Result<(), RenderError> {
    if found != 0 && found != expected {
        return Err(RenderError::AttributeLength {
            attribute,
            expected,
            found,
        });
    }
    Ok(())
}

impl BufferBackend for AsciiRenderer {
    type Handle = MeshHandle;
    type Error = RenderError;

    fn upload(&mut self, data: BufferData<'_>) -> Result<MeshHandle, RenderError> {
        let vertices = data.positions.len();
        check_len("normals", vertices, data.normals.len())?;
        check_len("tex_coords", vertices, data.tex_coords.len())?;

        let corners = match data.indices {
            Some(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices) {
                    return Err(RenderError::IndexOutOfRange { index, vertices });
                }
                Primitive::Triangles
                    .triangle_corners(indices.len())
                    .into_iter()
                    .map(|[a, b, c]| [indices[a] as usize, indices[b] as usize, indices[c] as usize])
                    .collect()
            }
            None => data.primitive.triangle_corners(vertices),
        };

        let handle = MeshHandle(self.meshes.len());
        debug!(?handle, vertices, triangles = corners.len(), "mesh uploaded");
        self.meshes.push(StoredMesh {
            positions: data.positions.to_vec(),
            normals: data.normals.to_vec(),
            tex_coords: data.tex_coords.to_vec(),
            corners,
        });
        Ok(handle)
    }
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
            meshes: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Change the frame size; uploaded meshes are kept.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.depth_buffer = vec![f32::INFINITY; width * height];
        self.char_buffer = vec![' '; width * height];
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
    }

    /// Rasterize an uploaded mesh into the frame.
    pub fn draw(
        &mut self,
        handle: MeshHandle,
        model_matrix: &Matrix4<f32>,
        camera: &Camera,
        shading: Shading,
        texture: Option<&Image>,
    ) -> Result<(), RenderError> {
        let mesh = self
            .meshes
            .get(handle.0)
            .ok_or(RenderError::UnknownHandle(handle))?;

        let normal_matrix = Transform::normal_matrix(model_matrix);
        let light = Vector3::new(0.3, 0.5, 1.0).normalize();

        let mut projected = Vec::with_capacity(mesh.corners.len());
        'triangles: for triangle in &mesh.corners {
            let world = triangle.map(|i| model_matrix.transform_point(&mesh.positions[i]));
            let face = match (world[1] - world[0]).cross(&(world[2] - world[0])).try_normalize(0.0) {
                Some(face) => face,
                None => continue,
            };

            let mut corners = [Corner {
                screen: ScreenPoint {
                    x: 0.0,
                    y: 0.0,
                    depth: 0.0,
                },
                normal: face,
                tex_coord: Vector2::zeros(),
            }; 3];
            for (corner, &i) in corners.iter_mut().zip(triangle) {
                corner.screen = match camera.project_to_screen(
                    &mesh.positions[i],
                    model_matrix,
                    self.width as u32,
                    self.height as u32,
                ) {
                    Some(screen) => screen,
                    None => continue 'triangles,
                };
                if let (Shading::Smooth, Some(n)) = (shading, mesh.normals.get(i)) {
                    corner.normal = (normal_matrix * n).try_normalize(0.0).unwrap_or(face);
                }
                if let Some(uv) = mesh.tex_coords.get(i) {
                    corner.tex_coord = *uv;
                }
            }

            // Two-sided lighting: faces seen from behind use the flipped normal
            let to_eye = camera.position - world[0];
            let flip = if face.dot(&to_eye) < 0.0 { -1.0 } else { 1.0 };
            projected.push((corners, flip));
        }

        for (corners, flip) in projected {
            self.rasterize_triangle(corners, flip, &light, texture);
        }
        Ok(())
    }

    fn rasterize_triangle(
        &mut self,
        corners: [Corner; 3],
        flip: f32,
        light: &Vector3<f32>,
        texture: Option<&Image>,
    ) {
        let [v0, v1, v2] = corners.map(|c| c.screen);

        // Bounding box
        let min_x = v0.x.min(v1.x).min(v2.x).floor() as i32;
        let max_x = v0.x.max(v1.x).max(v2.x).ceil() as i32;
        let min_y = v0.y.min(v1.y).min(v2.y).floor() as i32;
        let max_y = v0.y.max(v1.y).max(v2.y).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let (w0, w1, w2) = match barycentric((v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y), (px, py)) {
                    Some(weights) => weights,
                    None => continue,
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                let idx = y as usize * self.width + x as usize;
                if depth >= self.depth_buffer[idx] {
                    continue;
                }

                let normal = corners[0].normal * w0 + corners[1].normal * w1 + corners[2].normal * w2;
                let diffuse = normal
                    .try_normalize(0.0)
                    .map(|n| (n * flip).dot(light).max(0.0))
                    .unwrap_or(0.0);
                let mut brightness = AMBIENT + (1.0 - AMBIENT) * diffuse;

                if let Some(image) = texture {
                    let uv = corners[0].tex_coord * w0 + corners[1].tex_coord * w1 + corners[2].tex_coord * w2;
                    brightness *= image.luminance_at(uv.x, uv.y);
                }

                self.depth_buffer[idx] = depth;
                self.char_buffer[idx] = ramp_char(brightness);
            }
        }
    }

    /// The frame as text, one line per row.
    pub fn frame_text(&self) -> String {
        let mut text = String::with_capacity((self.width + 1) * self.height);
        for row in self.char_buffer.chunks(self.width.max(1)) {
            text.extend(row.iter());
            text.push('\n');
        }
        text
    }

    /// Queue the frame to `writer`, coloring cells by brightness.
    pub fn present<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];

                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Cyan,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Covered cells always get at least the first visible ramp character.
fn ramp_char(brightness: f32) -> char {
    let top = LUMINOSITY_RAMP.len() - 1;
    let index = (brightness.clamp(0.0, 1.0) * top as f32).round() as usize;
    LUMINOSITY_RAMP[index.clamp(1, top)]
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
