/// Uncompressed TGA and BMP codecs for texture sources and screen grabs
use std::fs;
use std::path::Path;

use nom::{
    bytes::complete::{tag, take},
    number::complete::{le_i32, le_u16, le_u32, le_u8},
    IResult,
};
use tracing::debug;

use crate::error::{ImageError, ImageResult};

const TGA_HEADER_LEN: usize = 18;
const BMP_FILE_HEADER_LEN: usize = 14;
const BMP_INFO_HEADER_LEN: usize = 40;

const TGA_TRUE_COLOR: u8 = 2;
const TGA_GREY: u8 = 3;

/// Channel layout of [`Image::pixels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr,
    Bgra,
    Luminance,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr => 3,
            PixelFormat::Bgra => 4,
            PixelFormat::Luminance => 1,
        }
    }
}

/// Decoded image, rows stored bottom-up and tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Image {
    /// Brightness in `[0, 1]` of the texel nearest to `(u, v)`.
    ///
    /// Coordinates wrap, so any real value addresses the image; `v = 0` is the
    /// bottom row.
    pub fn luminance_at(&self, u: f32, v: f32) -> f32 {
        if self.width == 0 || self.height == 0 || !u.is_finite() || !v.is_finite() {
            return 0.0;
        }

        let x = ((u.rem_euclid(1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((v.rem_euclid(1.0) * self.height as f32) as u32).min(self.height - 1);
        let offset = (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel();

        let texel = match self.pixels.get(offset..offset + self.format.bytes_per_pixel()) {
            Some(texel) => texel,
            None => return 0.0,
        };

        match self.format {
            PixelFormat::Luminance => texel[0] as f32 / 255.0,
            PixelFormat::Bgr | PixelFormat::Bgra => {
                let (b, g, r) = (texel[0] as f32, texel[1] as f32, texel[2] as f32);
                (0.299 * r + 0.587 * g + 0.114 * b) / 255.0
            }
        }
    }
}

#[derive(Debug)]
struct TgaHeader {
    ident_size: u8,
    image_type: u8,
    width: u16,
    height: u16,
    bits: u8,
}

fn parse_tga_header(input: &[u8]) -> IResult<&[u8], TgaHeader> {
    let (input, ident_size) = le_u8(input)?;
    let (input, _color_map_type) = le_u8(input)?;
    let (input, image_type) = le_u8(input)?;
    let (input, _color_map_start) = le_u16(input)?;
    let (input, _color_map_length) = le_u16(input)?;
    let (input, _color_map_bits) = le_u8(input)?;
    let (input, _x_start) = le_u16(input)?;
    let (input, _y_start) = le_u16(input)?;
    let (input, width) = le_u16(input)?;
    let (input, height) = le_u16(input)?;
    let (input, bits) = le_u8(input)?;
    let (input, _descriptor) = le_u8(input)?;

    Ok((
        input,
        TgaHeader {
            ident_size,
            image_type,
            width,
            height,
            bits,
        },
    ))
}

/// Decode an uncompressed true-color or greyscale TGA file.
pub fn decode_tga(data: &[u8]) -> ImageResult<Image> {
    let (rest, header) = parse_tga_header(data).map_err(|_| ImageError::Truncated {
        needed: TGA_HEADER_LEN,
        found: data.len(),
    })?;

    if header.image_type != TGA_TRUE_COLOR && header.image_type != TGA_GREY {
        return Err(ImageError::UnsupportedFormat(format!(
            "TGA image type {}",
            header.image_type
        )));
    }

    let format = match header.bits {
        8 => PixelFormat::Luminance,
        24 => PixelFormat::Bgr,
        32 => PixelFormat::Bgra,
        other => return Err(ImageError::UnsupportedDepth(other as u16)),
    };

    if header.width == 0 || header.height == 0 {
        return Err(ImageError::Malformed(format!(
            "TGA dimensions {}x{}",
            header.width, header.height
        )));
    }

    let pixel_len = header.width as usize * header.height as usize * format.bytes_per_pixel();
    let needed = TGA_HEADER_LEN + header.ident_size as usize + pixel_len;
    let body: IResult<&[u8], &[u8]> = take(header.ident_size as usize)(rest)
        .and_then(|(rest, _ident)| take(pixel_len)(rest));
    let (_, pixels) = body.map_err(|_| ImageError::Truncated {
        needed,
        found: data.len(),
    })?;

    debug!(width = header.width, height = header.height, bits = header.bits, "decoded TGA");

    Ok(Image {
        width: header.width as u32,
        height: header.height as u32,
        format,
        pixels: pixels.to_vec(),
    })
}

/// Encode bottom-up BGR pixels as a 24-bit uncompressed TGA file.
pub fn encode_tga(width: u16, height: u16, bgr: &[u8]) -> ImageResult<Vec<u8>> {
    let pixel_len = width as usize * height as usize * 3;
    if bgr.len() < pixel_len {
        return Err(ImageError::Truncated {
            needed: pixel_len,
            found: bgr.len(),
        });
    }

    let mut out = Vec::with_capacity(TGA_HEADER_LEN + pixel_len);
    out.push(0); // ident size
    out.push(0); // color map type
    out.push(TGA_TRUE_COLOR);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.push(0);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.push(24);
    out.push(0);
    out.extend_from_slice(&bgr[..pixel_len]);
    Ok(out)
}

#[derive(Debug)]
struct BmpHeader {
    offset: u32,
    width: i32,
    height: i32,
    bits: u16,
    compression: u32,
    image_size: u32,
}

fn parse_bmp_header(input: &[u8]) -> IResult<&[u8], BmpHeader> {
    let (input, _) = tag(&b"BM"[..])(input)?;
    let (input, _file_size) = le_u32(input)?;
    let (input, _reserved1) = le_u16(input)?;
    let (input, _reserved2) = le_u16(input)?;
    let (input, offset) = le_u32(input)?;

    let (input, _info_size) = le_u32(input)?;
    let (input, width) = le_i32(input)?;
    let (input, height) = le_i32(input)?;
    let (input, _planes) = le_u16(input)?;
    let (input, bits) = le_u16(input)?;
    let (input, compression) = le_u32(input)?;
    let (input, image_size) = le_u32(input)?;
    let (input, _x_pixels_per_meter) = le_i32(input)?;
    let (input, _y_pixels_per_meter) = le_i32(input)?;
    let (input, _colors) = le_u32(input)?;
    let (input, _important_colors) = le_u32(input)?;

    Ok((
        input,
        BmpHeader {
            offset,
            width,
            height,
            bits,
            compression,
            image_size,
        },
    ))
}

/// Decode an uncompressed 24-bit BMP file.
///
/// Rows are returned bottom-up without their 4-byte padding, whichever
/// direction the file stores them in.
pub fn decode_bmp(data: &[u8]) -> ImageResult<Image> {
    if !data.starts_with(b"BM") {
        return Err(ImageError::UnsupportedFormat("missing BM signature".to_string()));
    }
    let (_, header) = parse_bmp_header(data).map_err(|_| ImageError::Truncated {
        needed: BMP_FILE_HEADER_LEN + BMP_INFO_HEADER_LEN,
        found: data.len(),
    })?;

    if header.bits != 24 {
        return Err(ImageError::UnsupportedDepth(header.bits));
    }
    if header.compression != 0 {
        return Err(ImageError::UnsupportedFormat(format!(
            "BMP compression {}",
            header.compression
        )));
    }
    if header.width <= 0 || header.height == 0 {
        return Err(ImageError::Malformed(format!(
            "BMP dimensions {}x{}",
            header.width, header.height
        )));
    }

    let width = header.width as usize;
    let height = header.height.unsigned_abs() as usize;
    let row_len = (width * header.bits as usize + 7) / 8;
    let padded_row_len = (row_len + 3) & !3;

    let declared = match header.image_size {
        0 => row_len * height,
        size => size as usize,
    };
    let start = header.offset as usize;
    let available = data.len().saturating_sub(start).min(declared.max(padded_row_len * height));

    let stride = if available >= padded_row_len * height {
        padded_row_len
    } else if available >= row_len * height {
        row_len
    } else {
        return Err(ImageError::Truncated {
            needed: start + row_len * height,
            found: data.len(),
        });
    };

    let body = &data[start..];
    let mut pixels = Vec::with_capacity(row_len * height);
    for row in 0..height {
        // Negative height marks a top-down file
        let source_row = if header.height < 0 { height - 1 - row } else { row };
        let begin = source_row * stride;
        pixels.extend_from_slice(&body[begin..begin + row_len]);
    }

    debug!(width, height, "decoded BMP");

    Ok(Image {
        width: width as u32,
        height: height as u32,
        format: PixelFormat::Bgr,
        pixels,
    })
}

pub fn read_tga_file<P: AsRef<Path>>(path: P) -> ImageResult<Image> {
    decode_tga(&fs::read(path)?)
}

pub fn read_bmp_file<P: AsRef<Path>>(path: P) -> ImageResult<Image> {
    decode_bmp(&fs::read(path)?)
}

/// Pick the decoder from the file extension, falling back to the BMP
/// signature.
pub fn read_image_file<P: AsRef<Path>>(path: P) -> ImageResult<Image> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let is_tga = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("tga"))
        .unwrap_or(false);

    if is_tga || !data.starts_with(b"BM") {
        decode_tga(&data)
    } else {
        decode_bmp(&data)
    }
}

pub fn write_tga_file<P: AsRef<Path>>(path: P, width: u16, height: u16, bgr: &[u8]) -> ImageResult<()> {
    fs::write(path, encode_tga(width, height, bgr)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bmp_file(width: i32, height: i32, rows: &[&[u8]], padded: bool) -> Vec<u8> {
        let mut pixels = Vec::new();
        for row in rows {
            pixels.extend_from_slice(row);
            if padded {
                let pad = (4 - row.len() % 4) % 4;
                pixels.extend(std::iter::repeat(0u8).take(pad));
            }
        }

        let offset = (BMP_FILE_HEADER_LEN + BMP_INFO_HEADER_LEN) as u32;
        let mut data = Vec::new();
        data.extend_from_slice(b"BM");
        data.extend_from_slice(&(offset + pixels.len() as u32).to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&40u32.to_le_bytes());
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&24u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(pixels.len() as u32).to_le_bytes());
        data.extend_from_slice(&[0; 16]);
        data.extend_from_slice(&pixels);
        data
    }

    #[test]
    fn test_tga_encode_then_decode() {
        let bgr = [0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255];
        let encoded = encode_tga(2, 2, &bgr).unwrap();
        assert_eq!(encoded.len(), TGA_HEADER_LEN + bgr.len());
        assert_eq!(encoded[2], TGA_TRUE_COLOR);
        assert_eq!(encoded[16], 24);

        let image = decode_tga(&encoded).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.format, PixelFormat::Bgr);
        assert_eq!(image.pixels, bgr);
    }

    #[test]
    fn test_tga_skips_ident_and_reads_grey() {
        let mut data = vec![0u8; TGA_HEADER_LEN];
        data[0] = 3;
        data[2] = TGA_GREY;
        data[12] = 2;
        data[14] = 1;
        data[16] = 8;
        data.extend_from_slice(b"abc");
        data.extend_from_slice(&[10, 200]);

        let image = decode_tga(&data).unwrap();
        assert_eq!(image.format, PixelFormat::Luminance);
        assert_eq!(image.pixels, vec![10, 200]);
    }

    #[test]
    fn test_tga_rejections() {
        assert!(matches!(
            decode_tga(&[0u8; 10]),
            Err(ImageError::Truncated { needed: 18, found: 10 })
        ));

        let mut rle = encode_tga(1, 1, &[1, 2, 3]).unwrap();
        rle[2] = 10;
        assert!(matches!(decode_tga(&rle), Err(ImageError::UnsupportedFormat(_))));

        let mut deep = encode_tga(1, 1, &[1, 2, 3]).unwrap();
        deep[16] = 16;
        assert!(matches!(decode_tga(&deep), Err(ImageError::UnsupportedDepth(16))));

        let mut short = encode_tga(2, 2, &[0; 12]).unwrap();
        short.truncate(short.len() - 1);
        assert!(matches!(decode_tga(&short), Err(ImageError::Truncated { .. })));

        assert!(encode_tga(2, 2, &[0; 11]).is_err());
    }

    #[test]
    fn test_bmp_padded_rows() {
        let rows: [&[u8]; 2] = [&[1, 2, 3], &[4, 5, 6]];
        let image = decode_bmp(&bmp_file(1, 2, &rows, true)).unwrap();
        assert_eq!((image.width, image.height), (1, 2));
        assert_eq!(image.format, PixelFormat::Bgr);
        assert_eq!(image.pixels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_bmp_top_down_is_flipped() {
        let rows: [&[u8]; 2] = [&[1, 2, 3], &[4, 5, 6]];
        let image = decode_bmp(&bmp_file(1, -2, &rows, true)).unwrap();
        assert_eq!(image.pixels, vec![4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn test_bmp_rejections() {
        assert!(matches!(decode_bmp(b"GIF89a"), Err(ImageError::UnsupportedFormat(_))));
        assert!(matches!(decode_bmp(b"BM\0\0"), Err(ImageError::Truncated { .. })));

        let mut eight_bit = bmp_file(1, 1, &[&[1, 2, 3]], true);
        eight_bit[28] = 8;
        assert!(matches!(decode_bmp(&eight_bit), Err(ImageError::UnsupportedDepth(8))));

        let mut short = bmp_file(2, 2, &[&[0; 6], &[0; 6]], false);
        short.truncate(short.len() - 4);
        assert!(matches!(decode_bmp(&short), Err(ImageError::Truncated { .. })));
    }

    #[test]
    fn test_luminance_sampling_wraps() {
        let image = Image {
            width: 2,
            height: 1,
            format: PixelFormat::Luminance,
            pixels: vec![0, 255],
        };
        assert_eq!(image.luminance_at(0.25, 0.0), 0.0);
        assert_eq!(image.luminance_at(0.75, 0.0), 1.0);
        assert_eq!(image.luminance_at(1.75, 3.5), 1.0);
        assert_eq!(image.luminance_at(-0.25, 0.0), 1.0);

        let white = Image {
            width: 1,
            height: 1,
            format: PixelFormat::Bgr,
            pixels: vec![255, 255, 255],
        };
        assert!((white.luminance_at(0.5, 0.5) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_file_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grab.tga");
        write_tga_file(&path, 1, 1, &[9, 8, 7]).unwrap();

        let image = read_tga_file(&path).unwrap();
        assert_eq!(image.pixels, vec![9, 8, 7]);
        assert_eq!(read_image_file(&path).unwrap(), image);

        let bmp_path = dir.path().join("tex.bmp");
        fs::write(&bmp_path, bmp_file(1, 1, &[&[1, 2, 3]], true)).unwrap();
        assert_eq!(read_bmp_file(&bmp_path).unwrap().pixels, vec![1, 2, 3]);
        assert_eq!(read_image_file(&bmp_path).unwrap().pixels, vec![1, 2, 3]);

        let missing = read_tga_file(dir.path().join("missing.tga"));
        assert!(matches!(missing, Err(ImageError::Io(_))));
    }
}
