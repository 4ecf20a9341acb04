use crate::decoder::Frame;
use crate::{PlayerError, Result, PALETTE};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use log::debug;

/// Terminal cells are roughly twice as tall as they are wide
const CELL_ASPECT: f64 = 2.0;

/// One frame rendered as rows of palette glyphs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphGrid {
    /// Grid width in characters
    pub width: u32,
    /// Grid height in lines
    pub height: u32,
    /// Row-major glyphs, each row terminated by `\n`
    pub text: String,
}

impl GlyphGrid {
    /// Iterate over the rows without their terminators
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Compute the grid size for a frame of `src_width` x `src_height`
pub fn grid_dimensions(src_width: u32, src_height: u32, width: u32) -> (u32, u32) {
    let height = (width as f64 * src_height as f64 / src_width as f64 / CELL_ASPECT).round();
    (width, (height as u32).max(1))
}

/// Map an 8-bit luminance value onto the palette
pub fn palette_index(luminance: u8) -> usize {
    let normalized = luminance as f64 / 255.0;
    let index = (normalized * (PALETTE.len() - 1) as f64).floor() as usize;
    index.min(PALETTE.len() - 1)
}

/// Convert a decoded frame into a glyph grid `width` characters wide
pub fn frame_to_glyphs(frame: &Frame, width: u32) -> Result<GlyphGrid> {
    if frame.width == 0 || frame.height == 0 {
        return Err(PlayerError::InvalidFrame(format!(
            "zero-area frame {}x{}",
            frame.width, frame.height
        )));
    }
    if width == 0 {
        return Err(PlayerError::InvalidFrame(
            "target width must be greater than 0".to_string(),
        ));
    }

    let (target_width, target_height) = grid_dimensions(frame.width, frame.height, width);
    debug!(
        "Converting frame {}x{} ({} channels) to {}x{} glyphs",
        frame.width, frame.height, frame.channels, target_width, target_height
    );

    let luma = resized_luminance(frame, target_width, target_height)?;

    let mut text = String::with_capacity(((target_width + 1) * target_height) as usize);
    for row in luma.chunks(target_width as usize) {
        text.extend(row.iter().map(|&value| PALETTE[palette_index(value)]));
        text.push('\n');
    }

    Ok(GlyphGrid {
        width: target_width,
        height: target_height,
        text,
    })
}

/// Resize the frame with nearest-neighbour sampling and reduce it to one
/// luminance sample per output cell
fn resized_luminance(frame: &Frame, width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = frame.width as usize * frame.height as usize * frame.channels as usize;
    if frame.data.len() != expected {
        return Err(PlayerError::InvalidFrame(format!(
            "expected {} samples for {}x{}x{}, got {}",
            expected,
            frame.width,
            frame.height,
            frame.channels,
            frame.data.len()
        )));
    }

    let plane: Vec<u8> = match frame.channels {
        1 => resize(borrowed::<Luma<u8>>(frame)?, width, height).into_raw(),
        2 => resize(borrowed::<LumaA<u8>>(frame)?, width, height)
            .pixels()
            .map(|p| p.0[0])
            .collect(),
        3 => resize(borrowed::<Rgb<u8>>(frame)?, width, height)
            .pixels()
            .map(|p| calculate_luminance(p.0[0], p.0[1], p.0[2]))
            .collect(),
        4 => resize(borrowed::<Rgba<u8>>(frame)?, width, height)
            .pixels()
            .map(|p| calculate_luminance(p.0[0], p.0[1], p.0[2]))
            .collect(),
        n => {
            return Err(PlayerError::InvalidFrame(format!(
                "unsupported channel count {}",
                n
            )))
        }
    };

    Ok(plane)
}

/// View the frame samples as an image without copying them
fn borrowed<P: Pixel<Subpixel = u8>>(frame: &Frame) -> Result<ImageBuffer<P, &[u8]>> {
    ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice())
        .ok_or_else(|| PlayerError::InvalidFrame("sample buffer too small".to_string()))
}

fn resize<P: Pixel<Subpixel = u8> + 'static>(
    image: ImageBuffer<P, &[u8]>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>> {
    imageops::resize(&image, width, height, FilterType::Nearest)
}

/// Calculate luminance from RGB values
fn calculate_luminance(r: u8, g: u8, b: u8) -> u8 {
    // ITU-R BT.709 luma coefficients
    let luminance = 0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64;
    luminance.round().clamp(0.0, 255.0) as u8
}
