use crate::utils::{OverlayError, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Single decoded picture: RGBA, row-major, top row first
#[derive(Debug, Clone)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decoded animation: `frame_count` RGBA frames stored back to back
#[derive(Debug, Clone)]
pub struct AnimatedRawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    /// Display time of each frame in milliseconds
    pub delays_ms: Vec<u32>,
}

#[derive(Debug, Clone)]
pub enum DecodedImage {
    Still(RawImage),
    Animated(AnimatedRawImage),
}

/// Decode the image file at `path`, choosing the codec from its extension.
///
/// `gif` files go through the animation decoder; any other extension the
/// `image` crate knows is decoded as a still picture.
pub fn decode(path: &Path) -> Result<DecodedImage> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| OverlayError::decode(path, "missing file extension"))?;

    let file = File::open(path).map_err(|e| OverlayError::decode(path, e.to_string()))?;
    let reader = BufReader::new(file);

    if extension == "gif" {
        return decode_gif(path, reader);
    }

    let format = ImageFormat::from_extension(&extension)
        .ok_or_else(|| OverlayError::decode(path, format!("unsupported extension '{}'", extension)))?;

    let image = image::load(reader, format).map_err(|e| OverlayError::decode(path, e.to_string()))?;
    let rgba = image.to_rgba8();

    log::info!(
        "Decoded image {}: {}x{}",
        path.display(),
        rgba.width(),
        rgba.height()
    );

    Ok(DecodedImage::Still(RawImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    }))
}

fn decode_gif(path: &Path, reader: BufReader<File>) -> Result<DecodedImage> {
    let decoder = GifDecoder::new(reader).map_err(|e| OverlayError::decode(path, e.to_string()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| OverlayError::decode(path, e.to_string()))?;

    let Some(first) = frames.first() else {
        return Err(OverlayError::decode(path, "GIF has no frames"));
    };
    let (width, height) = first.buffer().dimensions();

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4 * frames.len());
    let mut delays_ms = Vec::with_capacity(frames.len());

    for frame in &frames {
        if frame.buffer().dimensions() != (width, height) {
            return Err(OverlayError::decode(path, "GIF frames differ in size"));
        }

        let (numer, denom) = frame.delay().numer_denom_ms();
        delays_ms.push(if denom > 0 { numer / denom } else { 0 });
        pixels.extend_from_slice(frame.buffer().as_raw());
    }

    log::info!(
        "Decoded GIF {}: {}x{}, {} frames",
        path.display(),
        width,
        height,
        frames.len()
    );

    // A single frame GIF is just a picture
    if frames.len() == 1 {
        return Ok(DecodedImage::Still(RawImage {
            pixels,
            width,
            height,
        }));
    }

    Ok(DecodedImage::Animated(AnimatedRawImage {
        pixels,
        width,
        height,
        frame_count: frames.len(),
        delays_ms,
    }))
}
