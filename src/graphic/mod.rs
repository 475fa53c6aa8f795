pub mod decoder;

pub use decoder::{AnimatedRawImage, DecodedImage, RawImage, decode};

use crate::terminal::host::{DrawSurface, PixelRect};
use crate::utils::Result;
use std::path::Path;

/// Display time used for frames that declare no delay
const DEFAULT_FRAME_SECONDS: f64 = 0.1;

/// A decoded image ready to be blitted onto the console window
#[derive(Debug, Clone)]
pub enum Graphic {
    Still(StillImage),
    Animated(Animation),
}

#[derive(Debug, Clone)]
pub struct StillImage {
    pixels: Vec<u32>,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
pub struct Animation {
    /// All frames, back to back, in surface pixel format
    frames: Vec<u32>,
    width: u32,
    height: u32,
    durations: Vec<f64>,
    cycle: f64,
    elapsed: f64,
    frame: usize,
    shown: usize,
}

impl Graphic {
    /// Decode the file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_decoded(decode(path)?))
    }

    pub fn from_decoded(decoded: DecodedImage) -> Self {
        match decoded {
            DecodedImage::Still(raw) => Self::Still(StillImage {
                pixels: to_surface_pixels(&raw.pixels),
                width: raw.width,
                height: raw.height,
            }),
            DecodedImage::Animated(raw) => {
                let durations = raw
                    .delays_ms
                    .iter()
                    .map(|&ms| f64::from(ms) / 1000.0)
                    .collect();
                Self::Animated(Animation::new(
                    raw.width,
                    raw.height,
                    to_surface_pixels(&raw.pixels),
                    durations,
                ))
            }
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Still(image) => image.width,
            Self::Animated(anim) => anim.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Still(image) => image.height,
            Self::Animated(anim) => anim.height,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width()) / f64::from(self.height())
    }

    /// Advance the animation clock by `dt` seconds.
    ///
    /// Returns whether the displayed frame changed and needs to be drawn again.
    pub fn update(&mut self, dt: f64) -> bool {
        match self {
            Self::Still(_) => false,
            Self::Animated(anim) => anim.advance(dt),
        }
    }

    /// Stretch the current frame into `dest` on the window surface
    pub fn render(&self, surface: &mut dyn DrawSurface, dest: PixelRect) {
        let pixels = match self {
            Self::Still(image) => &image.pixels[..],
            Self::Animated(anim) => anim.current_frame(),
        };
        surface.stretch_blit(pixels, self.width(), self.height(), dest);
    }
}

impl Animation {
    /// Build an animation from `durations.len()` frames of `width` x `height`
    /// packed pixels. Non-positive durations fall back to 100 ms.
    pub fn new(width: u32, height: u32, frames: Vec<u32>, durations: Vec<f64>) -> Self {
        debug_assert!(!durations.is_empty());
        debug_assert_eq!(frames.len(), width as usize * height as usize * durations.len());

        let durations: Vec<f64> = durations
            .into_iter()
            .map(|d| if d > 0.0 { d } else { DEFAULT_FRAME_SECONDS })
            .collect();
        let cycle = durations.iter().sum();

        Self {
            frames,
            width,
            height,
            durations,
            cycle,
            elapsed: 0.0,
            frame: 0,
            shown: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.durations.len()
    }

    pub fn frame_index(&self) -> usize {
        self.frame
    }

    fn advance(&mut self, dt: f64) -> bool {
        if !dt.is_finite() || dt <= 0.0 {
            return false;
        }

        self.elapsed += dt;

        // Whole cycles land on the same frame; skip them after a long stall
        if self.elapsed >= self.cycle {
            self.elapsed %= self.cycle;
        }

        while self.elapsed >= self.durations[self.frame] {
            self.elapsed -= self.durations[self.frame];
            self.frame = (self.frame + 1) % self.durations.len();
        }

        let changed = self.frame != self.shown;
        self.shown = self.frame;
        changed
    }

    fn current_frame(&self) -> &[u32] {
        let len = self.width as usize * self.height as usize;
        &self.frames[self.frame * len..(self.frame + 1) * len]
    }
}

/// Pack RGBA bytes into the window surface's 0xAARRGGBB words (BGRA in memory)
fn to_surface_pixels(rgba: &[u8]) -> Vec<u32> {
    rgba.chunks_exact(4)
        .map(|px| u32::from_le_bytes([px[2], px[1], px[0], px[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSurface {
        blits: Vec<(Vec<u32>, u32, u32, PixelRect)>,
    }

    impl DrawSurface for RecordingSurface {
        fn stretch_blit(&mut self, pixels: &[u32], src_width: u32, src_height: u32, dest: PixelRect) {
            self.blits.push((pixels.to_vec(), src_width, src_height, dest));
        }
    }

    /// 1x1 animation whose frame `i` is the pixel value `i`
    fn animation(durations: &[f64]) -> Graphic {
        let frames = (0..durations.len() as u32).collect();
        Graphic::Animated(Animation::new(1, 1, frames, durations.to_vec()))
    }

    fn frame_index(graphic: &Graphic) -> usize {
        match graphic {
            Graphic::Animated(anim) => anim.frame_index(),
            Graphic::Still(_) => 0,
        }
    }

    #[test]
    fn test_channels_swapped_once_at_load() {
        let graphic = Graphic::from_decoded(DecodedImage::Still(RawImage {
            pixels: vec![0x11, 0x22, 0x33, 0xFF],
            width: 1,
            height: 1,
        }));

        let mut surface = RecordingSurface::default();
        let dest = PixelRect { x: 0, y: 0, width: 1, height: 1 };
        graphic.render(&mut surface, dest);

        assert_eq!(surface.blits[0].0, vec![0xFF112233]);
    }

    #[test]
    fn test_still_never_changes() {
        let mut graphic = Graphic::from_decoded(DecodedImage::Still(RawImage {
            pixels: vec![0; 16],
            width: 2,
            height: 2,
        }));
        assert!(!graphic.update(0.5));
        assert!(!graphic.update(100.0));
    }

    #[test]
    fn test_aspect_ratio() {
        let graphic = Graphic::from_decoded(DecodedImage::Still(RawImage {
            pixels: vec![0; 64 * 32 * 4],
            width: 64,
            height: 32,
        }));
        assert_eq!(graphic.aspect_ratio(), 2.0);
        assert_eq!((100.0 * graphic.aspect_ratio()) as u32, 200);
    }

    #[test]
    fn test_advance_consumes_several_frames() {
        let mut graphic = animation(&[0.1, 0.2, 0.15]);
        assert!(graphic.update(0.35));
        assert_eq!(frame_index(&graphic), 2);
    }

    #[test]
    fn test_sub_frame_steps_report_no_change() {
        let mut graphic = animation(&[0.5, 0.5]);
        assert!(!graphic.update(0.125));
        assert!(!graphic.update(0.125));
        assert!(!graphic.update(0.125));
        assert_eq!(frame_index(&graphic), 0);
        assert!(graphic.update(0.125));
        assert_eq!(frame_index(&graphic), 1);
    }

    #[test]
    fn test_wraps_to_first_frame() {
        let mut graphic = animation(&[0.25, 0.25, 0.5]);
        assert!(graphic.update(0.5));
        assert_eq!(frame_index(&graphic), 2);
        assert!(graphic.update(0.5));
        assert_eq!(frame_index(&graphic), 0);

        let mut single = animation(&[0.25]);
        assert!(!single.update(0.75));
        assert_eq!(frame_index(&single), 0);
    }

    #[test]
    fn test_long_stall_terminates() {
        let mut graphic = animation(&[0.25, 0.25]);
        graphic.update(1.0e9 + 0.25);
        assert_eq!(frame_index(&graphic), 1);
    }

    #[test]
    fn test_zero_delay_frames_fall_back() {
        let mut graphic = animation(&[0.0, 0.0]);
        assert!(!graphic.update(0.05));
        assert!(graphic.update(0.05));
        assert_eq!(frame_index(&graphic), 1);
    }

    #[test]
    fn test_render_uses_current_frame() {
        let mut graphic = animation(&[0.25, 0.25, 0.25]);
        graphic.update(0.5);

        let mut surface = RecordingSurface::default();
        let dest = PixelRect { x: 8, y: 16, width: 20, height: 10 };
        graphic.render(&mut surface, dest);

        assert_eq!(surface.blits, vec![(vec![2], 1, 1, dest)]);
    }

    #[test]
    fn test_from_decoded_animation() {
        let graphic = Graphic::from_decoded(DecodedImage::Animated(AnimatedRawImage {
            pixels: vec![0; 2 * 2 * 4 * 3],
            width: 2,
            height: 2,
            frame_count: 3,
            delays_ms: vec![100, 0, 40],
        }));

        let Graphic::Animated(anim) = graphic else {
            panic!("expected an animation");
        };
        assert_eq!(anim.frame_count(), 3);
        assert_eq!(anim.durations, vec![0.1, DEFAULT_FRAME_SECONDS, 0.04]);
    }
}
