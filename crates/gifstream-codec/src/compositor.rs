use crate::blocks::ImageDescriptor;
use crate::palette::Palette;

/// Colour written for indices the active palette does not cover.
pub const OPAQUE_BLACK: u32 = 0xFF00_0000;

/// Per-frame composition counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeStats {
    /// Pixels written to the canvas.
    pub written: usize,
    /// Pixels left untouched because they carried the transparent index.
    pub transparent: usize,
    /// Pixels dropped for falling outside the canvas or the frame.
    pub clipped: usize,
    /// Pixels written as [`OPAQUE_BLACK`] because the index was out of range.
    pub fallback: usize,
}

/// Persistent ARGB pixel buffer for one stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u16,
    height: u16,
    pixels: Vec<u32>,
}

impl Canvas {
    /// A zeroed canvas (fully transparent black).
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; usize::from(width) * usize::from(height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Row-major ARGB pixels.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(usize::from(y) * usize::from(self.width) + usize::from(x))
            .copied()
    }

    /// Write one frame's index stream onto the canvas.
    ///
    /// Index `i` lands at `(left + i % width, top + i / width)`. Pixels
    /// outside the canvas are skipped, never wrapped. The transparent index
    /// leaves the existing pixel alone. Indices missing from `palette` (or
    /// any index when there is no palette) are written as [`OPAQUE_BLACK`].
    pub fn compose(
        &mut self,
        frame: &ImageDescriptor,
        indices: &[u8],
        palette: Option<&Palette>,
        transparent: Option<u8>,
    ) -> ComposeStats {
        let mut stats = ComposeStats::default();
        let frame_width = usize::from(frame.width);
        if frame_width == 0 {
            stats.clipped = indices.len();
            return stats;
        }

        let canvas_width = usize::from(self.width);
        let canvas_height = usize::from(self.height);
        let frame_height = usize::from(frame.height);

        for (i, &index) in indices.iter().enumerate() {
            let (x, y) = (i % frame_width, i / frame_width);
            let cx = usize::from(frame.left) + x;
            let cy = usize::from(frame.top) + y;
            if y >= frame_height || cx >= canvas_width || cy >= canvas_height {
                stats.clipped += 1;
                continue;
            }
            if transparent == Some(index) {
                stats.transparent += 1;
                continue;
            }

            let argb = match palette.and_then(|p| p.argb(index)) {
                Some(argb) => argb,
                None => {
                    stats.fallback += 1;
                    OPAQUE_BLACK
                }
            };
            self.pixels[cy * canvas_width + cx] = argb;
            stats.written += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: u32 = 0xFFFF_0000;
    const GREEN: u32 = 0xFF00_FF00;

    fn red_green() -> Palette {
        Palette::from_rgb([[255, 0, 0], [0, 255, 0]]).unwrap()
    }

    #[test]
    fn composes_full_frame() {
        let mut canvas = Canvas::new(2, 2);
        let stats = canvas.compose(
            &ImageDescriptor::new(0, 0, 2, 2),
            &[0, 1, 0, 1],
            Some(&red_green()),
            None,
        );
        assert_eq!(canvas.pixels(), &[RED, GREEN, RED, GREEN]);
        assert_eq!(stats.written, 4);
    }

    #[test]
    fn clips_out_of_canvas_pixels_without_wrapping() {
        let mut canvas = Canvas::new(3, 2);
        // 2x2 frame at x=2: only its left column fits.
        let stats = canvas.compose(
            &ImageDescriptor::new(2, 0, 2, 2),
            &[1, 0, 1, 0],
            Some(&red_green()),
            None,
        );
        assert_eq!(canvas.pixels(), &[0, 0, GREEN, 0, 0, GREEN]);
        assert_eq!(stats.written, 2);
        assert_eq!(stats.clipped, 2);
    }

    #[test]
    fn clips_rows_below_canvas() {
        let mut canvas = Canvas::new(2, 2);
        let stats = canvas.compose(
            &ImageDescriptor::new(0, 1, 2, 2),
            &[0, 0, 1, 1],
            Some(&red_green()),
            None,
        );
        assert_eq!(canvas.pixels(), &[0, 0, RED, RED]);
        assert_eq!(stats.clipped, 2);
    }

    #[test]
    fn transparent_index_keeps_previous_pixel() {
        let mut canvas = Canvas::new(2, 1);
        let frame = ImageDescriptor::new(0, 0, 2, 1);
        canvas.compose(&frame, &[0, 0], Some(&red_green()), None);
        let stats = canvas.compose(&frame, &[1, 0], Some(&red_green()), Some(0));
        assert_eq!(canvas.pixels(), &[GREEN, RED]);
        assert_eq!(stats.transparent, 1);
    }

    #[test]
    fn out_of_palette_index_is_opaque_black() {
        let mut canvas = Canvas::new(3, 1);
        let stats = canvas.compose(
            &ImageDescriptor::new(0, 0, 3, 1),
            &[1, 2, 255],
            Some(&red_green()),
            None,
        );
        assert_eq!(canvas.pixels(), &[GREEN, OPAQUE_BLACK, OPAQUE_BLACK]);
        assert_eq!(stats.fallback, 2);

        let mut bare = Canvas::new(1, 1);
        bare.compose(&ImageDescriptor::new(0, 0, 1, 1), &[0], None, None);
        assert_eq!(bare.pixel(0, 0), Some(OPAQUE_BLACK));
    }

    #[test]
    fn extra_indices_and_zero_width_are_dropped() {
        let mut canvas = Canvas::new(2, 2);
        let stats = canvas.compose(
            &ImageDescriptor::new(0, 0, 1, 1),
            &[0, 1, 1],
            Some(&red_green()),
            None,
        );
        assert_eq!(canvas.pixels(), &[RED, 0, 0, 0]);
        assert_eq!(stats.clipped, 2);

        let stats = canvas.compose(&ImageDescriptor::new(0, 0, 0, 5), &[1, 1], None, None);
        assert_eq!(stats.clipped, 2);
        assert_eq!(canvas.pixel(0, 0), Some(RED));
        assert_eq!(canvas.pixel(2, 0), None);
    }
}
