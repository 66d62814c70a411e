//! Transparent annotation overlay
//!
//! The overlay holds only annotation pixels. It is sized to the page raster
//! and repainted from scratch from a stroke snapshot, so the same snapshot
//! always produces the same pixels.

use crate::annotation::{Point, Stroke};
use crate::strokes::StrokeSnapshot;
use image::{imageops, Pixel, Rgba};
use pdf_engine::RgbaImage;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// RGBA surface aligned with the page raster.
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    image: RgbaImage,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, TRANSPARENT),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Match the raster dimensions. The surface is cleared when it changes
    /// size; callers repaint afterwards.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::from_pixel(width, height, TRANSPARENT);
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    /// Clear the surface and draw every ink stroke of `snapshot` in order.
    pub fn repaint(&mut self, snapshot: &StrokeSnapshot) {
        self.clear();
        for stroke in snapshot.ink() {
            self.draw_stroke(stroke);
        }
    }

    /// The page raster with the overlay blended on top. Overlay pixels
    /// outside the page are dropped.
    pub fn composite_onto(&self, page: &RgbaImage) -> RgbaImage {
        let mut out = page.clone();
        imageops::overlay(&mut out, &self.image, 0, 0);
        out
    }

    /// Round-capped, anti-aliased line. Coverage falls off over one pixel at
    /// the edge of the stroke.
    fn draw_stroke(&mut self, stroke: &Stroke) {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let half = stroke.width() / 2.0;
        let (min_x, min_y, max_x, max_y) = stroke.bounding_box();
        let x0 = (min_x - 1.0).floor().max(0.0) as u32;
        let y0 = (min_y - 1.0).floor().max(0.0) as u32;
        let x1 = ((max_x + 1.0).ceil().max(0.0) as u32).min(width - 1);
        let y1 = ((max_y + 1.0).ceil().max(0.0) as u32).min(height - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        let color = stroke.color();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let coverage = (half + 0.5 - stroke.distance_to(&center)).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let alpha = (coverage * 255.0).round() as u8;
                self.image
                    .get_pixel_mut(x, y)
                    .blend(&Rgba([color.r, color.g, color.b, alpha]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Color;
    use crate::strokes::StrokeSequence;

    fn sequence() -> StrokeSequence {
        let mut sequence = StrokeSequence::new();
        sequence.push(
            Stroke::ink(Color::RED, 4.0, Point::new(10.0, 10.0), Point::new(50.0, 10.0)).unwrap(),
        );
        sequence.push(
            Stroke::ink(Color::BLACK, 6.0, Point::new(50.0, 10.0), Point::new(50.0, 60.0)).unwrap(),
        );
        sequence
    }

    #[test]
    fn test_repaint_is_idempotent() {
        let snapshot = sequence().snapshot();
        let mut overlay = OverlaySurface::new(80, 80);

        overlay.repaint(&snapshot);
        let first = overlay.image().clone();
        overlay.repaint(&snapshot);

        assert_eq!(overlay.image().as_raw(), first.as_raw());
    }

    #[test]
    fn test_strokes_paint_their_color() {
        let mut overlay = OverlaySurface::new(80, 80);
        overlay.repaint(&sequence().snapshot());

        assert_eq!(*overlay.image().get_pixel(30, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(*overlay.image().get_pixel(50, 40), Rgba([0, 0, 0, 255]));
        assert_eq!(overlay.image().get_pixel(30, 40)[3], 0);
        assert_eq!(overlay.image().get_pixel(75, 75)[3], 0);
    }

    #[test]
    fn test_round_cap_extends_past_endpoint() {
        let mut overlay = OverlaySurface::new(80, 80);
        overlay.repaint(&sequence().snapshot());

        // One pixel left of the start point is inside the cap, a square
        // corner of the cap's bounding box is not.
        assert!(overlay.image().get_pixel(8, 10)[3] > 0);
        assert_eq!(overlay.image().get_pixel(7, 7)[3], 0);
    }

    #[test]
    fn test_empty_snapshot_clears_surface() {
        let mut overlay = OverlaySurface::new(80, 80);
        overlay.repaint(&sequence().snapshot());
        overlay.repaint(&StrokeSequence::new().snapshot());

        assert!(overlay.image().pixels().all(|pixel| pixel[3] == 0));
    }

    #[test]
    fn test_strokes_outside_surface_are_clipped() {
        let mut sequence = StrokeSequence::new();
        sequence.push(
            Stroke::ink(Color::RED, 4.0, Point::new(-50.0, -50.0), Point::new(200.0, 200.0)).unwrap(),
        );
        sequence.push(
            Stroke::ink(Color::RED, 4.0, Point::new(500.0, 500.0), Point::new(600.0, 600.0)).unwrap(),
        );

        let mut overlay = OverlaySurface::new(20, 20);
        overlay.repaint(&sequence.snapshot());
        assert_eq!(overlay.image().get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn test_resize_matches_raster() {
        let mut overlay = OverlaySurface::new(10, 10);
        overlay.resize(30, 40);
        assert_eq!(overlay.dimensions(), (30, 40));
    }

    #[test]
    fn test_composite_onto_page() {
        let page = RgbaImage::from_pixel(80, 80, Rgba([255, 255, 255, 255]));
        let mut overlay = OverlaySurface::new(80, 80);
        overlay.repaint(&sequence().snapshot());

        let composed = overlay.composite_onto(&page);
        assert_eq!(*composed.get_pixel(30, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(*composed.get_pixel(70, 70), Rgba([255, 255, 255, 255]));
    }
}
