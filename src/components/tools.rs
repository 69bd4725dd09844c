// ============================================================================
// TOOLS — brush model, stroke rasterizer, flood fill
// ============================================================================
//
// The rasterizer draws onto a scratch surface the size of the canvas; the
// finished scratch is handed to the layer store as a single bitmap (paint or
// erase).  Flood fill produces a full replacement buffer for the store's
// overwrite path.  Neither mutates a layer directly.

use image::{Rgba, RgbaImage};

use crate::input::StrokeSample;

/// Active tool.  Fill and Picker are one-shot (pointer-down) tools; Brush
/// and Eraser consume the whole stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Fill,
    Picker,
}

/// Shared brush state.  Read-only during a stroke, mutable between strokes.
#[derive(Clone, Copy, Debug)]
pub struct BrushSettings {
    /// Base size in pixels (the radius unit for the pressure curve).
    pub size: f32,
    pub color: [u8; 3],
    pub opacity: f32,
    /// Placeholder — carried for the tuning surface, not yet applied.
    pub hardness: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: [20, 20, 20],
            opacity: 1.0,
            hardness: 1.0,
        }
    }
}

/// Pressure/tilt-driven radius.
///
/// Pressure is squared before the ramp for a convex response curve — finer
/// control at low pressure.  At p=0 the radius is 0.2x the base size, at
/// p=1 it is 2.0x.  The brush (not the eraser) additionally widens by up to
/// +50% with stylus tilt; the eraser ignores dynamics entirely.
pub fn effective_radius(tool: Tool, brush: &BrushSettings, sample: &StrokeSample) -> f32 {
    if tool == Tool::Eraser {
        return brush.size;
    }
    let p = sample.pressure.clamp(0.0, 1.0);
    let mut radius = brush.size * (0.2 + 1.8 * p * p);
    let tilt_mag = (sample.tilt_x * sample.tilt_x + sample.tilt_y * sample.tilt_y).sqrt();
    let tilt_factor = (tilt_mag / 45.0).min(1.0);
    radius *= 1.0 + 0.5 * tilt_factor;
    radius
}

/// Rasterizes one stroke at a time onto a canvas-sized scratch surface.
pub struct StrokeRasterizer {
    scratch: RgbaImage,
    active: bool,
}

impl StrokeRasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            scratch: RgbaImage::new(width, height),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Live in-progress stroke content, for preview rendering.
    pub fn scratch(&self) -> &RgbaImage {
        &self.scratch
    }

    pub fn begin_stroke(&mut self, sample: &StrokeSample, tool: Tool, brush: &BrushSettings) {
        if self.active {
            // A begin without a matching finish: drop the stale content.
            self.clear();
        }
        self.active = true;
        self.stamp(sample, tool, brush);
    }

    /// Render the segment between two consecutive samples as a round-capped,
    /// round-joined line: circle stamps at sub-radius spacing along the
    /// straight segment, with pressure and tilt interpolated.  No curve
    /// fitting — coalesced high-frequency samples make straight segments the
    /// accepted precision model.
    pub fn extend_stroke(
        &mut self,
        prev: &StrokeSample,
        next: &StrokeSample,
        tool: Tool,
        brush: &BrushSettings,
    ) {
        if !self.active {
            self.begin_stroke(prev, tool, brush);
        }
        let dx = next.x - prev.x;
        let dy = next.y - prev.y;
        let dist = (dx * dx + dy * dy).sqrt();
        let min_radius = effective_radius(tool, brush, prev)
            .min(effective_radius(tool, brush, next))
            .max(0.5);
        let spacing = (min_radius * 0.35).max(0.75);
        let steps = (dist / spacing).ceil().max(1.0) as u32;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let sample = StrokeSample {
                x: prev.x + dx * t,
                y: prev.y + dy * t,
                pressure: prev.pressure + (next.pressure - prev.pressure) * t,
                tilt_x: prev.tilt_x + (next.tilt_x - prev.tilt_x) * t,
                tilt_y: prev.tilt_y + (next.tilt_y - prev.tilt_y) * t,
            };
            self.stamp(&sample, tool, brush);
        }
    }

    /// Hand off the finished stroke bitmap and clear the scratch surface.
    /// Returns None when no stroke is in flight.
    pub fn finish_stroke(&mut self) -> Option<RgbaImage> {
        if !self.active {
            return None;
        }
        self.active = false;
        let (w, h) = (self.scratch.width(), self.scratch.height());
        Some(std::mem::replace(&mut self.scratch, RgbaImage::new(w, h)))
    }

    /// Discard the in-flight stroke (gesture onset, editor close).
    pub fn cancel_stroke(&mut self) {
        if self.active {
            self.clear();
            self.active = false;
        }
    }

    fn clear(&mut self) {
        for px in self.scratch.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Stamp one circle.  Max-alpha stamping: a pixel keeps the strongest
    /// coverage any stamp gave it, so overlapping stamps within one stroke
    /// never build up past the brush opacity.
    fn stamp(&mut self, sample: &StrokeSample, tool: Tool, brush: &BrushSettings) {
        let radius = effective_radius(tool, brush, sample).max(0.5);
        // The eraser mask is opaque; the merge path reads only its alpha.
        let stroke_alpha = if tool == Tool::Eraser {
            1.0
        } else {
            brush.opacity.clamp(0.0, 1.0)
        };
        if stroke_alpha <= 0.0 {
            return;
        }
        let (w, h) = (self.scratch.width(), self.scratch.height());
        let (cx, cy) = (sample.x, sample.y);

        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = ((cx + radius).ceil() as i64).clamp(0, w as i64 - 1) as u32;
        let max_y = ((cy + radius).ceil() as i64).clamp(0, h as i64 - 1) as u32;
        if min_x > max_x || min_y > max_y {
            return;
        }

        let [r, g, b] = brush.color;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > radius + 0.5 {
                    continue;
                }
                // One-pixel antialiased rim.
                let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
                let alpha = (coverage * stroke_alpha * 255.0 + 0.5) as u8;
                if alpha == 0 {
                    continue;
                }
                let existing = self.scratch.get_pixel(x, y)[3];
                if alpha > existing {
                    self.scratch.put_pixel(x, y, Rgba([r, g, b, alpha]));
                }
            }
        }
    }
}

// ============================================================================
// FLOOD FILL — stack-based scanline fill, exact RGBA match
// ============================================================================

/// Scanline flood fill from `(start_x, start_y)`.
///
/// Returns the full updated buffer, or None when the operation is a no-op:
/// out-of-bounds seed, or the seed pixel already equals `fill` exactly
/// (which also makes the fill idempotent).
///
/// For each popped seed the row is scanned left to the span start, then
/// recolored rightward; the rows above and below are pushed once per
/// contiguous matching span (not once per pixel), bounding stack growth.
/// Matching is exact 4-channel equality — no tolerance, no feathering.
pub fn flood_fill(
    buffer: &RgbaImage,
    start_x: u32,
    start_y: u32,
    fill: Rgba<u8>,
) -> Option<RgbaImage> {
    let w = buffer.width();
    let h = buffer.height();
    if start_x >= w || start_y >= h {
        return None;
    }
    let target = *buffer.get_pixel(start_x, start_y);
    if target == fill {
        return None;
    }

    let mut out = buffer.clone();
    let wu = w as usize;

    // Flat-index access into the raw RGBA buffer.
    #[inline(always)]
    fn pix(raw: &[u8], idx: usize) -> [u8; 4] {
        let o = idx * 4;
        [raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]
    }
    #[inline(always)]
    fn put(raw: &mut [u8], idx: usize, px: [u8; 4]) {
        let o = idx * 4;
        raw[o..o + 4].copy_from_slice(&px);
    }

    let tc = target.0;
    let fc = fill.0;
    let raw = out.as_mut();

    // Seed stack stores packed flat indices (y * w + x).
    let mut stack: Vec<u32> = Vec::with_capacity(1024);
    stack.push(start_y * w + start_x);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        if pix(raw, idx) != tc {
            continue; // already recolored via an earlier span
        }
        let y = idx / wu;
        let x = idx % wu;

        // Scan left to the start of the matching span.
        let row_base = y * wu;
        let mut x0 = x;
        while x0 > 0 && pix(raw, row_base + x0 - 1) == tc {
            x0 -= 1;
        }

        // Recolor rightward; push one seed per contiguous span above/below.
        let mut span_above = false;
        let mut span_below = false;
        let mut xi = x0;
        while xi < wu && pix(raw, row_base + xi) == tc {
            put(raw, row_base + xi, fc);

            if y > 0 {
                let above = row_base - wu + xi;
                if pix(raw, above) == tc {
                    if !span_above {
                        stack.push(above as u32);
                        span_above = true;
                    }
                } else {
                    span_above = false;
                }
            }
            if y + 1 < h as usize {
                let below = row_base + wu + xi;
                if pix(raw, below) == tc {
                    if !span_below {
                        stack.push(below as u32);
                        span_below = true;
                    }
                } else {
                    span_below = false;
                }
            }
            xi += 1;
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f32, y: f32, pressure: f32) -> StrokeSample {
        StrokeSample {
            x,
            y,
            pressure,
            tilt_x: 0.0,
            tilt_y: 0.0,
        }
    }

    // ---- radius model ------------------------------------------------------

    #[test]
    fn radius_endpoints_and_monotonicity() {
        let brush = BrushSettings {
            size: 10.0,
            ..Default::default()
        };
        let r0 = effective_radius(Tool::Brush, &brush, &sample(0.0, 0.0, 0.0));
        let r1 = effective_radius(Tool::Brush, &brush, &sample(0.0, 0.0, 1.0));
        assert!((r0 - 2.0).abs() < 1e-5, "p=0 radius {}", r0);
        assert!((r1 - 20.0).abs() < 1e-5, "p=1 radius {}", r1);

        let mut last = 0.0;
        for i in 0..=100 {
            let p = i as f32 / 100.0;
            let r = effective_radius(Tool::Brush, &brush, &sample(0.0, 0.0, p));
            assert!(r >= last, "radius not monotonic at p={}", p);
            last = r;
        }
    }

    #[test]
    fn eraser_ignores_pressure_and_tilt() {
        let brush = BrushSettings {
            size: 12.0,
            ..Default::default()
        };
        for p in [0.0, 0.3, 1.0] {
            let mut s = sample(0.0, 0.0, p);
            s.tilt_x = 60.0;
            s.tilt_y = 30.0;
            assert_eq!(effective_radius(Tool::Eraser, &brush, &s), 12.0);
        }
    }

    #[test]
    fn tilt_widens_brush_up_to_half() {
        let brush = BrushSettings {
            size: 10.0,
            ..Default::default()
        };
        let flat = effective_radius(Tool::Brush, &brush, &sample(0.0, 0.0, 0.5));
        let mut tilted = sample(0.0, 0.0, 0.5);
        tilted.tilt_x = 45.0;
        let r45 = effective_radius(Tool::Brush, &brush, &tilted);
        assert!((r45 / flat - 1.5).abs() < 1e-5);
        // Tilt magnitude caps at 45 degrees of combined tilt.
        tilted.tilt_x = 90.0;
        tilted.tilt_y = 90.0;
        let extreme = effective_radius(Tool::Brush, &brush, &tilted);
        assert!((extreme / flat - 1.5).abs() < 1e-5);
    }

    // ---- stroke rasterization ---------------------------------------------

    #[test]
    fn horizontal_stroke_paints_a_band() {
        let brush = BrushSettings {
            size: 10.0,
            color: [255, 0, 0],
            opacity: 1.0,
            hardness: 1.0,
        };
        let mut raster = StrokeRasterizer::new(100, 100);
        let a = sample(10.0, 50.0, 1.0);
        let b = sample(50.0, 50.0, 1.0);
        raster.begin_stroke(&a, Tool::Brush, &brush);
        raster.extend_stroke(&a, &b, Tool::Brush, &brush);
        let bmp = raster.finish_stroke().expect("stroke was active");

        // p=1 radius is 2x the base size.
        let radius = 20.0_f32;
        // Non-transparent pixels along the whole 40px band.
        for x in (10..=50).step_by(5) {
            assert!(bmp.get_pixel(x, 50)[3] > 0, "hole at x={}", x);
        }
        // Nothing outside the stroke's bounding box (+1px AA rim).
        for (x, y, px) in bmp.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;
            let inside = fx >= 10.0 - radius - 1.0
                && fx <= 50.0 + radius + 1.0
                && fy >= 50.0 - radius - 1.0
                && fy <= 50.0 + radius + 1.0;
            assert!(inside, "paint outside bounds at ({}, {})", x, y);
        }
    }

    #[test]
    fn finish_clears_scratch_and_deactivates() {
        let brush = BrushSettings::default();
        let mut raster = StrokeRasterizer::new(32, 32);
        raster.begin_stroke(&sample(16.0, 16.0, 1.0), Tool::Brush, &brush);
        assert!(raster.is_active());
        let bmp = raster.finish_stroke().unwrap();
        assert!(bmp.pixels().any(|p| p[3] > 0));
        assert!(!raster.is_active());
        assert!(raster.scratch().pixels().all(|p| p[3] == 0));
        assert!(raster.finish_stroke().is_none());
    }

    #[test]
    fn cancel_discards_partial_content() {
        let brush = BrushSettings::default();
        let mut raster = StrokeRasterizer::new(32, 32);
        raster.begin_stroke(&sample(16.0, 16.0, 1.0), Tool::Brush, &brush);
        raster.cancel_stroke();
        assert!(!raster.is_active());
        assert!(raster.scratch().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn stamps_do_not_exceed_brush_opacity() {
        let brush = BrushSettings {
            size: 8.0,
            color: [0, 0, 255],
            opacity: 0.5,
            hardness: 1.0,
        };
        let mut raster = StrokeRasterizer::new(64, 64);
        let a = sample(20.0, 20.0, 1.0);
        let b = sample(24.0, 20.0, 1.0);
        raster.begin_stroke(&a, Tool::Brush, &brush);
        // Heavily overlapping stamps must not accumulate alpha.
        for _ in 0..10 {
            raster.extend_stroke(&a, &b, Tool::Brush, &brush);
        }
        let bmp = raster.finish_stroke().unwrap();
        let max_alpha = bmp.pixels().map(|p| p[3]).max().unwrap();
        assert!(max_alpha <= 128, "alpha stacked to {}", max_alpha);
    }

    // ---- flood fill --------------------------------------------------------

    #[test]
    fn fill_is_idempotent() {
        let red = Rgba([255, 0, 0, 255]);
        let buf = RgbaImage::from_pixel(16, 16, red);
        assert!(flood_fill(&buf, 4, 4, red).is_none());
    }

    #[test]
    fn fill_transparent_buffer_recolors_everything() {
        let buf = RgbaImage::new(50, 50);
        let red = Rgba([255, 0, 0, 255]);
        let out = flood_fill(&buf, 0, 0, red).expect("fill should run");
        assert!(out.pixels().all(|p| *p == red));
        assert_eq!(out.pixels().count(), 2500);
    }

    #[test]
    fn fill_respects_closed_region_boundary() {
        // A 20x20 canvas with a vertical wall at x=10.
        let mut buf = RgbaImage::new(20, 20);
        let wall = Rgba([0, 0, 0, 255]);
        for y in 0..20 {
            buf.put_pixel(10, y, wall);
        }
        let green = Rgba([0, 255, 0, 255]);
        let out = flood_fill(&buf, 2, 2, green).unwrap();
        // Left of the wall: recolored.  Wall and right side: untouched.
        for y in 0..20 {
            for x in 0..10 {
                assert_eq!(*out.get_pixel(x, y), green, "({}, {})", x, y);
            }
            assert_eq!(*out.get_pixel(10, y), wall);
            for x in 11..20 {
                assert_eq!(*out.get_pixel(x, y), Rgba([0, 0, 0, 0]), "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn fill_handles_concave_regions() {
        // U-shape: walls on a ring except a gap, fill must flow around.
        let mut buf = RgbaImage::new(10, 10);
        let wall = Rgba([9, 9, 9, 255]);
        for x in 2..8 {
            buf.put_pixel(x, 4, wall); // horizontal bar with open ends
        }
        let blue = Rgba([0, 0, 255, 255]);
        let out = flood_fill(&buf, 0, 0, blue).unwrap();
        // Fill flows around both open ends of the bar.
        assert_eq!(*out.get_pixel(5, 8), blue);
        assert_eq!(*out.get_pixel(5, 0), blue);
        assert_eq!(*out.get_pixel(5, 4), wall);
    }

    #[test]
    fn fill_requires_exact_match() {
        let mut buf = RgbaImage::from_pixel(8, 8, Rgba([100, 100, 100, 255]));
        // One near-miss pixel differing by a single channel step.
        buf.put_pixel(4, 4, Rgba([100, 100, 101, 255]));
        let white = Rgba([255, 255, 255, 255]);
        let out = flood_fill(&buf, 0, 0, white).unwrap();
        assert_eq!(*out.get_pixel(4, 4), Rgba([100, 100, 101, 255]));
        assert_eq!(*out.get_pixel(3, 4), white);
    }

    #[test]
    fn fill_out_of_bounds_seed_is_noop() {
        let buf = RgbaImage::new(8, 8);
        assert!(flood_fill(&buf, 8, 0, Rgba([1, 2, 3, 255])).is_none());
    }
}
