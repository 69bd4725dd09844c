// ============================================================================
// LAYER STORE — ordered raster layers + CPU compositing
// ============================================================================
//
// The store owns every layer's pixel buffer (one buffer slot per layer, the
// single-owner rule).  The stroke rasterizer and flood fill only *produce*
// bitmaps; the merge/overwrite entry points here are the only mutation paths.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// One raster layer.  `pixels` stays `None` until the first paint lands on
/// the layer, so untouched layers cost nothing to snapshot.
pub struct Layer {
    pub id: u64,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub pixels: Option<RgbaImage>,
}

impl Layer {
    pub fn new(id: u64, name: String) -> Self {
        Self {
            id,
            name,
            visible: true,
            opacity: 1.0,
            pixels: None,
        }
    }

    /// True if this layer has any pixel content.
    pub fn has_pixels(&self) -> bool {
        self.pixels.is_some()
    }
}

/// Standard unpremultiplied alpha-over: `src` composited on top of `dst`.
/// `src_alpha_scale` lets the caller fold in a layer/brush opacity.
#[inline]
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>, src_alpha_scale: f32) -> Rgba<u8> {
    let sa = (src[3] as f32 / 255.0) * src_alpha_scale;
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let sc = src[c] as f32 / 255.0;
        let dc = dst[c] as f32 / 255.0;
        let oc = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        out[c] = (oc * 255.0 + 0.5) as u8;
    }
    out[3] = (out_a * 255.0 + 0.5) as u8;
    Rgba(out)
}

/// Destination-out: the stroke bitmap's alpha carves out of the layer.
#[inline]
fn erase_out(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return dst;
    }
    let new_a = (dst[3] as f32 * (1.0 - sa) + 0.5) as u8;
    Rgba([dst[0], dst[1], dst[2], new_a])
}

/// Ordered collection of raster layers.  Index 0 is the bottom of the render
/// order; the last element is topmost.
pub struct LayerStore {
    pub layers: Vec<Layer>,
    /// Index into `layers` of the layer receiving paint.
    pub active: usize,
    pub width: u32,
    pub height: u32,
    next_id: u64,
}

impl LayerStore {
    pub fn new(width: u32, height: u32) -> Self {
        let mut store = Self {
            layers: Vec::new(),
            active: 0,
            width,
            height,
            next_id: 1,
        };
        store.push_layer();
        store
    }

    fn push_layer(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let name = format!("Layer {}", id);
        self.layers.push(Layer::new(id, name));
        self.active = self.layers.len() - 1;
        id
    }

    /// Add a new empty, visible, fully-opaque layer on top of the render
    /// order and make it active.  Returns the new layer's id.
    pub fn add_layer(&mut self) -> u64 {
        self.push_layer()
    }

    pub fn remove_layer(&mut self, id: u64) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.layers.remove(idx);
        if self.active >= self.layers.len() && !self.layers.is_empty() {
            self.active = self.layers.len() - 1;
        }
        true
    }

    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn layer(&self, id: u64) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: u64) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(self.active)
    }

    pub fn active_layer_id(&self) -> Option<u64> {
        self.layers.get(self.active).map(|l| l.id)
    }

    pub fn set_active(&mut self, id: u64) -> bool {
        if let Some(idx) = self.index_of(id) {
            self.active = idx;
            true
        } else {
            false
        }
    }

    pub fn set_visible(&mut self, id: u64, visible: bool) -> bool {
        if let Some(layer) = self.layer_mut(id) {
            layer.visible = visible;
            true
        } else {
            false
        }
    }

    pub fn set_opacity(&mut self, id: u64, opacity: f32) -> bool {
        if let Some(layer) = self.layer_mut(id) {
            layer.opacity = opacity.clamp(0.0, 1.0);
            true
        } else {
            false
        }
    }

    /// Used by history snapshots to keep ids monotonic across restores.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn set_next_id(&mut self, next_id: u64) {
        self.next_id = next_id;
    }

    // ========================================================================
    // MUTATION ENTRY POINTS
    // ========================================================================

    /// Merge a finished stroke bitmap into a layer.  Paint strokes composite
    /// alpha-over; eraser strokes composite destination-out.  The bitmap must
    /// match the canvas dimensions (the scratch surface guarantees this).
    ///
    /// Returns false if the layer id is unknown or the bitmap is mis-sized.
    pub fn merge_stroke(&mut self, id: u64, bitmap: &RgbaImage, erase: bool) -> bool {
        let (w, h) = (self.width, self.height);
        if bitmap.width() != w || bitmap.height() != h {
            crate::log_warn!(
                "merge_stroke: bitmap {}x{} does not match canvas {}x{}",
                bitmap.width(),
                bitmap.height(),
                w,
                h
            );
            return false;
        }
        let Some(layer) = self.layer_mut(id) else {
            return false;
        };
        // Erasing a layer that was never painted is a no-op; don't allocate.
        if layer.pixels.is_none() {
            if erase {
                return true;
            }
            layer.pixels = Some(RgbaImage::new(w, h));
        }
        let pixels = layer.pixels.as_mut().unwrap();
        let row_bytes = w as usize * 4;
        let src_raw = bitmap.as_raw();
        pixels
            .as_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, dst_row)| {
                let src_row = &src_raw[y * row_bytes..(y + 1) * row_bytes];
                for x in 0..w as usize {
                    let o = x * 4;
                    let src = Rgba([src_row[o], src_row[o + 1], src_row[o + 2], src_row[o + 3]]);
                    if src[3] == 0 {
                        continue;
                    }
                    let dst = Rgba([dst_row[o], dst_row[o + 1], dst_row[o + 2], dst_row[o + 3]]);
                    let out = if erase {
                        erase_out(dst, src)
                    } else {
                        blend_over(dst, src, 1.0)
                    };
                    dst_row[o..o + 4].copy_from_slice(&out.0);
                }
            });
        true
    }

    /// Replace a layer's entire buffer — the flood-fill integration path.
    pub fn overwrite_pixels(&mut self, id: u64, buffer: RgbaImage) -> bool {
        if buffer.width() != self.width || buffer.height() != self.height {
            crate::log_warn!(
                "overwrite_pixels: buffer {}x{} does not match canvas {}x{}",
                buffer.width(),
                buffer.height(),
                self.width,
                self.height
            );
            return false;
        }
        let Some(layer) = self.layer_mut(id) else {
            return false;
        };
        layer.pixels = Some(buffer);
        true
    }

    // ========================================================================
    // COMPOSITING
    // ========================================================================

    /// Composite every visible layer bottom-up onto a transparent canvas,
    /// each at its own opacity, standard alpha-over.
    pub fn composite(&self) -> RgbaImage {
        self.composite_over(RgbaImage::new(self.width, self.height))
    }

    /// Composite every visible layer on top of `base`.  Used by bake, where
    /// `base` is the GPU filter stage's captured frame.  Rows are processed
    /// in parallel.
    pub fn composite_over(&self, mut base: RgbaImage) -> RgbaImage {
        debug_assert_eq!(base.width(), self.width);
        debug_assert_eq!(base.height(), self.height);

        let visible: Vec<(&RgbaImage, f32)> = self
            .layers
            .iter()
            .filter(|l| l.visible)
            .filter_map(|l| l.pixels.as_ref().map(|p| (p, l.opacity)))
            .collect();
        if visible.is_empty() {
            return base;
        }

        let w = self.width as usize;
        let row_bytes = w * 4;
        base.as_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, dst_row)| {
                for &(pixels, opacity) in &visible {
                    let src_row = &pixels.as_raw()[y * row_bytes..(y + 1) * row_bytes];
                    for x in 0..w {
                        let o = x * 4;
                        if src_row[o + 3] == 0 {
                            continue;
                        }
                        let src =
                            Rgba([src_row[o], src_row[o + 1], src_row[o + 2], src_row[o + 3]]);
                        let dst =
                            Rgba([dst_row[o], dst_row[o + 1], dst_row[o + 2], dst_row[o + 3]]);
                        let out = blend_over(dst, src, opacity);
                        dst_row[o..o + 4].copy_from_slice(&out.0);
                    }
                }
            });
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn new_store_has_one_empty_active_layer() {
        let store = LayerStore::new(64, 64);
        assert_eq!(store.layers.len(), 1);
        assert_eq!(store.active, 0);
        assert!(store.layers[0].visible);
        assert_eq!(store.layers[0].opacity, 1.0);
        assert!(store.layers[0].pixels.is_none());
    }

    #[test]
    fn add_layer_goes_on_top_and_becomes_active() {
        let mut store = LayerStore::new(8, 8);
        let first = store.active_layer_id().unwrap();
        let second = store.add_layer();
        assert_ne!(first, second);
        assert_eq!(store.active_layer_id(), Some(second));
        assert_eq!(store.layers.last().unwrap().id, second);
    }

    #[test]
    fn merge_paint_allocates_and_blends() {
        let mut store = LayerStore::new(4, 4);
        let id = store.active_layer_id().unwrap();
        let stroke = solid(4, 4, [255, 0, 0, 255]);
        assert!(store.merge_stroke(id, &stroke, false));
        let layer = store.layer(id).unwrap();
        assert_eq!(*layer.pixels.as_ref().unwrap().get_pixel(2, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn merge_erase_on_empty_layer_is_noop() {
        let mut store = LayerStore::new(4, 4);
        let id = store.active_layer_id().unwrap();
        let stroke = solid(4, 4, [0, 0, 0, 255]);
        assert!(store.merge_stroke(id, &stroke, true));
        assert!(store.layer(id).unwrap().pixels.is_none());
    }

    #[test]
    fn merge_erase_clears_alpha() {
        let mut store = LayerStore::new(4, 4);
        let id = store.active_layer_id().unwrap();
        store.merge_stroke(id, &solid(4, 4, [0, 255, 0, 255]), false);
        // Fully opaque eraser stroke removes everything.
        store.merge_stroke(id, &solid(4, 4, [0, 0, 0, 255]), true);
        let px = *store.layer(id).unwrap().pixels.as_ref().unwrap().get_pixel(1, 1);
        assert_eq!(px[3], 0);
    }

    #[test]
    fn composite_respects_visibility_and_opacity() {
        let mut store = LayerStore::new(2, 2);
        let bottom = store.active_layer_id().unwrap();
        store.merge_stroke(bottom, &solid(2, 2, [0, 0, 255, 255]), false);
        let top = store.add_layer();
        store.merge_stroke(top, &solid(2, 2, [255, 0, 0, 255]), false);

        // Hidden top layer contributes nothing.
        store.set_visible(top, false);
        let out = store.composite();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 255, 255]));

        // Half-opacity top blends 50/50 over the bottom.
        store.set_visible(top, true);
        store.set_opacity(top, 0.5);
        let out = store.composite();
        let px = *out.get_pixel(0, 0);
        assert!(px[0] > 120 && px[0] < 135, "r = {}", px[0]);
        assert!(px[2] > 120 && px[2] < 135, "b = {}", px[2]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn overwrite_rejects_wrong_dimensions() {
        let mut store = LayerStore::new(4, 4);
        let id = store.active_layer_id().unwrap();
        assert!(!store.overwrite_pixels(id, RgbaImage::new(3, 3)));
        assert!(store.overwrite_pixels(id, RgbaImage::new(4, 4)));
    }
}
