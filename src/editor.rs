// ============================================================================
// EDITOR — orchestrator tying store, history, tools, view, and GPU together
// ============================================================================
//
// Single-owner rule: the rasterizer and flood fill only produce bitmaps, the
// GPU renderer only touches GPU objects, and every layer mutation goes
// through this type so the history discipline (snapshot before mutate) holds
// everywhere.

use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::LayerStore;
use crate::components::history::{HistoryManager, StoreSnapshot};
use crate::components::tools::{flood_fill, BrushSettings, StrokeRasterizer, Tool};
use crate::config::EditorConfig;
use crate::effects::{Adjustments, EffectStack, FilterUniforms};
use crate::error::EditorError;
use crate::gpu::{FilterRenderer, GpuContext};
use crate::input::{PointerEvent, PointerTracker, TrackerAction};

/// Screen = image * scale + pan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ViewTransform {
    pub fn screen_to_image(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pan_x) / self.scale, (y - self.pan_y) / self.scale)
    }

    pub fn image_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pan_x, y * self.scale + self.pan_y)
    }
}

/// Side record written next to a baked image: everything needed to replay
/// the non-destructive portion of the edit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BakeRecord {
    pub adjustments: Adjustments,
    pub effects: EffectStack,
    /// Clockwise rotation applied to the baked output, degrees.
    pub rotation: f32,
}

pub struct BakeOutput {
    pub image: RgbaImage,
    pub record: BakeRecord,
}

pub struct Editor {
    /// The immutable source image the filter stage operates on.
    base: RgbaImage,
    pub store: LayerStore,
    pub history: HistoryManager,
    pub tracker: PointerTracker,
    rasterizer: StrokeRasterizer,
    pub tool: Tool,
    pub brush: BrushSettings,
    pub adjustments: Adjustments,
    pub effects: EffectStack,
    pub view: ViewTransform,
    /// Clockwise quarter turns applied at bake time (0..=3).
    rotation_turns: u8,
    config: EditorConfig,
    renderer: Option<FilterRenderer>,
    /// Result of the most recent color pick, `#rrggbb`.
    pub last_pick: Option<String>,
    dirty: bool,
}

impl Editor {
    pub fn new(base: RgbaImage, config: EditorConfig) -> Self {
        let (width, height) = (base.width(), base.height());
        crate::log_info!("editor: session open, canvas {width}x{height}");
        Self {
            store: LayerStore::new(width, height),
            history: HistoryManager::new(config.history_cap),
            tracker: PointerTracker::new(),
            rasterizer: StrokeRasterizer::new(width, height),
            tool: Tool::default(),
            brush: BrushSettings::default(),
            adjustments: Adjustments::default(),
            effects: EffectStack::new(),
            view: ViewTransform::default(),
            rotation_turns: 0,
            renderer: None,
            last_pick: None,
            dirty: false,
            config,
            base,
        }
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_turns as f32 * 90.0
    }

    /// Rotate the bake output a quarter turn clockwise.
    pub fn rotate_cw(&mut self) {
        self.rotation_turns = (self.rotation_turns + 1) % 4;
    }

    // ========================================================================
    // GPU
    // ========================================================================

    /// Build the filter renderer on `ctx` and upload the base image.
    pub fn attach_renderer(&mut self, ctx: &GpuContext) -> Result<(), EditorError> {
        if !ctx.supports_size(self.base.width(), self.base.height()) {
            return Err(EditorError::DeviceRequest(format!(
                "canvas {}x{} exceeds device texture limit {}",
                self.base.width(),
                self.base.height(),
                ctx.max_texture_dim
            )));
        }
        let mut renderer = FilterRenderer::new(ctx)?;
        renderer.set_source(&self.base);
        crate::log_info!("editor: filter renderer attached ({})", ctx.adapter_name);
        self.renderer = Some(renderer);
        Ok(())
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    fn resolved_uniforms(&self, time: f32) -> FilterUniforms {
        FilterUniforms::resolve(
            &self.adjustments,
            &self.effects,
            time,
            self.base.width(),
            self.base.height(),
        )
    }

    /// True when an active effect is time-driven and the frame must be
    /// re-rendered continuously.
    pub fn needs_animation(&self) -> bool {
        self.resolved_uniforms(0.0).is_animated()
    }

    /// Run the filter pass over the base image.
    pub fn render_filter(&mut self, time: f32) -> Result<(), EditorError> {
        let uniforms = self.resolved_uniforms(time);
        let renderer = self.renderer.as_mut().ok_or(EditorError::GpuUnavailable)?;
        renderer.render(&uniforms)
    }

    /// Filtered base image as a CPU bitmap (render + synchronous readback).
    pub fn filtered_frame(&mut self, time: f32) -> Result<RgbaImage, EditorError> {
        self.render_filter(time)?;
        self.renderer
            .as_mut()
            .ok_or(EditorError::GpuUnavailable)?
            .snapshot()
    }

    // ========================================================================
    // POINTER INPUT
    // ========================================================================

    pub fn handle_pointer(&mut self, ev: PointerEvent) {
        self.handle_pointers(std::iter::once(ev));
    }

    /// Route a batch of pointer events (coalesced sub-events included)
    /// through the tracker and apply the resulting actions.
    pub fn handle_pointers(&mut self, events: impl IntoIterator<Item = PointerEvent>) {
        let view = self.view;
        let actions = self
            .tracker
            .handle_all(events, move |x, y| view.screen_to_image(x, y));
        for action in actions {
            self.apply_action(action);
        }
    }

    fn apply_action(&mut self, action: TrackerAction) {
        match action {
            TrackerAction::StrokeBegin(sample) => match self.tool {
                Tool::Brush | Tool::Eraser => {
                    self.rasterizer.begin_stroke(&sample, self.tool, &self.brush);
                }
                Tool::Fill => {
                    self.apply_fill(sample.x, sample.y);
                }
                Tool::Picker => match self.color_pick(sample.x, sample.y) {
                    Ok(hex) => self.last_pick = Some(hex),
                    Err(e) => crate::log_warn!("editor: color pick failed: {e}"),
                },
            },
            TrackerAction::StrokeMove { prev, next } => {
                if matches!(self.tool, Tool::Brush | Tool::Eraser) {
                    self.rasterizer
                        .extend_stroke(&prev, &next, self.tool, &self.brush);
                }
            }
            TrackerAction::StrokeFinish => {
                if let Some(bitmap) = self.rasterizer.finish_stroke() {
                    let erase = self.tool == Tool::Eraser;
                    if let Some(id) = self.store.active_layer_id() {
                        if let Err(e) = self.update_layer(id, &bitmap, erase) {
                            crate::log_err!("editor: stroke commit failed: {e}");
                        }
                    }
                }
            }
            TrackerAction::StrokeCancel => self.rasterizer.cancel_stroke(),
            TrackerAction::Gesture {
                scale_ratio,
                pan_dx,
                pan_dy,
            } => self.apply_view_delta(scale_ratio, pan_dx, pan_dy),
        }
    }

    /// Live stroke preview bitmap (empty outside a stroke).
    pub fn stroke_preview(&self) -> &RgbaImage {
        self.rasterizer.scratch()
    }

    pub fn is_stroking(&self) -> bool {
        self.rasterizer.is_active()
    }

    // ========================================================================
    // LAYER MUTATION (history discipline lives here)
    // ========================================================================

    /// Merge a finished stroke bitmap into a layer, recording the
    /// pre-mutation state first.
    pub fn update_layer(
        &mut self,
        layer_id: u64,
        bitmap: &RgbaImage,
        erase: bool,
    ) -> Result<(), EditorError> {
        if self.store.index_of(layer_id).is_none() {
            return Err(EditorError::NoSuchLayer(layer_id));
        }
        self.history.push(StoreSnapshot::capture(&self.store));
        self.store.merge_stroke(layer_id, bitmap, erase);
        self.dirty = true;
        Ok(())
    }

    /// Flood fill the active layer at an image-space point with the brush
    /// color.  Returns false on a no-op (out of bounds, already that color).
    pub fn apply_fill(&mut self, x: f32, y: f32) -> bool {
        if x < 0.0 || y < 0.0 {
            return false;
        }
        let (x, y) = (x as u32, y as u32);
        let Some(layer) = self.store.active_layer() else {
            return false;
        };
        let id = layer.id;
        let current = match &layer.pixels {
            Some(p) => p.clone(),
            None => RgbaImage::new(self.store.width, self.store.height),
        };
        let [r, g, b] = self.brush.color;
        let Some(filled) = flood_fill(&current, x, y, Rgba([r, g, b, 255])) else {
            return false;
        };
        self.history.push(StoreSnapshot::capture(&self.store));
        self.store.overwrite_pixels(id, filled);
        self.dirty = true;
        true
    }

    /// New empty layer on top, with the structural change undoable.
    pub fn add_layer(&mut self) -> u64 {
        self.history.push(StoreSnapshot::capture(&self.store));
        self.dirty = true;
        self.store.add_layer()
    }

    pub fn remove_layer(&mut self, id: u64) -> bool {
        if self.store.index_of(id).is_none() || self.store.layers.len() <= 1 {
            return false;
        }
        self.history.push(StoreSnapshot::capture(&self.store));
        self.dirty = true;
        self.store.remove_layer(id)
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.store)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.store)
    }

    // ========================================================================
    // VIEW TRANSFORM
    // ========================================================================

    /// Incremental pinch/pan update.  Non-finite deltas are dropped; the
    /// scale stays inside the configured zoom bounds no matter the sequence
    /// of deltas applied.
    pub fn apply_view_delta(&mut self, scale_ratio: f32, pan_dx: f32, pan_dy: f32) {
        if !scale_ratio.is_finite() || !pan_dx.is_finite() || !pan_dy.is_finite() {
            return;
        }
        let scale = (self.view.scale * scale_ratio)
            .clamp(self.config.min_zoom, self.config.max_zoom);
        self.view.scale = scale;
        self.view.pan_x += pan_dx;
        self.view.pan_y += pan_dy;
    }

    pub fn set_view(&mut self, scale: f32, pan_x: f32, pan_y: f32) {
        if !scale.is_finite() || !pan_x.is_finite() || !pan_y.is_finite() {
            return;
        }
        self.view.scale = scale.clamp(self.config.min_zoom, self.config.max_zoom);
        self.view.pan_x = pan_x;
        self.view.pan_y = pan_y;
    }

    /// Zoom by `factor` keeping the image point under the screen-space
    /// cursor fixed.
    pub fn zoom_about(&mut self, cursor_x: f32, cursor_y: f32, factor: f32) {
        if !factor.is_finite() {
            return;
        }
        let (ix, iy) = self.view.screen_to_image(cursor_x, cursor_y);
        let scale = (self.view.scale * factor).clamp(self.config.min_zoom, self.config.max_zoom);
        self.view.scale = scale;
        self.view.pan_x = cursor_x - ix * scale;
        self.view.pan_y = cursor_y - iy * scale;
    }

    pub fn screen_to_image(&self, x: f32, y: f32) -> (f32, f32) {
        self.view.screen_to_image(x, y)
    }

    pub fn image_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        self.view.image_to_screen(x, y)
    }

    // ========================================================================
    // OUTPUT
    // ========================================================================

    /// Sample the post-filter color at an image-space point as `#rrggbb`.
    /// Without a renderer the pick falls back to the CPU composite.
    pub fn color_pick(&mut self, x: f32, y: f32) -> Result<String, EditorError> {
        if x < 0.0 || y < 0.0 || x >= self.store.width as f32 || y >= self.store.height as f32 {
            return Err(EditorError::Readback(format!(
                "pick point ({x:.0}, {y:.0}) outside canvas"
            )));
        }
        let (xi, yi) = (x as u32, y as u32);
        if let Some(renderer) = self.renderer.as_mut() {
            return renderer.read_pixel(xi, yi);
        }
        let composite = self.store.composite_over(self.base.clone());
        let px = composite.get_pixel(xi, yi);
        Ok(format!("#{:02x}{:02x}{:02x}", px[0], px[1], px[2]))
    }

    /// Flatten the session: filtered base via GPU snapshot, visible paint
    /// layers composited over it, rotation applied last.  Editor state is
    /// untouched on failure.
    pub fn bake(&mut self, time: f32) -> Result<BakeOutput, EditorError> {
        let uniforms = self.resolved_uniforms(time);
        let renderer = self
            .renderer
            .as_mut()
            .ok_or_else(|| EditorError::Bake("no GPU renderer attached".into()))?;
        renderer.render(&uniforms)?;
        let filtered = renderer.snapshot()?;

        let flat = self.store.composite_over(filtered);
        let image = match self.rotation_turns {
            1 => imageops::rotate90(&flat),
            2 => imageops::rotate180(&flat),
            3 => imageops::rotate270(&flat),
            _ => flat,
        };
        let record = BakeRecord {
            adjustments: self.adjustments,
            effects: self.effects.clone(),
            rotation: self.rotation_degrees(),
        };
        crate::log_info!(
            "editor: baked {}x{} ({} effects, rotation {} deg)",
            image.width(),
            image.height(),
            self.effects.len(),
            record.rotation
        );
        Ok(BakeOutput { image, record })
    }

    /// End the session: discard any in-flight stroke and release the GPU
    /// renderer and its resources.
    pub fn close(&mut self) {
        self.rasterizer.cancel_stroke();
        self.renderer = None;
        crate::log_info!("editor: session closed (dirty: {})", self.dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerPhase;

    fn editor(w: u32, h: u32) -> Editor {
        Editor::new(RgbaImage::from_pixel(w, h, Rgba([200, 0, 0, 255])), EditorConfig::default())
    }

    #[test]
    fn bake_without_renderer_is_an_error() {
        let mut ed = editor(8, 8);
        assert!(matches!(ed.bake(0.0), Err(EditorError::Bake(_))));
    }

    #[test]
    fn view_scale_survives_adversarial_deltas() {
        let mut ed = editor(8, 8);
        ed.apply_view_delta(1e30, 0.0, 0.0);
        assert!(ed.view.scale <= 10.0);
        ed.apply_view_delta(1e-30, 0.0, 0.0);
        assert!(ed.view.scale >= 0.1);
        let before = ed.view;
        ed.apply_view_delta(f32::NAN, 0.0, 0.0);
        ed.apply_view_delta(1.0, f32::INFINITY, 0.0);
        assert_eq!(ed.view, before);
        for _ in 0..1000 {
            ed.apply_view_delta(1.7, 3.0, -2.0);
        }
        assert!(ed.view.scale <= 10.0 && ed.view.pan_x.is_finite());
    }

    #[test]
    fn zoom_about_keeps_anchor_fixed() {
        let mut ed = editor(8, 8);
        ed.set_view(1.0, 5.0, -3.0);
        let (ax, ay) = (120.0, 80.0);
        let before = ed.screen_to_image(ax, ay);
        ed.zoom_about(ax, ay, 2.5);
        let after = ed.screen_to_image(ax, ay);
        assert!((before.0 - after.0).abs() < 1e-3);
        assert!((before.1 - after.1).abs() < 1e-3);
        // Clamped zoom still keeps the anchor fixed.
        ed.zoom_about(ax, ay, 100.0);
        let clamped = ed.screen_to_image(ax, ay);
        assert!(ed.view.scale <= 10.0);
        assert!((before.0 - clamped.0).abs() < 1e-3);
    }

    #[test]
    fn stroke_commits_to_layer_and_undoes() {
        let mut ed = editor(64, 64);
        assert!(!ed.store.active_layer().unwrap().has_pixels());
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Down, 20.0, 20.0));
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Move, 40.0, 20.0));
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Up, 40.0, 20.0));
        assert!(ed.store.active_layer().unwrap().has_pixels());
        assert!(ed.is_dirty());

        assert!(ed.undo());
        assert!(!ed.store.active_layer().unwrap().has_pixels());
        assert!(ed.redo());
        assert!(ed.store.active_layer().unwrap().has_pixels());
    }

    #[test]
    fn gesture_during_stroke_leaves_layer_untouched() {
        let mut ed = editor(64, 64);
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Down, 20.0, 20.0));
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Move, 30.0, 20.0));
        // Second finger: the stroke must be discarded, not committed.
        ed.handle_pointer(PointerEvent::simple(2, PointerPhase::Down, 50.0, 50.0));
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Up, 30.0, 20.0));
        ed.handle_pointer(PointerEvent::simple(2, PointerPhase::Up, 50.0, 50.0));
        assert!(!ed.store.active_layer().unwrap().has_pixels());
        assert!(!ed.history.can_undo());
    }

    #[test]
    fn fill_tool_overwrites_active_layer() {
        let mut ed = editor(16, 16);
        ed.tool = Tool::Fill;
        ed.brush.color = [0, 255, 0];
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Down, 4.0, 4.0));
        let layer = ed.store.active_layer().unwrap();
        let pixels = layer.pixels.as_ref().unwrap();
        assert!(pixels.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
        assert!(ed.undo());
        assert!(!ed.store.active_layer().unwrap().has_pixels());
    }

    #[test]
    fn picker_falls_back_to_cpu_composite() {
        let mut ed = editor(8, 8);
        ed.tool = Tool::Picker;
        ed.handle_pointer(PointerEvent::simple(1, PointerPhase::Down, 2.0, 2.0));
        assert_eq!(ed.last_pick.as_deref(), Some("#c80000"));
    }

    #[test]
    fn structural_ops_are_undoable() {
        let mut ed = editor(8, 8);
        let id = ed.add_layer();
        assert_eq!(ed.store.layers.len(), 2);
        assert!(ed.remove_layer(id));
        assert_eq!(ed.store.layers.len(), 1);
        assert!(ed.undo());
        assert_eq!(ed.store.layers.len(), 2);
        assert!(ed.undo());
        assert_eq!(ed.store.layers.len(), 1);
    }

    #[test]
    fn rotation_cycles_quarter_turns() {
        let mut ed = editor(8, 8);
        for expected in [90.0, 180.0, 270.0, 0.0] {
            ed.rotate_cw();
            assert_eq!(ed.rotation_degrees(), expected);
        }
    }
}
