// ============================================================================
// DEMO SHELL — minimal egui application embedding the editor
// ============================================================================
//
// Routes egui pointer input into the editor's tracker, drives the per-frame
// filter/composite loop, and exposes a small control panel.  Everything the
// shell does goes through the `Editor` surface; no direct store mutation.

use eframe::egui;
use image::{Rgba, RgbaImage};

use crate::canvas::blend_over;
use crate::config::EditorConfig;
use crate::editor::Editor;
use crate::effects::{
    BloomParams, ChromaParams, CrtWarpParams, EffectInstance, EffectKind, EffectTag,
    GlitchParams, GrainParams, ScanlineParams, VhsParams, VignetteParams,
};
use crate::gpu::GpuContext;
use crate::input::{PointerEvent, PointerPhase};
use crate::components::tools::Tool;

const DEMO_CANVAS: (u32, u32) = (960, 640);
const PANEL_LABEL: &str = "panel";

pub struct BrushfireApp {
    editor: Editor,
    canvas_texture: Option<egui::TextureHandle>,
    session_start: std::time::Instant,
    status: String,
}

impl BrushfireApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let config = EditorConfig::default();
        let base = RgbaImage::from_pixel(DEMO_CANVAS.0, DEMO_CANVAS.1, Rgba([235, 235, 235, 255]));
        let mut editor = Editor::new(base, config.clone());

        match GpuContext::new(&config.preferred_gpu) {
            Ok(ctx) => {
                if let Err(e) = editor.attach_renderer(&ctx) {
                    crate::log_err!("app: renderer attach failed: {e}");
                }
            }
            Err(e) => crate::log_warn!("app: running without GPU filters: {e}"),
        }

        Self {
            editor,
            canvas_texture: None,
            session_start: std::time::Instant::now(),
            status: String::new(),
        }
    }

    fn elapsed(&self) -> f32 {
        self.session_start.elapsed().as_secs_f32()
    }

    /// Filtered base (GPU when available), visible layers on top, live
    /// stroke preview last.
    fn display_frame(&mut self) -> RgbaImage {
        let time = self.elapsed();
        let base = match self.editor.filtered_frame(time) {
            Ok(frame) => frame,
            Err(_) => self.editor.base().clone(),
        };
        let mut frame = self.editor.store.composite_over(base);

        if self.editor.is_stroking() && self.editor.tool == Tool::Brush {
            let preview = self.editor.stroke_preview();
            for (x, y, src) in preview.enumerate_pixels() {
                if src[3] > 0 {
                    let dst = *frame.get_pixel(x, y);
                    frame.put_pixel(x, y, blend_over(dst, *src, 1.0));
                }
            }
        }
        frame
    }

    fn effect_checkbox(&mut self, ui: &mut egui::Ui, label: &str, tag: EffectTag, kind: EffectKind) {
        let mut on = self.editor.effects.contains(tag, PANEL_LABEL);
        if ui.checkbox(&mut on, label).changed() {
            self.editor
                .effects
                .toggle(EffectInstance::new(kind, PANEL_LABEL));
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tools");
        ui.horizontal(|ui| {
            for (label, tool) in [
                ("Brush", Tool::Brush),
                ("Eraser", Tool::Eraser),
                ("Fill", Tool::Fill),
                ("Pick", Tool::Picker),
            ] {
                ui.selectable_value(&mut self.editor.tool, tool, label);
            }
        });
        ui.add(egui::Slider::new(&mut self.editor.brush.size, 1.0..=64.0).text("Size"));
        ui.add(egui::Slider::new(&mut self.editor.brush.opacity, 0.0..=1.0).text("Opacity"));
        let mut color = self.editor.brush.color;
        if ui.color_edit_button_srgb(&mut color).changed() {
            self.editor.brush.color = color;
        }
        if let Some(hex) = &self.editor.last_pick {
            ui.label(format!("Picked: {hex}"));
        }

        ui.separator();
        ui.heading("Layers");
        ui.horizontal(|ui| {
            if ui.button("Add layer").clicked() {
                self.editor.add_layer();
            }
            if ui.button("Undo").clicked() {
                self.editor.undo();
            }
            if ui.button("Redo").clicked() {
                self.editor.redo();
            }
        });
        let layer_rows: Vec<(u64, String, bool)> = self
            .editor
            .store
            .layers
            .iter()
            .rev() // topmost first in the panel
            .map(|l| (l.id, l.name.clone(), l.visible))
            .collect();
        let active = self.editor.store.active_layer_id();
        for (id, name, visible) in layer_rows {
            ui.horizontal(|ui| {
                let mut vis = visible;
                if ui.checkbox(&mut vis, "").changed() {
                    self.editor.store.set_visible(id, vis);
                }
                if ui
                    .selectable_label(active == Some(id), &name)
                    .clicked()
                {
                    self.editor.store.set_active(id);
                }
            });
        }

        ui.separator();
        ui.heading("Adjust");
        ui.add(egui::Slider::new(&mut self.editor.adjustments.brightness, 0.0..=200.0).text("Brightness"));
        ui.add(egui::Slider::new(&mut self.editor.adjustments.contrast, 0.0..=200.0).text("Contrast"));
        ui.add(egui::Slider::new(&mut self.editor.adjustments.saturation, 0.0..=200.0).text("Saturation"));

        ui.separator();
        ui.heading("Effects");
        self.effect_checkbox(ui, "VHS", EffectTag::Vhs, EffectKind::Vhs(VhsParams { intensity: 0.8 }));
        self.effect_checkbox(
            ui,
            "Glitch",
            EffectTag::Glitch,
            EffectKind::Glitch(GlitchParams {
                intensity: 0.7,
                ..Default::default()
            }),
        );
        self.effect_checkbox(
            ui,
            "Bloom",
            EffectTag::Bloom,
            EffectKind::Bloom(BloomParams {
                intensity: 0.6,
                ..Default::default()
            }),
        );
        self.effect_checkbox(
            ui,
            "Chromatic",
            EffectTag::ChromaticAberration,
            EffectKind::ChromaticAberration(ChromaParams { intensity: 0.5 }),
        );
        self.effect_checkbox(
            ui,
            "Scanlines",
            EffectTag::Scanlines,
            EffectKind::Scanlines(ScanlineParams {
                intensity: 0.5,
                ..Default::default()
            }),
        );
        self.effect_checkbox(
            ui,
            "CRT",
            EffectTag::CrtWarp,
            EffectKind::CrtWarp(CrtWarpParams { intensity: 0.6 }),
        );
        self.effect_checkbox(
            ui,
            "Grain",
            EffectTag::FilmGrain,
            EffectKind::FilmGrain(GrainParams { intensity: 0.5 }),
        );
        self.effect_checkbox(
            ui,
            "Vignette",
            EffectTag::Vignette,
            EffectKind::Vignette(VignetteParams {
                intensity: 0.7,
                ..Default::default()
            }),
        );

        ui.separator();
        if ui.button("Rotate 90°").clicked() {
            self.editor.rotate_cw();
        }
        if ui.button("Save PNG").clicked() {
            self.save();
        }
        if !self.status.is_empty() {
            ui.label(&self.status);
        }
    }

    /// Bake and write the flattened PNG plus its serde_json side record.
    fn save(&mut self) {
        match self.editor.bake(self.elapsed()) {
            Ok(output) => {
                let png = std::env::temp_dir().join("brushfire_bake.png");
                let record = png.with_extension("json");
                let mut ok = output.image.save(&png).is_ok();
                match serde_json::to_string_pretty(&output.record) {
                    Ok(json) => ok &= std::fs::write(&record, json).is_ok(),
                    Err(e) => {
                        crate::log_err!("app: bake record serialization failed: {e}");
                        ok = false;
                    }
                }
                self.status = if ok {
                    format!("Saved {}", png.display())
                } else {
                    "Save failed (see log)".to_string()
                };
            }
            Err(e) => {
                crate::log_err!("app: bake failed: {e}");
                self.status = format!("Bake failed: {e}");
            }
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
        let origin = response.rect.min;

        // Mouse → pointer events, panel-local screen coordinates.  The demo
        // shell is single-pointer; pinch input arrives via zoom_delta below.
        let pos = response
            .interact_pointer_pos()
            .or_else(|| response.hover_pos())
            .map(|p| p - origin.to_vec2());
        if let Some(p) = pos {
            if response.drag_started() {
                self.editor
                    .handle_pointer(PointerEvent::simple(0, PointerPhase::Down, p.x, p.y));
            } else if response.dragged() {
                self.editor
                    .handle_pointer(PointerEvent::simple(0, PointerPhase::Move, p.x, p.y));
            }
        }
        if response.drag_released() {
            if let Some(p) = pos {
                self.editor
                    .handle_pointer(PointerEvent::simple(0, PointerPhase::Up, p.x, p.y));
            }
        }

        // Wheel pan + pinch/ctrl-wheel zoom about the hovered point.
        if response.hovered() {
            let (scroll, zoom) = ui.input(|i| (i.scroll_delta, i.zoom_delta()));
            if zoom != 1.0 {
                if let Some(p) = response.hover_pos().map(|p| p - origin.to_vec2()) {
                    self.editor.zoom_about(p.x, p.y, zoom);
                }
            } else if scroll != egui::Vec2::ZERO {
                self.editor.apply_view_delta(1.0, scroll.x, scroll.y);
            }
        }

        // Upload the frame and draw it under the current view transform.
        let frame = self.display_frame();
        let size = [frame.width() as usize, frame.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match &mut self.canvas_texture {
            Some(handle) => handle.set(color_image, egui::TextureOptions::NEAREST),
            None => {
                self.canvas_texture = Some(ui.ctx().load_texture(
                    "canvas",
                    color_image,
                    egui::TextureOptions::NEAREST,
                ));
            }
        }

        if let Some(texture) = &self.canvas_texture {
            let view = self.editor.view;
            let top_left = origin + egui::vec2(view.pan_x, view.pan_y);
            let draw_size = egui::vec2(
                frame.width() as f32 * view.scale,
                frame.height() as f32 * view.scale,
            );
            let painter = ui.painter_at(response.rect);
            painter.image(
                texture.id(),
                egui::Rect::from_min_size(top_left, draw_size),
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
    }
}

impl eframe::App for BrushfireApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::SidePanel::left("controls")
            .default_width(220.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.controls(ui));
            });
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        // Animated effects re-render every frame; static ones only on input.
        if self.editor.needs_animation() || self.editor.is_stroking() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.editor.close();
    }
}
