// ============================================================================
// brushfire — embeddable raster paint + VFX editor core
// ============================================================================
//
// Library layout:
//   canvas     — Layer, LayerStore, stroke merge, CPU compositing
//   input      — pointer/gesture tracker state machine
//   effects    — effect kinds, stack, uniform resolution
//   editor     — orchestrator: history discipline, view transform, bake
//   components — history manager, tools (brush, eraser, fill, picker)
//   gpu        — wgpu context + single-pass filter renderer
//   app        — egui demo shell embedding the editor

#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod canvas;
pub mod components;
pub mod config;
pub mod editor;
pub mod effects;
pub mod error;
pub mod gpu;
pub mod input;
pub mod logger;

pub use canvas::{Layer, LayerStore};
pub use components::history::HistoryManager;
pub use components::tools::{BrushSettings, Tool};
pub use config::EditorConfig;
pub use editor::{BakeOutput, BakeRecord, Editor, ViewTransform};
pub use effects::{Adjustments, EffectInstance, EffectKind, EffectStack, EffectTag};
pub use error::EditorError;
pub use input::{PointerEvent, PointerPhase, PointerTracker};
