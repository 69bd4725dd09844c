// ============================================================================
// EFFECT STACK — closed effect enumeration + GPU uniform resolution
// ============================================================================
//
// Effects are a closed tagged enum, one variant per effect kind, each
// carrying a typed parameter record.  The evaluator (the filter shader) is
// exhaustive over the same set, so an unknown effect type cannot be silently
// ignored.  The stack is an ordered set keyed by (kind-tag, label).

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Discrete color-filter modes — mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFilterMode {
    #[default]
    None,
    Grayscale,
    Sepia,
    Invert,
}

impl ColorFilterMode {
    fn as_uniform(self) -> f32 {
        match self {
            ColorFilterMode::None => 0.0,
            ColorFilterMode::Grayscale => 1.0,
            ColorFilterMode::Sepia => 2.0,
            ColorFilterMode::Invert => 3.0,
        }
    }
}

// ---- Per-effect parameter records.  Defaults are the neutral values an
// ---- instance falls back to for anything it does not specify.

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VhsParams {
    pub intensity: f32,
}
impl Default for VhsParams {
    fn default() -> Self {
        Self { intensity: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlitchParams {
    pub intensity: f32,
    /// Coarse block-grid row count for the horizontal jitter.
    pub block_size: f32,
    pub speed: f32,
}
impl Default for GlitchParams {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            block_size: 24.0,
            speed: 8.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomParams {
    pub intensity: f32,
    /// Luma gate below which a pixel contributes nothing.
    pub threshold: f32,
}
impl Default for BloomParams {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            threshold: 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChromaParams {
    pub intensity: f32,
}
impl Default for ChromaParams {
    fn default() -> Self {
        Self { intensity: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanlineParams {
    pub intensity: f32,
    pub count: f32,
    /// Duty-cycle shaping exponent; higher = thinner lit bands.
    pub thickness: f32,
}
impl Default for ScanlineParams {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            count: 240.0,
            thickness: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrtWarpParams {
    pub intensity: f32,
}
impl Default for CrtWarpParams {
    fn default() -> Self {
        Self { intensity: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrainParams {
    pub intensity: f32,
}
impl Default for GrainParams {
    fn default() -> Self {
        Self { intensity: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelateParams {
    /// Quantization cell size in pixels; 1 = no-op.
    pub size: f32,
}
impl Default for PixelateParams {
    fn default() -> Self {
        Self { size: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VignetteParams {
    pub intensity: f32,
    pub radius: f32,
}
impl Default for VignetteParams {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            radius: 0.75,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KaleidoParams {
    /// Number of wedge segments; < 2 disables the fold.
    pub segments: f32,
    pub angle: f32,
}
impl Default for KaleidoParams {
    fn default() -> Self {
        Self {
            segments: 0.0,
            angle: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveParams {
    pub amplitude: f32,
    pub frequency: f32,
    pub speed: f32,
}
impl Default for WaveParams {
    fn default() -> Self {
        Self {
            amplitude: 0.0,
            frequency: 10.0,
            speed: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    pub intensity: f32,
}
impl Default for EdgeParams {
    fn default() -> Self {
        Self { intensity: 0.0 }
    }
}

/// The closed set of effect kinds, each with its typed parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum EffectKind {
    ColorFilter(ColorFilterMode),
    Vhs(VhsParams),
    Glitch(GlitchParams),
    Bloom(BloomParams),
    ChromaticAberration(ChromaParams),
    Scanlines(ScanlineParams),
    CrtWarp(CrtWarpParams),
    FilmGrain(GrainParams),
    Pixelate(PixelateParams),
    Vignette(VignetteParams),
    Kaleidoscope(KaleidoParams),
    Wave(WaveParams),
    Edge(EdgeParams),
}

/// Field-less identity tag used for the stack's (tag, label) key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectTag {
    ColorFilter,
    Vhs,
    Glitch,
    Bloom,
    ChromaticAberration,
    Scanlines,
    CrtWarp,
    FilmGrain,
    Pixelate,
    Vignette,
    Kaleidoscope,
    Wave,
    Edge,
}

impl EffectKind {
    pub fn tag(&self) -> EffectTag {
        match self {
            EffectKind::ColorFilter(_) => EffectTag::ColorFilter,
            EffectKind::Vhs(_) => EffectTag::Vhs,
            EffectKind::Glitch(_) => EffectTag::Glitch,
            EffectKind::Bloom(_) => EffectTag::Bloom,
            EffectKind::ChromaticAberration(_) => EffectTag::ChromaticAberration,
            EffectKind::Scanlines(_) => EffectTag::Scanlines,
            EffectKind::CrtWarp(_) => EffectTag::CrtWarp,
            EffectKind::FilmGrain(_) => EffectTag::FilmGrain,
            EffectKind::Pixelate(_) => EffectTag::Pixelate,
            EffectKind::Vignette(_) => EffectTag::Vignette,
            EffectKind::Kaleidoscope(_) => EffectTag::Kaleidoscope,
            EffectKind::Wave(_) => EffectTag::Wave,
            EffectKind::Edge(_) => EffectTag::Edge,
        }
    }
}

/// One entry in the active effect stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectInstance {
    pub kind: EffectKind,
    pub label: String,
    pub enabled: bool,
}

impl EffectInstance {
    pub fn new(kind: EffectKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            enabled: true,
        }
    }
}

/// Ordered set of active effects.  Insertion order is evaluation/display
/// order; no two entries share a (tag, label) pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectStack {
    items: Vec<EffectInstance>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectInstance> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, tag: EffectTag, label: &str) -> bool {
        self.items
            .iter()
            .any(|i| i.kind.tag() == tag && i.label == label)
    }

    /// Set-xor membership toggle: if an entry with the same (tag, label)
    /// exists it is removed, otherwise `instance` is appended.  Toggling the
    /// same instance twice restores prior membership and parameters.
    pub fn toggle(&mut self, instance: EffectInstance) {
        let key = (instance.kind.tag(), instance.label.clone());
        if let Some(idx) = self
            .items
            .iter()
            .position(|i| i.kind.tag() == key.0 && i.label == key.1)
        {
            self.items.remove(idx);
        } else {
            self.items.push(instance);
        }
    }

    /// Replace the parameters of an existing entry in place.
    pub fn update(&mut self, tag: EffectTag, label: &str, kind: EffectKind) -> bool {
        debug_assert_eq!(kind.tag(), tag);
        for item in &mut self.items {
            if item.kind.tag() == tag && item.label == label {
                item.kind = kind;
                return true;
            }
        }
        false
    }

    pub fn set_enabled(&mut self, tag: EffectTag, label: &str, enabled: bool) -> bool {
        for item in &mut self.items {
            if item.kind.tag() == tag && item.label == label {
                item.enabled = enabled;
                return true;
            }
        }
        false
    }
}

/// Brightness / contrast / saturation in percent; 100 is neutral.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
        }
    }
}

// ============================================================================
// UNIFORM RESOLUTION
// ============================================================================

/// CPU mirror of the WGSL `FilterUniforms` struct.  Field order and size
/// (112 bytes) must match the shader exactly.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FilterUniforms {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub color_filter: f32,

    pub vhs: f32,
    pub glitch: f32,
    pub glitch_block: f32,
    pub glitch_speed: f32,

    pub bloom: f32,
    pub bloom_threshold: f32,
    pub chroma: f32,
    pub scan_intensity: f32,

    pub scan_count: f32,
    pub scan_thickness: f32,
    pub crt: f32,
    pub grain: f32,

    pub pixelate: f32,
    pub vignette: f32,
    pub vignette_radius: f32,
    pub kaleido_segments: f32,

    pub kaleido_angle: f32,
    pub wave_amp: f32,
    pub wave_freq: f32,
    pub wave_speed: f32,

    pub edge: f32,
    pub time: f32,
    pub tex_size: [f32; 2],
}

impl FilterUniforms {
    /// All-neutral uniform block: every effect stage is a no-op.
    pub fn neutral(time: f32, width: u32, height: u32) -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            color_filter: 0.0,
            vhs: 0.0,
            glitch: 0.0,
            glitch_block: GlitchParams::default().block_size,
            glitch_speed: GlitchParams::default().speed,
            bloom: 0.0,
            bloom_threshold: BloomParams::default().threshold,
            chroma: 0.0,
            scan_intensity: 0.0,
            scan_count: ScanlineParams::default().count,
            scan_thickness: ScanlineParams::default().thickness,
            crt: 0.0,
            grain: 0.0,
            pixelate: 1.0,
            vignette: 0.0,
            vignette_radius: VignetteParams::default().radius,
            kaleido_segments: 0.0,
            kaleido_angle: 0.0,
            wave_amp: 0.0,
            wave_freq: WaveParams::default().frequency,
            wave_speed: WaveParams::default().speed,
            edge: 0.0,
            time,
            tex_size: [width as f32, height as f32],
        }
    }

    /// Resolve adjustments + the effect stack into one uniform block.
    /// Disabled instances contribute nothing; if two enabled instances share
    /// a kind the later one wins (the stack forbids duplicate (tag, label)
    /// pairs, not duplicate kinds).
    pub fn resolve(
        adjustments: &Adjustments,
        stack: &EffectStack,
        time: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let mut u = Self::neutral(time, width, height);
        u.brightness = adjustments.brightness / 100.0;
        u.contrast = adjustments.contrast / 100.0;
        u.saturation = adjustments.saturation / 100.0;

        for item in stack.iter() {
            if !item.enabled {
                continue;
            }
            match item.kind {
                EffectKind::ColorFilter(mode) => u.color_filter = mode.as_uniform(),
                EffectKind::Vhs(p) => u.vhs = p.intensity.max(0.0),
                EffectKind::Glitch(p) => {
                    u.glitch = p.intensity.max(0.0);
                    u.glitch_block = p.block_size.max(1.0);
                    u.glitch_speed = p.speed;
                }
                EffectKind::Bloom(p) => {
                    u.bloom = p.intensity.max(0.0);
                    u.bloom_threshold = p.threshold.clamp(0.0, 1.0);
                }
                EffectKind::ChromaticAberration(p) => u.chroma = p.intensity.max(0.0),
                EffectKind::Scanlines(p) => {
                    u.scan_intensity = p.intensity.max(0.0);
                    u.scan_count = p.count.max(1.0);
                    u.scan_thickness = p.thickness.max(0.01);
                }
                EffectKind::CrtWarp(p) => u.crt = p.intensity.max(0.0),
                EffectKind::FilmGrain(p) => u.grain = p.intensity.max(0.0),
                EffectKind::Pixelate(p) => u.pixelate = p.size.max(1.0),
                EffectKind::Vignette(p) => {
                    u.vignette = p.intensity.max(0.0);
                    u.vignette_radius = p.radius.max(0.01);
                }
                EffectKind::Kaleidoscope(p) => {
                    u.kaleido_segments = p.segments.max(0.0);
                    u.kaleido_angle = p.angle;
                }
                EffectKind::Wave(p) => {
                    u.wave_amp = p.amplitude.max(0.0);
                    u.wave_freq = p.frequency;
                    u.wave_speed = p.speed;
                }
                EffectKind::Edge(p) => u.edge = p.intensity.max(0.0),
            }
        }
        u
    }

    /// True when the block would render the source unchanged.
    pub fn is_neutral(&self) -> bool {
        let n = Self::neutral(self.time, 0, 0);
        let mut probe = *self;
        probe.tex_size = [0.0, 0.0];
        probe == n
    }

    /// True when any time-driven stage is active, meaning the frame must be
    /// re-rendered continuously rather than only on parameter change.
    pub fn is_animated(&self) -> bool {
        self.vhs > 0.0 || self.glitch > 0.0 || self.grain > 0.0 || self.wave_amp > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_size_is_gpu_aligned() {
        // Uniform buffer bindings require a 16-byte-multiple size.
        assert_eq!(std::mem::size_of::<FilterUniforms>(), 112);
    }

    #[test]
    fn toggle_is_set_xor() {
        let mut stack = EffectStack::new();
        let inst = EffectInstance::new(
            EffectKind::Bloom(BloomParams {
                intensity: 0.8,
                threshold: 0.5,
            }),
            "bloom-a",
        );
        stack.toggle(inst.clone());
        assert!(stack.contains(EffectTag::Bloom, "bloom-a"));
        stack.toggle(inst.clone());
        assert!(!stack.contains(EffectTag::Bloom, "bloom-a"));
        // Twice more returns to prior membership and parameter values.
        stack.toggle(inst.clone());
        assert_eq!(stack.iter().next().unwrap().kind, inst.kind);
    }

    #[test]
    fn update_replaces_parameters_in_place() {
        let mut stack = EffectStack::new();
        stack.toggle(EffectInstance::new(
            EffectKind::Vhs(VhsParams { intensity: 0.2 }),
            "v",
        ));
        assert!(stack.update(
            EffectTag::Vhs,
            "v",
            EffectKind::Vhs(VhsParams { intensity: 0.9 }),
        ));
        let u = FilterUniforms::resolve(&Adjustments::default(), &stack, 0.0, 4, 4);
        assert!((u.vhs - 0.9).abs() < 1e-6);
        assert!(!stack.update(
            EffectTag::Vhs,
            "missing",
            EffectKind::Vhs(VhsParams { intensity: 0.1 }),
        ));
    }

    #[test]
    fn same_kind_different_label_coexists() {
        let mut stack = EffectStack::new();
        stack.toggle(EffectInstance::new(
            EffectKind::Vignette(VignetteParams::default()),
            "soft",
        ));
        stack.toggle(EffectInstance::new(
            EffectKind::Vignette(VignetteParams::default()),
            "hard",
        ));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn zero_intensity_bloom_resolves_to_empty_stack_uniforms() {
        let adj = Adjustments::default();
        let empty = EffectStack::new();
        let mut with_bloom = EffectStack::new();
        with_bloom.toggle(EffectInstance::new(
            EffectKind::Bloom(BloomParams {
                intensity: 0.0,
                threshold: 0.7,
            }),
            "b",
        ));
        let a = FilterUniforms::resolve(&adj, &empty, 1.5, 640, 480);
        let b = FilterUniforms::resolve(&adj, &with_bloom, 1.5, 640, 480);
        assert_eq!(a, b);
    }

    #[test]
    fn disabled_instances_contribute_nothing() {
        let adj = Adjustments::default();
        let mut stack = EffectStack::new();
        stack.toggle(EffectInstance::new(
            EffectKind::CrtWarp(CrtWarpParams { intensity: 0.9 }),
            "crt",
        ));
        stack.set_enabled(EffectTag::CrtWarp, "crt", false);
        let u = FilterUniforms::resolve(&adj, &stack, 0.0, 100, 100);
        assert_eq!(u.crt, 0.0);
        assert!(u.is_neutral());
    }

    #[test]
    fn adjustments_map_percent_to_factor() {
        let adj = Adjustments {
            brightness: 150.0,
            contrast: 50.0,
            saturation: 100.0,
        };
        let u = FilterUniforms::resolve(&adj, &EffectStack::new(), 0.0, 10, 10);
        assert!((u.brightness - 1.5).abs() < 1e-6);
        assert!((u.contrast - 0.5).abs() < 1e-6);
        assert!((u.saturation - 1.0).abs() < 1e-6);
    }

    #[test]
    fn animated_detection() {
        let mut u = FilterUniforms::neutral(0.0, 1, 1);
        assert!(!u.is_animated());
        u.grain = 0.2;
        assert!(u.is_animated());
    }
}
