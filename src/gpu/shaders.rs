// ============================================================================
// GPU SHADERS — all WGSL code kept inline for containment
// ============================================================================

// ============================================================================
// FILTER SHADER — single-pass effect chain over the composited canvas
// ============================================================================
//
// One fullscreen quad, one fragment pass.  The uniform struct mirrors
// `FilterUniforms` field for field (26 scalars then a vec2, 112 bytes), so
// the CPU side uploads the struct with a single buffer write and no
// per-effect plumbing.
//
// Stages run in a fixed order: geometry warps first (kaleidoscope, wave,
// glitch, CRT barrel, VHS jitter, pixelate), then sampling with chromatic
// aberration, then color grading, then overlays (bloom, edge, scanlines,
// grain, vignette).  Every stage is gated on its intensity so a neutral
// uniform set reproduces the input exactly.
//
// `textureSampleLevel` throughout: sampling happens after data-dependent
// branches, where implicit-derivative sampling would violate uniformity.
pub const FILTER_SHADER: &str = r#"
struct FilterUniforms {
    brightness: f32,
    contrast: f32,
    saturation: f32,
    color_filter: f32,

    vhs: f32,
    glitch: f32,
    glitch_block: f32,
    glitch_speed: f32,

    bloom: f32,
    bloom_threshold: f32,
    chroma: f32,
    scan_intensity: f32,

    scan_count: f32,
    scan_thickness: f32,
    crt: f32,
    grain: f32,

    pixelate: f32,
    vignette: f32,
    vignette_radius: f32,
    kaleido_segments: f32,

    kaleido_angle: f32,
    wave_amp: f32,
    wave_freq: f32,
    wave_speed: f32,

    edge: f32,
    time: f32,
    tex_size: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: FilterUniforms;
@group(1) @binding(0) var src_tex: texture_2d<f32>;
@group(1) @binding(1) var src_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
    );
    let unit_pos = positions[vi];
    var out: VertexOutput;
    out.position = vec4<f32>(unit_pos * 2.0 - 1.0, 0.0, 1.0);
    // Flip Y so uv (0,0) is the image's top-left.
    out.uv = vec2<f32>(unit_pos.x, 1.0 - unit_pos.y);
    return out;
}

// Cheap 2D hash, stable per (coord, time-bucket) pair.
fn hash21(p: vec2<f32>) -> f32 {
    let h = dot(p, vec2<f32>(127.1, 311.7));
    return fract(sin(h) * 43758.5453123);
}

fn rgb2hsv(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    let p = mix(vec4<f32>(c.bg, k.wz), vec4<f32>(c.gb, k.xy), step(c.b, c.g));
    let q = mix(vec4<f32>(p.xyw, c.r), vec4<f32>(c.r, p.yzx), step(p.x, c.r));
    let d = q.x - min(q.w, q.y);
    let e = 1.0e-10;
    return vec3<f32>(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

fn hsv2rgb(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    let p = abs(fract(c.xxx + k.xyz) * 6.0 - k.www);
    return c.z * mix(k.xxx, clamp(p - k.xxx, vec3<f32>(0.0), vec3<f32>(1.0)), c.y);
}

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.299, 0.587, 0.114));
}

fn sample_src(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(src_tex, src_samp, uv, 0.0);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var uv = in.uv;

    // ---- geometry stages --------------------------------------------------

    if (u.kaleido_segments >= 2.0) {
        let c = uv - vec2<f32>(0.5);
        let r = length(c);
        var a = atan2(c.y, c.x) + u.kaleido_angle;
        let seg = 6.28318530718 / u.kaleido_segments;
        a = a - seg * floor(a / seg);
        a = abs(a - seg * 0.5);
        uv = clamp(vec2<f32>(0.5) + vec2<f32>(cos(a), sin(a)) * r,
                   vec2<f32>(0.0), vec2<f32>(1.0));
    }

    if (u.wave_amp > 0.0) {
        let phase = u.time * u.wave_speed;
        uv.x = uv.x + sin(uv.y * u.wave_freq + phase) * u.wave_amp / u.tex_size.x;
        uv.y = uv.y + cos(uv.x * u.wave_freq + phase) * u.wave_amp / u.tex_size.y;
    }

    if (u.glitch > 0.0) {
        let block = floor(uv.y * u.tex_size.y / max(u.glitch_block, 1.0));
        let bucket = floor(u.time * u.glitch_speed);
        let jitter = hash21(vec2<f32>(block, bucket)) - 0.5;
        // Only some blocks tear per bucket.
        if (hash21(vec2<f32>(bucket, block)) < 0.3 * u.glitch) {
            uv.x = uv.x + jitter * 0.2 * u.glitch;
        }
    }

    if (u.crt > 0.0) {
        let c = uv - vec2<f32>(0.5);
        let r2 = dot(c, c);
        uv = vec2<f32>(0.5) + c * (1.0 + u.crt * 0.35 * r2);
    }

    // Barrel distortion can push uv off the image; those pixels go black.
    let oob = uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0;
    uv = clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0));

    if (u.vhs > 0.0) {
        let line = floor(uv.y * u.tex_size.y);
        let jitter = hash21(vec2<f32>(line, floor(u.time * 24.0))) - 0.5;
        uv.x = uv.x + jitter * 0.012 * u.vhs;
    }

    if (u.pixelate > 1.0) {
        uv = (floor(uv * u.tex_size / u.pixelate) + vec2<f32>(0.5)) * u.pixelate / u.tex_size;
    }

    // ---- sampling, with chromatic aberration ------------------------------

    let radial = length(uv - vec2<f32>(0.5)) * 2.0;
    let fringe = u.chroma * 0.01 + u.crt * 0.01 * radial;
    var color = sample_src(uv);
    if (fringe > 0.0) {
        let off = vec2<f32>(fringe, 0.0);
        color.r = sample_src(clamp(uv + off, vec2<f32>(0.0), vec2<f32>(1.0))).r;
        color.b = sample_src(clamp(uv - off, vec2<f32>(0.0), vec2<f32>(1.0))).b;
    }
    var rgb = color.rgb;

    // ---- color grading ----------------------------------------------------

    // brightness/contrast/saturation arrive as ratios, 1.0 neutral.
    rgb = rgb * u.brightness;
    rgb = (rgb - vec3<f32>(0.5)) * u.contrast + vec3<f32>(0.5);

    if (abs(u.saturation - 1.0) > 0.0001) {
        var hsv = rgb2hsv(clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0)));
        hsv.y = clamp(hsv.y * u.saturation, 0.0, 1.0);
        rgb = hsv2rgb(hsv);
    }

    if (u.color_filter > 0.5 && u.color_filter < 1.5) {
        rgb = vec3<f32>(luma(rgb)); // grayscale
    } else if (u.color_filter < 2.5 && u.color_filter >= 1.5) {
        let l = rgb;
        rgb = vec3<f32>(
            dot(l, vec3<f32>(0.393, 0.769, 0.189)),
            dot(l, vec3<f32>(0.349, 0.686, 0.168)),
            dot(l, vec3<f32>(0.272, 0.534, 0.131)),
        ); // sepia
    } else if (u.color_filter >= 2.5) {
        rgb = vec3<f32>(1.0) - rgb; // invert
    }

    // ---- overlays ---------------------------------------------------------

    if (u.bloom > 0.0) {
        let texel = vec2<f32>(1.0) / u.tex_size;
        var glow = vec3<f32>(0.0);
        for (var dy = -1; dy <= 1; dy = dy + 1) {
            for (var dx = -1; dx <= 1; dx = dx + 1) {
                let n = sample_src(clamp(uv + vec2<f32>(f32(dx), f32(dy)) * texel * 2.0,
                                         vec2<f32>(0.0), vec2<f32>(1.0))).rgb;
                if (luma(n) > u.bloom_threshold) {
                    glow = glow + n;
                }
            }
        }
        rgb = rgb + glow / 9.0 * u.bloom;
    }

    if (u.edge > 0.0) {
        let texel = vec2<f32>(1.0) / u.tex_size;
        let l00 = luma(sample_src(uv + vec2<f32>(-texel.x, -texel.y)).rgb);
        let l01 = luma(sample_src(uv + vec2<f32>(0.0, -texel.y)).rgb);
        let l02 = luma(sample_src(uv + vec2<f32>(texel.x, -texel.y)).rgb);
        let l10 = luma(sample_src(uv + vec2<f32>(-texel.x, 0.0)).rgb);
        let l12 = luma(sample_src(uv + vec2<f32>(texel.x, 0.0)).rgb);
        let l20 = luma(sample_src(uv + vec2<f32>(-texel.x, texel.y)).rgb);
        let l21 = luma(sample_src(uv + vec2<f32>(0.0, texel.y)).rgb);
        let l22 = luma(sample_src(uv + vec2<f32>(texel.x, texel.y)).rgb);
        let gx = (l02 + 2.0 * l12 + l22) - (l00 + 2.0 * l10 + l20);
        let gy = (l20 + 2.0 * l21 + l22) - (l00 + 2.0 * l01 + l02);
        let mag = clamp(sqrt(gx * gx + gy * gy), 0.0, 1.0);
        rgb = mix(rgb, vec3<f32>(mag), u.edge);
    }

    if (u.scan_intensity > 0.0) {
        let s = pow(abs(sin(uv.y * u.scan_count * 3.14159265)), u.scan_thickness);
        rgb = rgb * (1.0 - u.scan_intensity * (1.0 - s));
    }

    if (u.grain > 0.0) {
        let n = hash21(uv * u.tex_size + vec2<f32>(u.time * 60.0, u.time * 37.0));
        rgb = rgb + (n - 0.5) * 0.15 * u.grain;
    }

    if (u.vignette > 0.0) {
        let d = length(uv - vec2<f32>(0.5)) / 0.70710678;
        let v = smoothstep(u.vignette_radius, 1.0, d);
        rgb = rgb * (1.0 - u.vignette * v);
    }

    rgb = clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0));
    if (oob) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }
    return vec4<f32>(rgb, color.a);
}
"#;
