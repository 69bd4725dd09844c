// ============================================================================
// GPU MODULE — wgpu-backed effect rendering
// ============================================================================
//
// Architecture:
//   context.rs — wgpu Device, Queue, adapter init
//   shaders.rs — WGSL shader source (inline strings)
//   filter.rs  — fullscreen effect pipeline with CPU readback
// ============================================================================

pub mod context;
pub mod filter;
pub mod shaders;

pub use context::GpuContext;
pub use filter::FilterRenderer;

/// Align `width * 4` up to wgpu's 256-byte `bytes_per_row` requirement.
pub(crate) fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (unaligned + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_alignment_is_256_bytes() {
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(128), 512);
        assert_eq!(aligned_bytes_per_row(100), 512);
    }
}
