// ============================================================================
// ERROR TAXONOMY — editor-level failures that surface to the caller
// ============================================================================
//
// Input anomalies (missing pressure, extra pointers, out-of-bounds fill
// seeds) are tolerated locally and never appear here.  What does appear:
// resource failures at construction time, capture/bake failures, and
// readback failures.  Undo/redo underflow is a no-op, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no compatible GPU adapter available")]
    GpuUnavailable,

    #[error("GPU device request failed: {0}")]
    DeviceRequest(String),

    #[error("filter shader validation failed: {0}")]
    ShaderValidation(String),

    #[error("filter stage has no source image")]
    NoSource,

    #[error("no rendered frame available for capture")]
    NoFrame,

    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("unknown layer id {0}")]
    NoSuchLayer(u64),

    #[error("bake failed: {0}")]
    Bake(String),
}
