// ============================================================================
// EDITOR CONFIGURATION
// ============================================================================

use serde::{Deserialize, Serialize};

/// Tunables the embedding client passes to `Editor::new`.
///
/// `preferred_gpu` is a free-form hint ("high performance", "low power",
/// "integrated", "discrete") mapped to a wgpu power preference at adapter
/// selection time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Maximum undo depth; oldest entries are evicted beyond this.
    pub history_cap: usize,
    /// Lower bound for the view-transform scale.
    pub min_zoom: f32,
    /// Upper bound for the view-transform scale.
    pub max_zoom: f32,
    pub preferred_gpu: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_cap: 20,
            min_zoom: 0.1,
            max_zoom: 10.0,
            preferred_gpu: "high performance".to_string(),
        }
    }
}
