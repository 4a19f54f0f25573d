use std::path::PathBuf;
use std::time::Duration;

use crate::engine::ViewConfig;

/// Configuration for a [`HudCore`](crate::HudCore) instance.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL prefix prepended to the document path given to `create_view`.
    pub views_root: String,
    /// Surface size used when realizing engine views, in pixels.
    pub surface_width: u32,
    pub surface_height: u32,
    /// Maximum number of queued operations per view.
    pub operation_queue_capacity: usize,
    /// Spacing between engine update ticks on the background ticker.
    pub update_interval: Duration,
    /// Delay before the ticker retries after a failed update.
    pub update_backoff: Duration,
    /// Default pixels scrolled per wheel line.
    pub default_scroll_step: i32,
    /// Optional PNG drawn as the cursor overlay while a view holds focus.
    pub cursor_image: Option<PathBuf>,
    /// Settings passed to the engine when constructing views.
    pub view_config: ViewConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            views_root: "file:///ui/views".to_string(),
            surface_width: 1920,
            surface_height: 1080,
            operation_queue_capacity: 100,
            update_interval: Duration::from_millis(1),
            update_backoff: Duration::from_secs(1),
            default_scroll_step: 28,
            cursor_image: None,
            view_config: ViewConfig::default(),
        }
    }
}
