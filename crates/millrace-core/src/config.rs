//! Engine configuration shared by drivers and operator factories.

use serde::{Deserialize, Serialize};

/// Default byte budget for one source page, interpreted as i32 doc ids.
pub const DEFAULT_PAGE_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Source page byte budget; `max_page_size` doc ids = `page_bytes / 4`.
    pub page_bytes: usize,

    /// Driver deadline in milliseconds. `None` runs without a deadline.
    pub deadline_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_bytes: DEFAULT_PAGE_BYTES,
            deadline_ms: None,
        }
    }
}

impl EngineConfig {
    /// Doc ids per source page under the byte budget.
    pub fn max_page_size(&self) -> usize {
        self.page_bytes / std::mem::size_of::<i32>()
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MILLRACE_PAGE_BYTES`: source page byte budget
    /// - `MILLRACE_DEADLINE_MS`: driver deadline in milliseconds
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MILLRACE_PAGE_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.page_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("MILLRACE_DEADLINE_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.deadline_ms = Some(v);
            }
        }

        cfg
    }
}
