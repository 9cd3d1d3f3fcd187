use serde::{Deserialize, Serialize};

use super::response::Usage;

/// Event within a streaming completion
///
/// Streams are lazy, single-pass, and non-restartable; usage totals
/// arrive near the end for the accounting layer above this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Incremental text content
    Delta(String),
    /// Token usage statistics, sent once when the provider reports them
    Usage(Usage),
    /// Stream has completed
    Done,
}
