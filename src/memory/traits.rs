//! Trait definitions for pluggable memory backends.

use async_trait::async_trait;

use crate::error::Result;

/// Long-term memory consulted by conversations.
///
/// Both methods may fail; callers treat failure as a degradation and keep
/// going without memory.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Memory relevant to `query`, or `None` if nothing matches.
    async fn recall(&self, query: &str) -> Result<Option<String>>;

    /// Store `text`, attributed to `speaker`.
    async fn write(&self, text: &str, speaker: &str) -> Result<()>;
}
