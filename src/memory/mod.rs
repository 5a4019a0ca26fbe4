//! Long-term memory collaborator.
//!
//! Conversations recall relevant memory before each message and write a
//! summary when they are destroyed. The backend is pluggable through
//! [`MemoryStore`]; [`InMemoryStore`] is a process-local implementation.

pub mod traits;

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ClawError, Result};

pub use traits::MemoryStore;

/// Maximum characters of recalled memory injected into a conversation.
pub const MEMORY_INJECTION_BUDGET: usize = 2000;

/// One stored memory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    /// Stored text
    pub text: String,
    /// Who the text is about or from
    pub speaker: String,
    /// When it was stored
    pub created_at: DateTime<Utc>,
}

/// Memory kept in process memory.
///
/// Recall returns the newest entries sharing at least one word with the
/// query, newest first, within [`MEMORY_INJECTION_BUDGET`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<Vec<MemoryEntry>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn recall(&self, query: &str) -> Result<Option<String>> {
        let query_words = words(query);
        if query_words.is_empty() {
            return Ok(None);
        }
        let entries = self
            .entries
            .lock()
            .map_err(|_| ClawError::Session("memory store lock poisoned".into()))?;

        let mut out = String::new();
        for entry in entries.iter().rev() {
            let entry_words = words(&entry.text);
            if !query_words.iter().any(|w| entry_words.contains(w)) {
                continue;
            }
            let line = format!("- {}\n", entry.text);
            if out.chars().count() + line.chars().count() > MEMORY_INJECTION_BUDGET {
                break;
            }
            out.push_str(&line);
        }
        Ok((!out.is_empty()).then(|| out.trim_end().to_string()))
    }

    async fn write(&self, text: &str, speaker: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ClawError::Session("memory store lock poisoned".into()))?;
        entries.push(MemoryEntry {
            text: text.to_string(),
            speaker: speaker.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}
