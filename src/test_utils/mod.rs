//! Shared test utilities for growctl.

pub mod channel;
pub mod fixtures;

use std::sync::{Arc, Mutex};

pub use channel::{ScriptedCandidate, ScriptedChannel, ScriptedLine};
pub use fixtures::RootFixture;

use crate::error::Result;
use crate::storage::{InteractionRecord, InteractionSink};

/// In-memory [`InteractionSink`]; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<InteractionRecord>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl InteractionSink for MemorySink {
    fn append(&mut self, record: &InteractionRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
