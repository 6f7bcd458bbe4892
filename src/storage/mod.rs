//! Persistence of completed control cycles.
//!
//! The control loop hands each finished cycle to an [`InteractionSink`]; the
//! production sink is the append-only CSV log, which also feeds warm starts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bandit::{Action, Measurement};
use crate::error::Result;

pub mod interaction_log;

pub use interaction_log::{CsvInteractionLog, LogSchema};

/// One completed cycle. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    /// Pre-action context; also carries the pre-action measurement.
    pub context: Vec<f64>,
    pub action: Action,
    /// Post-action measurement.
    pub after: Measurement,
    pub reward: f64,
}

/// Destination for completed cycles.
pub trait InteractionSink {
    /// Persist `record` as a whole; a partial row must never be visible.
    fn append(&mut self, record: &InteractionRecord) -> Result<()>;
}
