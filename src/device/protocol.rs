//! Text command vocabulary and readout parsing for the enclosure firmware.
//!
//! Commands are single newline-terminated words. Readouts come back as one
//! line of comma-separated numbers, e.g. `25.3,61.0,302,512`.

use crate::bandit::Action;
use crate::error::{GrowError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Actuation command for a bandit action.
    Act(Action),
    /// Handshake probe (`PING`).
    Probe(String),
    /// Readout request such as `REQUEST_GREEN`.
    Readout(String),
}

impl Command {
    #[must_use]
    pub fn wire(&self) -> &str {
        match self {
            Self::Act(action) => action.wire_command(),
            Self::Probe(word) | Self::Readout(word) => word,
        }
    }

    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}\n", self.wire())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire())
    }
}

/// Parse a readout line into exactly `expected` finite numbers.
pub fn parse_reading(line: &str, expected: usize) -> Result<Vec<f64>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(GrowError::malformed(line, "empty line"));
    }

    let values = trimmed
        .split(',')
        .map(|field| {
            let field = field.trim();
            let value = field
                .parse::<f64>()
                .map_err(|err| GrowError::malformed(line, format!("field {field:?}: {err}")))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(GrowError::malformed(line, format!("field {field:?} is not finite")))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if values.len() != expected {
        return Err(GrowError::malformed(
            line,
            format!("expected {expected} fields, got {}", values.len()),
        ));
    }
    Ok(values)
}
