//! Warm start: seed the model before the loop goes live.
//!
//! Observations are replayed through [`LinUcb::update`] in order: the seed
//! table first, then the persisted interaction history.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bandit::{Action, LinUcb};
use crate::config::Config;
use crate::error::Result;
use crate::storage::CsvInteractionLog;

/// A `(context, action, reward)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub context: Vec<f64>,
    pub action: Action,
    pub reward: f64,
}

impl Observation {
    #[must_use]
    pub fn new(context: Vec<f64>, action: Action, reward: f64) -> Self {
        Self {
            context,
            action,
            reward,
        }
    }
}

/// Default 7-feature layout: temperature, humidity, spectral channels and
/// the light-dependent resistor average.
pub const DEFAULT_FEATURES: [&str; 7] = [
    "temp",
    "moisture",
    "red",
    "deepRed",
    "blue",
    "green",
    "resistor_average",
];

/// Earlier 4-feature layout.
pub const COMPACT_FEATURES: [&str; 4] = ["temp", "moisture", "green", "resistor_average"];

/// Hand-made seed rows for the known feature layouts.
#[must_use]
pub fn builtin_seed(dimension: usize) -> Option<Vec<Observation>> {
    let rows: &[(&[f64], Action, f64)] = match dimension {
        7 => &[
            (&[25.0, 60.0, 180.0, 250.0, 70.0, 300.0, 300.0], Action::AddWater, 0.3),
            (&[26.0, 55.0, 175.0, 245.0, 68.0, 290.0, 100.0], Action::LightOff, 0.1),
            (&[24.0, 70.0, 190.0, 260.0, 75.0, 310.0, 100.0], Action::DoNothing, 0.4),
            (&[27.0, 50.0, 170.0, 240.0, 65.0, 280.0, 120.0], Action::LightOn, 0.2),
        ],
        4 => &[
            (&[25.0, 60.0, 300.0, 300.0], Action::AddWater, 0.3),
            (&[26.0, 55.0, 290.0, 100.0], Action::LightOff, 0.1),
            (&[24.0, 70.0, 310.0, 100.0], Action::DoNothing, 0.4),
            (&[27.0, 50.0, 280.0, 120.0], Action::LightOn, 0.2),
        ],
        _ => return None,
    };
    Some(
        rows.iter()
            .map(|(context, action, reward)| Observation::new(context.to_vec(), *action, *reward))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmStart {
    pub seed_rows: usize,
    pub history_rows: usize,
}

/// Ordered warm-start batch.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    seed: Vec<Observation>,
    history: Vec<Observation>,
}

impl Bootstrap {
    #[must_use]
    pub fn new(seed: Vec<Observation>, history: Vec<Observation>) -> Self {
        Self { seed, history }
    }

    /// Assemble the batch a deployment's configuration asks for.
    ///
    /// Configured seed rows replace the built-in table. A built-in table
    /// that does not fit the feature layout is skipped.
    pub fn from_config(config: &Config, log: Option<&CsvInteractionLog>) -> Result<Self> {
        let dimension = config.model.features.len();

        let seed = if !config.bootstrap.use_seed {
            Vec::new()
        } else if let Some(rows) = &config.bootstrap.seed {
            rows.clone()
        } else if let Some(rows) = builtin_seed(dimension) {
            rows
        } else {
            warn!(dimension, "No built-in seed table for this feature layout");
            Vec::new()
        };

        let history = match log {
            Some(log) if config.bootstrap.replay_history => log.replay()?,
            _ => Vec::new(),
        };

        Ok(Self::new(seed, history))
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.seed.iter().chain(self.history.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seed.len() + self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feed every observation into `model`, seed rows first.
    pub fn apply(&self, model: &mut LinUcb) -> Result<WarmStart> {
        for observation in self.observations() {
            model.update(
                observation.action.index(),
                &observation.context,
                observation.reward,
            )?;
        }
        let summary = WarmStart {
            seed_rows: self.seed.len(),
            history_rows: self.history.len(),
        };
        info!(
            seed_rows = summary.seed_rows,
            history_rows = summary.history_rows,
            "Model warm-started"
        );
        Ok(summary)
    }
}
