//! Append-only CSV interaction log.
//!
//! Layout: `timestamp, <features...>, action, <primary>_after,
//! <secondary>_after, reward`. The two reward measurements appear among the
//! features as `<name>_before`, pairing them with their `_after` columns.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use super::{InteractionRecord, InteractionSink};
use crate::bandit::Action;
use crate::bootstrap::Observation;
use crate::error::{GrowError, Result};

/// Column naming for one deployment's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSchema {
    pub features: Vec<String>,
    pub primary: String,
    pub secondary: String,
}

impl LogSchema {
    /// Column holding `feature`'s pre-action value.
    #[must_use]
    pub fn feature_column(&self, feature: &str) -> String {
        if feature == self.primary || feature == self.secondary {
            format!("{feature}_before")
        } else {
            feature.to_string()
        }
    }

    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.features.len() + 5);
        header.push("timestamp".to_string());
        header.extend(self.features.iter().map(|f| self.feature_column(f)));
        header.push("action".to_string());
        header.push(format!("{}_after", self.primary));
        header.push(format!("{}_after", self.secondary));
        header.push("reward".to_string());
        header
    }
}

#[derive(Debug, Clone)]
pub struct CsvInteractionLog {
    path: PathBuf,
    schema: LogSchema,
}

impl CsvInteractionLog {
    /// Open a log, checking that an existing file uses the same columns.
    pub fn open(path: impl Into<PathBuf>, schema: LogSchema) -> Result<Self> {
        let path = path.into();
        if let Some(existing) = read_header(&path)? {
            let expected = schema.header();
            if existing != expected {
                return Err(GrowError::Log(format!(
                    "{} has columns [{}], expected [{}]",
                    path.display(),
                    existing.join(","),
                    expected.join(",")
                )));
            }
        }
        Ok(Self { path, schema })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn schema(&self) -> &LogSchema {
        &self.schema
    }

    fn encode(&self, record: &InteractionRecord, with_header: bool) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if with_header {
            writer.write_record(self.schema.header())?;
        }
        let mut row = Vec::with_capacity(self.schema.features.len() + 5);
        row.push(record.timestamp.to_rfc3339());
        row.extend(record.context.iter().map(ToString::to_string));
        row.push(record.action.index().to_string());
        row.push(record.after.primary.to_string());
        row.push(record.after.secondary.to_string());
        row.push(record.reward.to_string());
        writer.write_record(&row)?;
        writer
            .into_inner()
            .map_err(|err| GrowError::Log(format!("encode row: {err}")))
    }

    /// Read back every usable `(context, action, reward)` row.
    ///
    /// A missing or empty file yields nothing. A file without the expected
    /// columns is ignored with a warning; unparsable rows are skipped.
    pub fn replay(&self) -> Result<Vec<Observation>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No interaction history");
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let position = |name: &str| headers.iter().position(|h| h == name);
        // Bare feature names are accepted for the reward measurements too.
        let features: Option<Vec<usize>> = self
            .schema
            .features
            .iter()
            .map(|f| position(&self.schema.feature_column(f)).or_else(|| position(f)))
            .collect();
        let (Some(features), Some(action), Some(reward)) =
            (features, position("action"), position("reward"))
        else {
            warn!(
                path = %self.path.display(),
                "Interaction history lacks the configured columns; ignoring it"
            );
            return Ok(Vec::new());
        };

        let mut observations = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let parsed = result
                .map_err(|err| err.to_string())
                .and_then(|record| parse_row(&record, &features, action, reward));
            match parsed {
                Ok(observation) => observations.push(observation),
                Err(reason) => warn!(row = row + 2, %reason, "Skipping history row"),
            }
        }
        Ok(observations)
    }
}

impl InteractionSink for CsvInteractionLog {
    fn append(&mut self, record: &InteractionRecord) -> Result<()> {
        if record.context.len() != self.schema.features.len() {
            return Err(GrowError::InvalidInput {
                expected: self.schema.features.len(),
                actual: record.context.len(),
            });
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;
        let result = self.write_locked(&mut file, record);
        FileExt::unlock(&file)?;
        result
    }
}

impl CsvInteractionLog {
    fn write_locked(&self, file: &mut File, record: &InteractionRecord) -> Result<()> {
        let with_header = file.metadata()?.len() == 0;
        let bytes = self.encode(record, with_header)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?;
    if headers.is_empty() {
        return Ok(None);
    }
    Ok(Some(headers.iter().map(str::to_string).collect()))
}

fn parse_row(
    record: &csv::StringRecord,
    features: &[usize],
    action: usize,
    reward: usize,
) -> std::result::Result<Observation, String> {
    let field = |index: usize| {
        record
            .get(index)
            .map(str::trim)
            .ok_or_else(|| format!("missing column {index}"))
    };
    let number = |index: usize| -> std::result::Result<f64, String> {
        let raw = field(index)?;
        let value = raw
            .parse::<f64>()
            .map_err(|err| format!("{raw:?}: {err}"))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("{raw:?} is not finite"))
        }
    };

    let context = features
        .iter()
        .map(|&i| number(i))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let raw_action = field(action)?;
    let index = raw_action
        .parse::<usize>()
        .map_err(|err| format!("action {raw_action:?}: {err}"))?;
    let action = Action::from_index(index).map_err(|err| err.to_string())?;
    let reward = number(reward)?;

    Ok(Observation {
        context,
        action,
        reward,
    })
}
