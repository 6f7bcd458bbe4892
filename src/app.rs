use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bandit::{Action, LinUcb};
use crate::bootstrap::{Bootstrap, WarmStart};
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::device::{ChannelCandidate, ChannelDiscovery, SerialCandidate};
use crate::error::{GrowError, Result};
use crate::storage::CsvInteractionLog;

pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let root = Self::find_root()?;
        let config = Config::load(cli.config.as_deref(), &root)?;
        debug!(root = %root.display(), "Application root resolved");

        Ok(Self {
            root,
            config,
            robot_mode: cli.robot,
            output_format: cli.output_format(),
            verbosity: cli.verbose,
        })
    }

    fn find_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("GROWCTL_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, ".growctl") {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| GrowError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("growctl"))
    }

    pub fn interaction_log(&self) -> Result<CsvInteractionLog> {
        CsvInteractionLog::open(self.config.log_path(&self.root), self.config.log_schema())
    }

    /// Fresh model, warm-started from the seed table and the history in `log`.
    pub fn warm_model(&self, log: &CsvInteractionLog) -> Result<(LinUcb, WarmStart)> {
        let mut model = LinUcb::new(
            Action::COUNT,
            self.config.dimension(),
            self.config.linucb(),
        )?;
        let warm = Bootstrap::from_config(&self.config, Some(log))?.apply(&mut model)?;
        Ok((model, warm))
    }

    /// Serial candidates: the explicit port, else the configured list, else
    /// every port the OS reports.
    pub fn candidates(&self, port: Option<&str>) -> Result<Vec<Box<dyn ChannelCandidate>>> {
        let baud = self.config.device.baud_rate;
        let candidates = match port {
            Some(path) => vec![SerialCandidate::new(path, baud)],
            None if !self.config.device.ports.is_empty() => self
                .config
                .device
                .ports
                .iter()
                .map(|path| SerialCandidate::new(path.as_str(), baud))
                .collect(),
            None => SerialCandidate::enumerate(baud)?,
        };
        Ok(candidates
            .into_iter()
            .map(|c| Box::new(c) as Box<dyn ChannelCandidate>)
            .collect())
    }

    pub fn discovery(&self, port: Option<&str>) -> Result<ChannelDiscovery> {
        Ok(ChannelDiscovery::new(
            self.candidates(port)?,
            self.config.handshake(),
        ))
    }
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}
