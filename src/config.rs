use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};

use crate::bandit::{LinUcbConfig, RewardWeights};
use crate::bootstrap::{DEFAULT_FEATURES, Observation};
use crate::device::HandshakeConfig;
use crate::error::{GrowError, Result};
use crate::storage::LogSchema;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("GROWCTL_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(GrowError::MissingConfig(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("growctl/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| GrowError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| GrowError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.model {
            self.model.merge(patch);
        }
        if let Some(patch) = patch.reward {
            self.reward.merge(patch);
        }
        if let Some(patch) = patch.timing {
            self.timing.merge(patch);
        }
        if let Some(patch) = patch.device {
            self.device.merge(patch);
        }
        if let Some(patch) = patch.log {
            self.log.merge(patch);
        }
        if let Some(patch) = patch.bootstrap {
            self.bootstrap.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_f64("GROWCTL_ALPHA")? {
            self.model.alpha = value;
        }
        if let Some(value) = env_f64("GROWCTL_FORGETTING_FACTOR")? {
            self.model.forgetting_factor = value;
        }
        if let Some(values) = env_list("GROWCTL_FEATURES") {
            self.model.features = values;
        }

        if let Some(value) = env_string("GROWCTL_REWARD_PRIMARY") {
            self.reward.primary = value;
        }
        if let Some(value) = env_string("GROWCTL_REWARD_SECONDARY") {
            self.reward.secondary = value;
        }
        if let Some(value) = env_f64("GROWCTL_REWARD_PRIMARY_WEIGHT")? {
            self.reward.primary_weight = value;
        }
        if let Some(value) = env_f64("GROWCTL_REWARD_SECONDARY_WEIGHT")? {
            self.reward.secondary_weight = value;
        }

        if let Some(value) = env_duration("GROWCTL_SETTLE_DELAY")? {
            self.timing.settle_delay = value;
        }
        if let Some(value) = env_duration("GROWCTL_IDLE_DELAY")? {
            self.timing.idle_delay = value;
        }

        if let Some(values) = env_list("GROWCTL_PORTS") {
            self.device.ports = values;
        }
        if let Some(value) = env_u32("GROWCTL_BAUD_RATE")? {
            self.device.baud_rate = value;
        }
        if let Some(value) = env_bool("GROWCTL_ACCEPT_SILENT") {
            self.device.accept_silent = value;
        }
        if let Some(value) = env_duration("GROWCTL_READ_TIMEOUT")? {
            self.device.read_timeout = value;
        }
        if let Some(value) = env_u32("GROWCTL_MAX_DEVICE_FAULTS")? {
            self.device.max_device_faults = value;
        }

        if let Some(value) = env_string("GROWCTL_LOG_PATH") {
            self.log.path = PathBuf::from(value);
        }

        if let Some(value) = env_bool("GROWCTL_USE_SEED") {
            self.bootstrap.use_seed = value;
        }
        if let Some(value) = env_bool("GROWCTL_REPLAY_HISTORY") {
            self.bootstrap.replay_history = value;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.linucb().validate()?;

        let features = &self.model.features;
        if features.is_empty() {
            return Err(GrowError::Config("model.features must not be empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = features.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(GrowError::Config(format!("duplicate feature {dup}")));
        }

        self.reward_indices()?;
        if self.reward.primary == self.reward.secondary {
            return Err(GrowError::Config(
                "reward.primary and reward.secondary must differ".into(),
            ));
        }
        if !(self.reward.primary_weight.is_finite() && self.reward.secondary_weight.is_finite()) {
            return Err(GrowError::Config("reward weights must be finite".into()));
        }

        if self.device.baud_rate == 0 {
            return Err(GrowError::Config("device.baud_rate must be positive".into()));
        }

        if let Some(rows) = &self.bootstrap.seed {
            if let Some(row) = rows.iter().find(|row| row.context.len() != features.len()) {
                return Err(GrowError::InvalidInput {
                    expected: features.len(),
                    actual: row.context.len(),
                });
            }
        }

        Ok(())
    }

    /// Number of context features, F.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.model.features.len()
    }

    #[must_use]
    pub const fn linucb(&self) -> LinUcbConfig {
        LinUcbConfig {
            alpha: self.model.alpha,
            forgetting_factor: self.model.forgetting_factor,
        }
    }

    #[must_use]
    pub const fn reward_weights(&self) -> RewardWeights {
        RewardWeights {
            primary: self.reward.primary_weight,
            secondary: self.reward.secondary_weight,
        }
    }

    /// Positions of the reward measurements inside the context vector.
    pub fn reward_indices(&self) -> Result<(usize, usize)> {
        let index = |name: &str| {
            self.model
                .features
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| {
                    GrowError::Config(format!("reward feature {name} is not in model.features"))
                })
        };
        Ok((index(&self.reward.primary)?, index(&self.reward.secondary)?))
    }

    #[must_use]
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            probe: self.device.probe.clone(),
            ack: self.device.ack.clone(),
            open_delay: self.device.open_delay,
            probe_timeout: self.device.probe_timeout,
            accept_silent: self.device.accept_silent,
        }
    }

    #[must_use]
    pub fn log_schema(&self) -> LogSchema {
        LogSchema {
            features: self.model.features.clone(),
            primary: self.reward.primary.clone(),
            secondary: self.reward.secondary.clone(),
        }
    }

    /// Log location; relative paths resolve against `root`.
    #[must_use]
    pub fn log_path(&self, root: &Path) -> PathBuf {
        if self.log.path.is_absolute() {
            self.log.path.clone()
        } else {
            root.join(&self.log.path)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_forgetting_factor")]
    pub forgetting_factor: f64,
    #[serde(default = "default_features")]
    pub features: Vec<String>,
}

const fn default_alpha() -> f64 {
    1.0
}

const fn default_forgetting_factor() -> f64 {
    1.0
}

fn default_features() -> Vec<String> {
    DEFAULT_FEATURES.iter().map(|f| (*f).to_string()).collect()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            forgetting_factor: default_forgetting_factor(),
            features: default_features(),
        }
    }
}

impl ModelConfig {
    fn merge(&mut self, patch: ModelPatch) {
        if let Some(value) = patch.alpha {
            self.alpha = value;
        }
        if let Some(value) = patch.forgetting_factor {
            self.forgetting_factor = value;
        }
        if let Some(values) = patch.features {
            self.features = values;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    pub primary: String,
    pub secondary: String,
    pub primary_weight: f64,
    pub secondary_weight: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        let weights = RewardWeights::default();
        Self {
            primary: "green".to_string(),
            secondary: "resistor_average".to_string(),
            primary_weight: weights.primary,
            secondary_weight: weights.secondary,
        }
    }
}

impl RewardConfig {
    fn merge(&mut self, patch: RewardPatch) {
        if let Some(value) = patch.primary {
            self.primary = value;
        }
        if let Some(value) = patch.secondary {
            self.secondary = value;
        }
        if let Some(value) = patch.primary_weight {
            self.primary_weight = value;
        }
        if let Some(value) = patch.secondary_weight {
            self.secondary_weight = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait between dispatching an action and measuring its effect.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    /// Pause between cycles.
    #[serde(with = "humantime_serde")]
    pub idle_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(600),
            idle_delay: Duration::from_secs(1),
        }
    }
}

impl TimingConfig {
    fn merge(&mut self, patch: TimingPatch) {
        if let Some(value) = patch.settle_delay {
            self.settle_delay = value;
        }
        if let Some(value) = patch.idle_delay {
            self.idle_delay = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Candidate ports in order; empty means every port the OS reports.
    pub ports: Vec<String>,
    pub baud_rate: u32,
    #[serde(with = "humantime_serde")]
    pub open_delay: Duration,
    pub probe: String,
    pub ack: String,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    pub accept_silent: bool,
    /// Readout request for the pre-action context. Without one the loop
    /// waits for the line the device pushes on its own.
    pub context_request: Option<String>,
    pub post_request: String,
    /// Consecutive timeouts or link errors after which the device counts as
    /// lost. Zero never gives up.
    pub max_device_faults: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let handshake = HandshakeConfig::default();
        Self {
            ports: Vec::new(),
            baud_rate: 9600,
            open_delay: handshake.open_delay,
            probe: handshake.probe,
            ack: handshake.ack,
            probe_timeout: handshake.probe_timeout,
            read_timeout: Duration::from_secs(300),
            accept_silent: handshake.accept_silent,
            context_request: None,
            post_request: "REQUEST_GREEN".to_string(),
            max_device_faults: 5,
        }
    }
}

impl DeviceConfig {
    fn merge(&mut self, patch: DevicePatch) {
        if let Some(values) = patch.ports {
            self.ports = values;
        }
        if let Some(value) = patch.baud_rate {
            self.baud_rate = value;
        }
        if let Some(value) = patch.open_delay {
            self.open_delay = value;
        }
        if let Some(value) = patch.probe {
            self.probe = value;
        }
        if let Some(value) = patch.ack {
            self.ack = value;
        }
        if let Some(value) = patch.probe_timeout {
            self.probe_timeout = value;
        }
        if let Some(value) = patch.read_timeout {
            self.read_timeout = value;
        }
        if let Some(value) = patch.accept_silent {
            self.accept_silent = value;
        }
        if let Some(value) = patch.context_request {
            self.context_request = Some(value);
        }
        if let Some(value) = patch.post_request {
            self.post_request = value;
        }
        if let Some(value) = patch.max_device_faults {
            self.max_device_faults = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("interactions.csv"),
        }
    }
}

impl LogConfig {
    fn merge(&mut self, patch: LogPatch) {
        if let Some(value) = patch.path {
            self.path = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub use_seed: bool,
    pub replay_history: bool,
    /// Replaces the built-in seed table.
    pub seed: Option<Vec<Observation>>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            use_seed: true,
            replay_history: true,
            seed: None,
        }
    }
}

impl BootstrapConfig {
    fn merge(&mut self, patch: BootstrapPatch) {
        if let Some(value) = patch.use_seed {
            self.use_seed = value;
        }
        if let Some(value) = patch.replay_history {
            self.replay_history = value;
        }
        if let Some(rows) = patch.seed {
            self.seed = Some(rows);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub model: Option<ModelPatch>,
    pub reward: Option<RewardPatch>,
    pub timing: Option<TimingPatch>,
    pub device: Option<DevicePatch>,
    pub log: Option<LogPatch>,
    pub bootstrap: Option<BootstrapPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ModelPatch {
    pub alpha: Option<f64>,
    pub forgetting_factor: Option<f64>,
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RewardPatch {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub primary_weight: Option<f64>,
    pub secondary_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TimingPatch {
    #[serde(default, with = "humantime_serde")]
    pub settle_delay: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub idle_delay: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DevicePatch {
    pub ports: Option<Vec<String>>,
    pub baud_rate: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub open_delay: Option<Duration>,
    pub probe: Option<String>,
    pub ack: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub probe_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub read_timeout: Option<Duration>,
    pub accept_silent: Option<bool>,
    pub context_request: Option<String>,
    pub post_request: Option<String>,
    pub max_device_faults: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LogPatch {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BootstrapPatch {
    pub use_seed: Option<bool>,
    pub replay_history: Option<bool>,
    pub seed: Option<Vec<Observation>>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u32>().map(Some).map_err(|err| {
            GrowError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<f64>().map(Some).map_err(|err| {
            GrowError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_duration(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(value) => parse_duration(&value)
            .map(Some)
            .map_err(|err| GrowError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn parse_duration(value: &str) -> std::result::Result<Duration, serde::de::value::Error> {
    let deserializer: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
        value.into_deserializer();
    humantime_serde::deserialize(deserializer)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
}
