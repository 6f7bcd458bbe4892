//! The closed control loop.
//!
//! One cycle walks `Idle → AwaitPreContext → ActionDispatched →
//! AwaitPostContext → Committed → Idle`. The model is updated only after a
//! reward has been computed from two valid measurements; a cycle that fails
//! with a recoverable error leaves no trace in the model or the log.

mod stop;

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use stop::{StopHandle, StopSignal, Wait, stop_pair};

use crate::bandit::{Action, LinUcb, Measurement, RewardWeights, compose_reward};
use crate::config::Config;
use crate::device::{Command, SensorChannel, parse_reading};
use crate::error::{GrowError, Result};
use crate::storage::{InteractionRecord, InteractionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    AwaitPreContext,
    ActionDispatched,
    AwaitPostContext,
    Committed,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::AwaitPreContext => "AWAIT_PRE_CONTEXT",
            Self::ActionDispatched => "ACTION_DISPATCHED",
            Self::AwaitPostContext => "AWAIT_POST_CONTEXT",
            Self::Committed => "COMMITTED",
        };
        f.write_str(name)
    }
}

/// Timing and protocol parameters of the loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub settle_delay: Duration,
    pub idle_delay: Duration,
    pub read_timeout: Duration,
    pub context_request: Option<String>,
    pub post_request: String,
    /// Positions of the primary and secondary measurement in the context.
    pub reward_indices: (usize, usize),
    pub weights: RewardWeights,
    /// Consecutive device faults tolerated before the device counts as lost;
    /// zero tolerates any number.
    pub max_device_faults: u32,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            settle_delay: config.timing.settle_delay,
            idle_delay: config.timing.idle_delay,
            read_timeout: config.device.read_timeout,
            context_request: config.device.context_request.clone(),
            post_request: config.device.post_request.clone(),
            reward_indices: config.reward_indices()?,
            weights: config.reward_weights(),
            max_device_faults: config.device.max_device_faults,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Committed(InteractionRecord),
    /// A stop request arrived before the cycle could commit.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoopSummary {
    pub committed: u64,
    pub discarded: u64,
    pub cumulative_reward: f64,
    pub stopped: bool,
}

pub struct ControlLoop {
    model: LinUcb,
    channel: Box<dyn SensorChannel>,
    sink: Box<dyn InteractionSink + Send>,
    settings: LoopSettings,
    state: CycleState,
}

impl ControlLoop {
    #[must_use]
    pub fn new(
        model: LinUcb,
        channel: Box<dyn SensorChannel>,
        sink: Box<dyn InteractionSink + Send>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            model,
            channel,
            sink,
            settings,
            state: CycleState::Idle,
        }
    }

    #[must_use]
    pub const fn model(&self) -> &LinUcb {
        &self.model
    }

    #[must_use]
    pub const fn state(&self) -> CycleState {
        self.state
    }

    #[must_use]
    pub fn into_model(self) -> LinUcb {
        self.model
    }

    fn transition(&mut self, next: CycleState) {
        debug!(from = %self.state, to = %next, "Cycle transition");
        self.state = next;
    }

    fn read_values(&mut self, expected: usize) -> Result<Vec<f64>> {
        let line = self.channel.read_line(self.settings.read_timeout)?;
        parse_reading(&line, expected)
    }

    /// Run one cycle. The loop is back in `Idle` afterwards whatever happens.
    pub fn run_cycle(&mut self, stop: &StopSignal) -> Result<CycleOutcome> {
        let outcome = self.cycle(stop);
        self.transition(CycleState::Idle);
        outcome
    }

    fn cycle(&mut self, stop: &StopSignal) -> Result<CycleOutcome> {
        self.transition(CycleState::AwaitPreContext);
        if let Some(request) = self.settings.context_request.clone() {
            self.channel.clear_input()?;
            self.channel.send(&Command::Readout(request))?;
        }
        let context = self.read_values(self.model.dimension())?;

        let action = Action::from_index(self.model.select(&context)?)?;
        self.channel.send(&Command::Act(action))?;
        self.transition(CycleState::ActionDispatched);
        debug!(%action, "Action dispatched");

        if stop.wait(self.settings.settle_delay) == Wait::Stopped {
            return Ok(CycleOutcome::Stopped);
        }

        self.transition(CycleState::AwaitPostContext);
        self.channel.clear_input()?;
        self.channel
            .send(&Command::Readout(self.settings.post_request.clone()))?;
        let after = Measurement::from_values(&self.read_values(2)?)?;

        let (primary, secondary) = self.settings.reward_indices;
        let before = Measurement::new(context[primary], context[secondary]);
        let reward = compose_reward(before, after, self.settings.weights);

        self.model.update(action.index(), &context, reward)?;
        let record = InteractionRecord {
            timestamp: Utc::now(),
            context,
            action,
            after,
            reward,
        };
        self.sink.append(&record)?;
        self.transition(CycleState::Committed);
        info!(%action, reward, "Cycle committed");

        Ok(CycleOutcome::Committed(record))
    }

    /// Run cycles until `max_cycles` attempts have been made or `stop` fires.
    ///
    /// Recoverable failures discard the cycle and the loop carries on; any
    /// other error ends the loop. So does a run of `max_device_faults`
    /// consecutive timeouts or link errors, reported as `DeviceLost`.
    pub fn run(&mut self, max_cycles: Option<u64>, stop: &StopSignal) -> Result<LoopSummary> {
        let mut summary = LoopSummary::default();
        let mut attempts = 0_u64;
        let mut device_faults = 0_u32;

        info!(channel = %self.channel.describe(), "Control loop started");
        loop {
            if stop.is_stopped() {
                summary.stopped = true;
                break;
            }

            match self.run_cycle(stop) {
                Ok(CycleOutcome::Committed(record)) => {
                    device_faults = 0;
                    summary.committed += 1;
                    summary.cumulative_reward += record.reward;
                }
                Ok(CycleOutcome::Stopped) => {
                    summary.stopped = true;
                    break;
                }
                Err(err) if err.is_recoverable() => {
                    summary.discarded += 1;
                    warn!(error = %err, "Cycle discarded");
                    if matches!(err, GrowError::DeviceTimeout(_) | GrowError::Device(_)) {
                        device_faults += 1;
                        let limit = self.settings.max_device_faults;
                        if limit > 0 && device_faults >= limit {
                            return Err(GrowError::DeviceLost(format!(
                                "{}: {device_faults} consecutive device faults",
                                self.channel.describe()
                            )));
                        }
                    } else {
                        device_faults = 0;
                    }
                }
                Err(err) => return Err(err),
            }

            attempts += 1;
            if max_cycles.is_some_and(|max| attempts >= max) {
                break;
            }
            if stop.wait(self.settings.idle_delay) == Wait::Stopped {
                summary.stopped = true;
                break;
            }
        }

        info!(
            committed = summary.committed,
            discarded = summary.discarded,
            cumulative_reward = summary.cumulative_reward,
            "Control loop finished"
        );
        Ok(summary)
    }
}
