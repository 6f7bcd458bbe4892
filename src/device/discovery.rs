//! Probe-and-acknowledge handshake over a list of candidate links.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{ChannelCandidate, Command, SensorChannel};
use crate::error::{GrowError, Result};

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Word sent to each candidate after opening.
    pub probe: String,
    /// Case-insensitive substring expected in the reply.
    pub ack: String,
    /// Pause after opening; boards typically reset when the port opens.
    pub open_delay: Duration,
    /// How long to wait for an acknowledgement.
    pub probe_timeout: Duration,
    /// Accept a candidate that opened but never answered.
    pub accept_silent: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            probe: "PING".to_string(),
            ack: "ARDUINO".to_string(),
            open_delay: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(3),
            accept_silent: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum ProbeOutcome {
    Acknowledged(String),
    WrongReply(String),
    Silent,
    OpenFailed(String),
}

impl ProbeOutcome {
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub candidate: String,
    pub outcome: ProbeOutcome,
}

/// An open link that passed the handshake.
pub struct Connected {
    pub candidate: String,
    pub channel: Box<dyn SensorChannel>,
}

impl std::fmt::Debug for Connected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connected")
            .field("candidate", &self.candidate)
            .finish_non_exhaustive()
    }
}

pub struct ChannelDiscovery {
    candidates: Vec<Box<dyn ChannelCandidate>>,
    handshake: HandshakeConfig,
}

impl ChannelDiscovery {
    #[must_use]
    pub fn new(candidates: Vec<Box<dyn ChannelCandidate>>, handshake: HandshakeConfig) -> Self {
        Self {
            candidates,
            handshake,
        }
    }

    /// Return the first candidate that passes the handshake.
    pub fn connect(&self) -> Result<Connected> {
        info!(count = self.candidates.len(), "Searching for device");

        for candidate in &self.candidates {
            let (outcome, channel) = self.probe(candidate.as_ref());
            match (outcome, channel) {
                (ProbeOutcome::Acknowledged(reply), Some(channel)) => {
                    info!(port = candidate.name(), %reply, "Device connected");
                    return Ok(Connected {
                        candidate: candidate.name().to_string(),
                        channel,
                    });
                }
                (ProbeOutcome::Silent, Some(channel)) if self.handshake.accept_silent => {
                    warn!(
                        port = candidate.name(),
                        "Candidate opened but did not answer; accepting it anyway"
                    );
                    return Ok(Connected {
                        candidate: candidate.name().to_string(),
                        channel,
                    });
                }
                (outcome, _) => {
                    debug!(port = candidate.name(), ?outcome, "Candidate rejected");
                }
            }
        }

        Err(GrowError::DeviceNotFound {
            tried: self.candidates.len(),
        })
    }

    /// Probe every candidate and report what each one did, closing them all.
    #[must_use]
    pub fn probe_all(&self) -> Vec<ProbeReport> {
        self.candidates
            .iter()
            .map(|candidate| ProbeReport {
                candidate: candidate.name().to_string(),
                outcome: self.probe(candidate.as_ref()).0,
            })
            .collect()
    }

    fn probe(
        &self,
        candidate: &dyn ChannelCandidate,
    ) -> (ProbeOutcome, Option<Box<dyn SensorChannel>>) {
        debug!(port = candidate.name(), "Probing candidate");

        let mut channel = match candidate.open() {
            Ok(channel) => channel,
            Err(err) => return (ProbeOutcome::OpenFailed(err.to_string()), None),
        };

        if !self.handshake.open_delay.is_zero() {
            std::thread::sleep(self.handshake.open_delay);
        }

        let outcome = match self.exchange(channel.as_mut()) {
            Ok(outcome) => outcome,
            Err(err) => return (ProbeOutcome::OpenFailed(err.to_string()), None),
        };
        (outcome, Some(channel))
    }

    fn exchange(&self, channel: &mut dyn SensorChannel) -> Result<ProbeOutcome> {
        channel.clear_input()?;
        channel.send(&Command::Probe(self.handshake.probe.clone()))?;

        let ack = self.handshake.ack.to_uppercase();
        let deadline = Instant::now() + self.handshake.probe_timeout;
        let mut last_reply = None;

        // Boot banners may precede the acknowledgement.
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match channel.read_line(remaining) {
                Ok(line) if line.to_uppercase().contains(&ack) => {
                    return Ok(ProbeOutcome::Acknowledged(line));
                }
                Ok(line) => {
                    debug!(port = %channel.describe(), %line, "Unexpected handshake reply");
                    last_reply = Some(line);
                }
                Err(GrowError::DeviceTimeout(_)) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(last_reply.map_or(ProbeOutcome::Silent, ProbeOutcome::WrongReply))
    }
}
