//! In-memory device link driven by a script.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::device::{ChannelCandidate, Command, SensorChannel};
use crate::error::{GrowError, Result};

/// What the scripted device produces on the next read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedLine {
    Line(String),
    Timeout,
    Fault(String),
    /// The device went away; every later read also fails.
    Closed,
}

#[derive(Debug, Default)]
struct Script {
    pending: VecDeque<ScriptedLine>,
    responses: HashMap<String, VecDeque<Vec<ScriptedLine>>>,
    sent: Vec<String>,
    clears: usize,
}

/// Scripted [`SensorChannel`].
///
/// Cloning shares the script, so a test can keep a handle after boxing the
/// channel and inspect what was sent. Replies registered with
/// [`respond_to`](Self::respond_to) become readable only once the matching
/// command is sent, so `clear_input` behaves like on a real port.
#[derive(Debug, Clone)]
pub struct ScriptedChannel {
    name: String,
    script: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue lines the device pushes without being asked.
    pub fn push_lines(&self, lines: &[&str]) {
        let mut script = self.script();
        script
            .pending
            .extend(lines.iter().map(|l| ScriptedLine::Line((*l).to_string())));
    }

    pub fn push(&self, line: ScriptedLine) {
        self.script().pending.push_back(line);
    }

    /// Reply with `lines` the next time `command` is sent.
    pub fn respond_to(&self, command: &str, lines: &[&str]) {
        let reply = lines
            .iter()
            .map(|l| ScriptedLine::Line((*l).to_string()))
            .collect();
        self.respond_with(command, reply);
    }

    pub fn respond_with(&self, command: &str, reply: Vec<ScriptedLine>) {
        self.script()
            .responses
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.script().sent.clone()
    }

    #[must_use]
    pub fn clears(&self) -> usize {
        self.script().clears
    }
}

impl SensorChannel for ScriptedChannel {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let mut script = self.script();
        let wire = command.wire().to_string();
        if let Some(reply) = script.responses.get_mut(&wire).and_then(VecDeque::pop_front) {
            script.pending.extend(reply);
        }
        script.sent.push(wire);
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<String> {
        let mut script = self.script();
        match script.pending.pop_front() {
            Some(ScriptedLine::Line(line)) => Ok(line),
            Some(ScriptedLine::Fault(message)) => Err(GrowError::Device(message)),
            Some(ScriptedLine::Closed) => {
                script.pending.push_front(ScriptedLine::Closed);
                Err(GrowError::DeviceLost(format!("{} closed", self.name)))
            }
            Some(ScriptedLine::Timeout) | None => Err(GrowError::DeviceTimeout(self.name.clone())),
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        let mut script = self.script();
        let closed = script.pending.contains(&ScriptedLine::Closed);
        script.pending.clear();
        if closed {
            script.pending.push_back(ScriptedLine::Closed);
        }
        script.clears += 1;
        Ok(())
    }
}

/// Candidate that hands out a [`ScriptedChannel`], or fails to open.
#[derive(Debug, Clone)]
pub struct ScriptedCandidate {
    name: String,
    channel: Option<ScriptedChannel>,
}

impl ScriptedCandidate {
    #[must_use]
    pub fn new(channel: ScriptedChannel) -> Self {
        Self {
            name: channel.name.clone(),
            channel: Some(channel),
        }
    }

    #[must_use]
    pub fn unopenable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: None,
        }
    }
}

impl ChannelCandidate for ScriptedCandidate {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn SensorChannel>> {
        self.channel
            .clone()
            .map(|channel| Box::new(channel) as Box<dyn SensorChannel>)
            .ok_or_else(|| GrowError::Device(format!("cannot open {}", self.name)))
    }
}
