//! Link to the enclosure's microcontroller.
//!
//! The control loop only sees the [`SensorChannel`] trait: a line-oriented
//! request/response link. Finding the right link among several candidates is
//! handled by [`ChannelDiscovery`], which tries each [`ChannelCandidate`] in
//! turn with a probe-and-acknowledge handshake.

mod discovery;
mod protocol;
mod serial;

use std::time::Duration;

pub use discovery::{ChannelDiscovery, Connected, HandshakeConfig, ProbeOutcome, ProbeReport};
pub use protocol::{Command, parse_reading};
pub use serial::{SerialCandidate, SerialChannel};

use crate::error::Result;

/// An open, line-oriented device link.
pub trait SensorChannel: Send {
    /// Human-readable identity (port path) for logs.
    fn describe(&self) -> String;

    /// Write one command line.
    fn send(&mut self, command: &Command) -> Result<()>;

    /// Read the next line, without its terminator.
    ///
    /// Fails with [`crate::GrowError::DeviceTimeout`] when nothing arrives
    /// within `timeout`.
    fn read_line(&mut self, timeout: Duration) -> Result<String>;

    /// Drop any input received but not yet read.
    fn clear_input(&mut self) -> Result<()>;
}

/// Something that may turn out to be the enclosure once opened and probed.
pub trait ChannelCandidate: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn SensorChannel>>;
}
