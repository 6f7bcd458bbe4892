//! growctl selftest - actuator and readout smoke test

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::bandit::Action;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::device::{Command, SensorChannel};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct SelftestArgs {
    /// Use this serial port instead of searching
    #[arg(long)]
    pub port: Option<String>,

    /// Pause between commands, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub pause_ms: u64,

    /// How long to wait for the readout, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SelftestStep {
    pub command: String,
    pub reply: Option<String>,
}

pub fn run(ctx: &AppContext, args: &SelftestArgs) -> Result<()> {
    let mut connected = ctx.discovery(args.port.as_deref())?.connect()?;
    let steps = exercise(
        connected.channel.as_mut(),
        &ctx.config.device.post_request,
        Duration::from_millis(args.pause_ms),
        Duration::from_millis(args.timeout_ms),
    )?;

    if ctx.robot_mode {
        return emit_robot(&robot_ok(serde_json::json!({
            "device": connected.candidate,
            "steps": steps,
        })));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Self Test")
        .kv("Device", &connected.candidate)
        .blank()
        .section("Steps");
    for step in &steps {
        match &step.reply {
            Some(reply) => layout.bullet(&format!("{} -> {reply}", step.command)),
            None => layout.bullet(&step.command),
        };
    }
    emit_human(layout);
    Ok(())
}

/// Request a readout, then switch the light on and off again.
pub fn exercise(
    channel: &mut dyn SensorChannel,
    readout: &str,
    pause: Duration,
    timeout: Duration,
) -> Result<Vec<SelftestStep>> {
    let mut steps = Vec::with_capacity(3);

    channel.clear_input()?;
    let request = Command::Readout(readout.to_string());
    channel.send(&request)?;
    let reply = channel.read_line(timeout)?;
    info!(command = %request, %reply, "Readout received");
    steps.push(SelftestStep {
        command: request.to_string(),
        reply: Some(reply),
    });

    for action in [Action::LightOn, Action::LightOff] {
        std::thread::sleep(pause);
        let command = Command::Act(action);
        channel.send(&command)?;
        info!(%command, "Command sent");
        steps.push(SelftestStep {
            command: command.to_string(),
            reply: None,
        });
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrowError;
    use crate::test_utils::ScriptedChannel;

    #[test]
    fn exercise_sends_readout_then_light_commands() {
        let channel = ScriptedChannel::new("scripted");
        channel.respond_to("REQUEST_GREEN", &["312,140"]);
        let mut link = channel.clone();

        let steps = exercise(&mut link, "REQUEST_GREEN", Duration::ZERO, Duration::ZERO).unwrap();
        assert_eq!(
            channel.sent(),
            vec!["REQUEST_GREEN", "TURN_LIGHT_ON", "TURN_LIGHT_OFF"]
        );
        assert_eq!(steps[0].reply.as_deref(), Some("312,140"));
        assert!(steps[2].reply.is_none());
    }

    #[test]
    fn silent_readout_fails_with_timeout() {
        let channel = ScriptedChannel::new("scripted");
        let mut link = channel.clone();
        let err = exercise(&mut link, "REQUEST_GREEN", Duration::ZERO, Duration::ZERO).unwrap_err();
        assert!(matches!(err, GrowError::DeviceTimeout(_)));
        assert_eq!(channel.sent(), vec!["REQUEST_GREEN"]);
    }
}
