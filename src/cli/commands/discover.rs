//! growctl discover - probe candidate ports

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::device::{ProbeOutcome, ProbeReport};
use crate::error::Result;

#[derive(Args, Debug, Default)]
pub struct DiscoverArgs {
    /// Probe only this serial port
    #[arg(long)]
    pub port: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiscoverReport {
    probe: String,
    ack: String,
    candidates: Vec<ProbeReport>,
    device: Option<String>,
}

pub fn run(ctx: &AppContext, args: &DiscoverArgs) -> Result<()> {
    let discovery = ctx.discovery(args.port.as_deref())?;
    let candidates = discovery.probe_all();
    let device = candidates
        .iter()
        .find(|report| report.outcome.is_acknowledged())
        .map(|report| report.candidate.clone());

    let report = DiscoverReport {
        probe: ctx.config.device.probe.clone(),
        ack: ctx.config.device.ack.clone(),
        candidates,
        device,
    };

    if ctx.robot_mode {
        return emit_robot(&robot_ok(report));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Device Discovery")
        .kv("Probe", &report.probe)
        .kv("Expected ack", &report.ack)
        .blank()
        .section("Candidates");
    if report.candidates.is_empty() {
        layout.bullet("no serial ports found");
    }
    for candidate in &report.candidates {
        let detail = match &candidate.outcome {
            ProbeOutcome::Acknowledged(reply) => format!("acknowledged ({reply})"),
            ProbeOutcome::WrongReply(reply) => format!("unexpected reply ({reply})"),
            ProbeOutcome::Silent => "no reply".to_string(),
            ProbeOutcome::OpenFailed(err) => format!("open failed ({err})"),
        };
        layout.bullet(&format!("{}: {detail}", candidate.candidate));
    }
    layout.blank().kv(
        "Device",
        report.device.as_deref().unwrap_or("not found"),
    );
    emit_human(layout);
    Ok(())
}
