//! growctl run - drive the enclosure with the control loop

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::bootstrap::WarmStart;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::control::{ControlLoop, LoopSettings, LoopSummary, stop_pair};
use crate::error::Result;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many cycles (default: run until interrupted)
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Use this serial port instead of searching
    #[arg(long)]
    pub port: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    device: String,
    log: String,
    warm_start: WarmStart,
    summary: LoopSummary,
}

pub fn run(ctx: &AppContext, args: &RunArgs) -> Result<()> {
    let log = ctx.interaction_log()?;
    let log_path = log.path().display().to_string();
    let (model, warm_start) = ctx.warm_model(&log)?;

    let connected = ctx.discovery(args.port.as_deref())?.connect()?;
    let settings = LoopSettings::from_config(&ctx.config)?;
    let control = ControlLoop::new(model, connected.channel, Box::new(log), settings);

    let summary = drive(control, args.cycles)?;
    let report = RunReport {
        device: connected.candidate,
        log: log_path,
        warm_start,
        summary,
    };

    if ctx.robot_mode {
        emit_robot(&robot_ok(report))
    } else {
        let mut layout = HumanLayout::new();
        layout
            .title("Control Loop")
            .kv("Device", &report.device)
            .kv("Log", &report.log)
            .kv("Seed rows", &report.warm_start.seed_rows.to_string())
            .kv("History rows", &report.warm_start.history_rows.to_string())
            .blank()
            .section("Cycles")
            .kv("Committed", &report.summary.committed.to_string())
            .kv("Discarded", &report.summary.discarded.to_string())
            .kv(
                "Cumulative reward",
                &format!("{:.3}", report.summary.cumulative_reward),
            )
            .kv("Interrupted", &report.summary.stopped.to_string());
        emit_human(layout);
        Ok(())
    }
}

/// Run the loop on a blocking thread; Ctrl-C or SIGTERM requests a stop.
fn drive(mut control: ControlLoop, cycles: Option<u64>) -> Result<LoopSummary> {
    let (handle, signal) = stop_pair();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut worker = tokio::task::spawn_blocking(move || control.run(cycles, &signal));
        tokio::select! {
            joined = &mut worker => return flatten(joined),
            () = shutdown_signal() => handle.stop(),
        }
        flatten(worker.await)
    })
}

fn flatten(
    joined: std::result::Result<Result<LoopSummary>, tokio::task::JoinError>,
) -> Result<LoopSummary> {
    joined.map_err(|err| std::io::Error::other(format!("control loop thread: {err}")))?
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received (SIGINT/Ctrl+C)");
                    }
                    _ = sigterm.recv() => {
                        info!("Shutdown signal received (SIGTERM)");
                    }
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received (SIGINT/Ctrl+C)");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received (SIGINT/Ctrl+C)");
    }
}
