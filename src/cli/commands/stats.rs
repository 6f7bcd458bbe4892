//! growctl stats - offline view of the warm-started model

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::bandit::{Action, ArmScore};
use crate::bootstrap::WarmStart;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, format_vector, robot_ok};
use crate::error::Result;

#[derive(Args, Debug, Default)]
pub struct StatsArgs {
    /// Score this context (comma-separated feature values)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub context: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
struct ArmReport {
    index: usize,
    action: Action,
    pulls: u64,
    mean_reward: Option<f64>,
    theta: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct ScoreReport {
    context: Vec<f64>,
    chosen: Action,
    scores: Vec<ArmScore>,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    features: Vec<String>,
    alpha: f64,
    forgetting_factor: f64,
    warm_start: WarmStart,
    arms: Vec<ArmReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection: Option<ScoreReport>,
}

pub fn run(ctx: &AppContext, args: &StatsArgs) -> Result<()> {
    let log = ctx.interaction_log()?;
    let (model, warm_start) = ctx.warm_model(&log)?;

    let arms = model
        .summaries()?
        .into_iter()
        .map(|summary| {
            Ok(ArmReport {
                index: summary.action,
                action: Action::from_index(summary.action)?,
                pulls: summary.pulls,
                mean_reward: summary.mean_reward,
                theta: summary.theta,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let selection = match &args.context {
        Some(context) => {
            let selection = model.selection(context)?;
            Some(ScoreReport {
                context: context.clone(),
                chosen: Action::from_index(selection.action)?,
                scores: selection.scores,
            })
        }
        None => None,
    };

    let report = StatsReport {
        features: ctx.config.model.features.clone(),
        alpha: model.config().alpha,
        forgetting_factor: model.config().forgetting_factor,
        warm_start,
        arms,
        selection,
    };

    if ctx.robot_mode {
        return emit_robot(&robot_ok(report));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Model Stats")
        .kv("Features", &report.features.join(", "))
        .kv("Alpha", &format!("{:.3}", report.alpha))
        .kv("Forgetting factor", &format!("{:.3}", report.forgetting_factor))
        .kv("Seed rows", &report.warm_start.seed_rows.to_string())
        .kv("History rows", &report.warm_start.history_rows.to_string())
        .blank()
        .section("Actions");
    for arm in &report.arms {
        let mean = arm
            .mean_reward
            .map_or_else(|| "-".to_string(), |m| format!("{m:.3}"));
        layout.bullet(&format!(
            "{} ({}): pulls {}, mean reward {mean}, theta {}",
            arm.action.display_name(),
            arm.index,
            arm.pulls,
            format_vector(&arm.theta)
        ));
    }

    if let Some(selection) = &report.selection {
        layout
            .blank()
            .section("Scores")
            .kv("Context", &format_vector(&selection.context));
        for score in &selection.scores {
            layout.bullet(&format!(
                "{}: estimate {:.3} + bonus {:.3} = {:.3}",
                Action::from_index(score.action)?.display_name(),
                score.estimate,
                score.bonus,
                score.total
            ));
        }
        layout.kv("Chosen", selection.chosen.display_name());
    }

    emit_human(layout);
    Ok(())
}
