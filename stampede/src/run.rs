use std::sync::Arc;

use anyhow::Context as _;
use stampede_core::thresholds::evaluate_thresholds;
use stampede_core::{RunContext, RunSummary, Scenario, ScenarioConfig, run_scenario};

use crate::cli::RunArgs;
use crate::config::{ConfigFile, load_config, resolve};
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::scenarios::{AppReports, PropertySearch, Reservations, ScenarioKind, SensorReports};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let file = match &args.config {
        Some(path) => load_config(path).map_err(RunError::InvalidInput)?,
        None => ConfigFile::default(),
    };
    let plan = resolve(&args, file).map_err(RunError::InvalidInput)?;

    let out = output::formatter(args.output);
    out.print_header(&args.scenario.to_string(), &plan);

    let mut ctx = RunContext::default();
    if let Some(progress) = out.progress() {
        ctx = ctx.with_progress(progress);
    }
    let metrics = ctx.metrics.clone();

    let interrupt = {
        let handle = ctx.handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, draining in-flight iterations");
                handle.stop();
            }
        })
    };

    let config = plan.scenario.clone();
    let settings = &plan.settings;
    let outcome = match args.scenario {
        ScenarioKind::AppReports => {
            let scenario = AppReports::new(settings).map_err(RunError::InvalidInput)?;
            execute(scenario, config, ctx).await
        }
        ScenarioKind::SensorReports => {
            let scenario = SensorReports::new(settings).map_err(RunError::InvalidInput)?;
            execute(scenario, config, ctx).await
        }
        ScenarioKind::PropertySearch => {
            execute(PropertySearch::new(settings), config, ctx).await
        }
        ScenarioKind::Reservations => {
            let scenario = Reservations::new(settings).map_err(RunError::InvalidInput)?;
            execute(scenario, config, ctx).await
        }
    };
    interrupt.abort();
    let summary = outcome?;

    let violations = evaluate_thresholds(&plan.thresholds, metrics.registry())
        .context("failed to evaluate thresholds")
        .map_err(RunError::InvalidInput)?;

    out.print_summary(&summary, &violations)
        .map_err(RunError::RuntimeError)?;

    // A request that never completed fails its checks as surely as a bad status.
    let checks_failed = summary.checks_failed_total() > 0 || summary.transport_errors_total > 0;
    Ok(ExitCode::from_quality_gates(checks_failed, !violations.is_empty()))
}

async fn execute<S: Scenario>(
    scenario: S,
    config: ScenarioConfig,
    ctx: RunContext,
) -> Result<RunSummary, RunError> {
    run_scenario(Arc::new(scenario), config, ctx)
        .await
        .map_err(RunError::from)
}
