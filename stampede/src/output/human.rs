use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_duration_single, format_rate};
use progress::HumanProgress;
use stampede_core::thresholds::ThresholdViolation;
use stampede_core::{ProgressFn, RunSummary};
use summary::{render, render_violations};

use super::OutputFormatter;
use crate::config::RunPlan;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, scenario: &str, plan: &RunPlan) {
        let cfg = &plan.scenario;
        println!("target: {}", plan.settings.base_url);
        println!(
            "scenario: {scenario} vus={} duration={} pause={} iterations={}",
            cfg.vus,
            format_duration_single(cfg.duration),
            cfg.pause.map_or_else(|| "-".to_string(), format_duration_single),
            cfg.iterations.map_or_else(|| "-".to_string(), |n| n.to_string()),
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u| {
            let message = format!(
                "vus={} elapsed={} rps={} iterations={} transport_errors={} checks_failed={}",
                u.vus,
                format_duration_single(u.elapsed),
                format_rate(u.rps_now),
                u.iterations_total,
                u.transport_errors_total,
                u.checks_failed_total,
            );
            progress.update(&u.scenario, u.duration, u.elapsed, message);
        }))
    }

    fn print_summary(
        &self,
        summary: &RunSummary,
        violations: &[ThresholdViolation],
    ) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary));

        if !violations.is_empty() {
            eprint!("{}", render_violations(violations));
        }

        Ok(())
    }
}
