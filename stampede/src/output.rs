use stampede_core::thresholds::ThresholdViolation;
use stampede_core::{ProgressFn, RunSummary};

use crate::cli::OutputFormat;
use crate::config::RunPlan;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, scenario: &str, plan: &RunPlan);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(
        &self,
        summary: &RunSummary,
        violations: &[ThresholdViolation],
    ) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
