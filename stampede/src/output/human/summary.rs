use std::fmt::Write as _;

use stampede_core::RunSummary;
use stampede_core::thresholds::ThresholdViolation;
use stampede_metrics::HistogramSummary;

use super::format::{format_duration_single, format_ms_opt, format_rate};

pub(crate) fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "scenario: {} (vus {}, elapsed {})",
        summary.scenario,
        summary.vus,
        format_duration_single(summary.elapsed)
    )
    .ok();
    writeln!(
        &mut out,
        "  iterations: {} (failed {})",
        summary.iterations_total, summary.iterations_failed
    )
    .ok();
    writeln!(
        &mut out,
        "  requests: {} rps={}",
        summary.requests_total,
        format_rate(summary.rps())
    )
    .ok();

    // Requests that never got a response. Failed checks are reported below.
    writeln!(
        &mut out,
        "  transport_errors: {}",
        summary.transport_errors_total
    )
    .ok();
    for (kind, count) in &summary.transport_errors_by_kind {
        writeln!(&mut out, "    {kind}: {count}").ok();
    }

    writeln!(
        &mut out,
        "  checks: {} passed, {} failed",
        summary.checks_passed_total(),
        summary.checks_failed_total()
    )
    .ok();
    for c in &summary.checks {
        let mark = if c.fails == 0 { "ok" } else { "FAIL" };
        writeln!(
            &mut out,
            "    [{mark}] {}: pass={} fail={}",
            c.name, c.passes, c.fails
        )
        .ok();
    }

    render_latency(&mut out, "  latency", summary.latency.as_ref());
    for r in &summary.requests {
        writeln!(&mut out, "    {} (n={})", r.name, r.count).ok();
        if let Some(h) = &r.latency {
            writeln!(
                &mut out,
                "      p50={} p95={} max={}",
                format_ms_opt(h.p50),
                format_ms_opt(h.p95),
                format_ms_opt(h.max)
            )
            .ok();
        }
    }
    render_latency(
        &mut out,
        "  iteration_duration",
        summary.iteration_duration.as_ref(),
    );

    out
}

fn render_latency(out: &mut String, label: &str, h: Option<&HistogramSummary>) {
    let Some(h) = h else {
        writeln!(out, "{label}: n/a").ok();
        return;
    };
    writeln!(
        out,
        "{label} = min={} mean={} p50={} p90={} p95={} p99={} max={} stdev={} (n={})",
        format_ms_opt(h.min),
        format_ms_opt(h.mean),
        format_ms_opt(h.p50),
        format_ms_opt(h.p90),
        format_ms_opt(h.p95),
        format_ms_opt(h.p99),
        format_ms_opt(h.max),
        format_ms_opt(h.stdev),
        h.count
    )
    .ok();
}

pub(crate) fn render_violations(violations: &[ThresholdViolation]) -> String {
    let mut out = String::new();
    writeln!(&mut out, "thresholds failed: {}", violations.len()).ok();
    for v in violations {
        let observed = v
            .observed
            .map_or_else(|| "no data".to_string(), |obs| format!("observed {obs}"));
        writeln!(&mut out, "  {}: {} ({observed})", v.metric, v.expression).ok();
    }
    out
}
