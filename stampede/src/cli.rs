use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::scenarios::ScenarioKind;

/// Accepts bare seconds (`7`, `1.5`), humantime forms (`250ms`, `1m30s`) and a single
/// fractional unit (`1.5s`, `0.5m`). Shared by flags and the YAML config.
pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m30s)".to_string());
    }

    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs)
            .map_err(|_| format!("invalid duration '{s}' (must be a non-negative number)"));
    }

    humantime::parse_duration(s).or_else(|err| {
        parse_fractional(s).ok_or_else(|| format!("invalid duration '{s}': {err}"))
    })
}

fn parse_fractional(s: &str) -> Option<Duration> {
    let unit_start = s.find(|c: char| c.is_ascii_alphabetic())?;
    let (number, unit) = s.split_at(unit_start);
    let value: f64 = number.trim().parse().ok()?;
    let scale = match unit {
        "ms" => 0.001,
        "s" | "sec" | "secs" => 1.0,
        "m" | "min" | "mins" => 60.0,
        "h" | "hr" | "hrs" => 3600.0,
        _ => return None,
    };
    Duration::try_from_secs_f64(value * scale).ok()
}

/// `METRIC=EXPR`, e.g. `http_req_duration=p(95)<2000`.
fn parse_threshold(input: &str) -> Result<(String, String), String> {
    let (metric, expr) = input
        .split_once('=')
        .ok_or_else(|| format!("invalid threshold '{input}' (expected METRIC=EXPR)"))?;
    let metric = metric.trim();
    let expr = expr.trim();
    if metric.is_empty() || expr.is_empty() {
        return Err(format!("invalid threshold '{input}' (expected METRIC=EXPR)"));
    }
    Ok((metric.to_string(), expr.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar on stderr and a summary table on stdout.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stampede",
    author,
    version,
    about = "Scenario-driven HTTP load generator",
    long_about = "stampede drives a property, reservation and sensor-reporting backend with synthetic traffic.\n\nEach built-in scenario runs a one-time setup, then every virtual user repeats the scenario's iteration until the duration elapses or the iteration cap is reached.\n\nLog verbosity is controlled with RUST_LOG (default: warn). Logs go to stderr.",
    after_help = "Examples:\n  stampede list\n  stampede run app-reports --vus 100 --duration 1s\n  stampede run reservations --config load.yaml --auth-token $TOKEN\n  stampede run property-search --output json --threshold 'http_req_duration=p(95)<500'"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a built-in scenario
    #[command(
        long_about = "Run a built-in scenario against the backend.\n\nValues are resolved as: CLI flag, then environment variable, then the YAML config file, then the scenario default."
    )]
    Run(RunArgs),

    /// List built-in scenarios
    List,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario to run (see `stampede list`)
    #[arg(value_enum)]
    pub scenario: ScenarioKind,

    /// YAML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of virtual users
    #[arg(long)]
    pub vus: Option<u64>,

    /// Test duration (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Stop after this many iterations across all virtual users
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Sleep after every iteration (e.g. 10ms, 1s)
    #[arg(long, value_parser = parse_duration)]
    pub pause: Option<Duration>,

    /// Backend base URL
    #[arg(long, env = "STAMPEDE_BASE_URL")]
    pub base_url: Option<String>,

    /// Value of the `auth` header for authenticated endpoints
    #[arg(long, env = "STAMPEDE_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Property id to target (repeatable)
    #[arg(long = "property-id", value_name = "ID")]
    pub property_ids: Vec<String>,

    /// Per-request timeout (e.g. 5s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Pass criterion (repeatable, METRIC=EXPR)
    #[arg(long = "threshold", value_name = "METRIC=EXPR", value_parser = parse_threshold)]
    pub thresholds: Vec<(String, String)>,

    /// Seed for reproducible payloads
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("0ms"), Ok(Duration::ZERO));
    }

    #[test]
    fn parse_duration_accepts_compound_and_fractional_forms() {
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("1.5"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0.5m"), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10 parsecs").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn parse_threshold_splits_on_first_equals() {
        assert_eq!(
            parse_threshold("checks=rate==1"),
            Ok(("checks".to_string(), "rate==1".to_string()))
        );
        assert!(parse_threshold("p(95)<2000").is_err());
        assert!(parse_threshold("=avg<1").is_err());
    }

    #[test]
    fn run_parses_scenario_and_repeatable_flags() {
        let cli = Cli::try_parse_from([
            "stampede",
            "run",
            "reservations",
            "--vus",
            "20",
            "--duration",
            "1m30s",
            "--pause",
            "1.5s",
            "--property-id",
            "a",
            "--property-id",
            "b",
            "--threshold",
            "http_req_duration=p(95)<2000",
            "--output",
            "json",
        ])
        .unwrap_or_else(|e| panic!("parse failed: {e}"));

        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.scenario, ScenarioKind::Reservations);
        assert_eq!(args.vus, Some(20));
        assert_eq!(args.duration, Some(Duration::from_secs(90)));
        assert_eq!(args.pause, Some(Duration::from_millis(1500)));
        assert_eq!(args.property_ids, vec!["a", "b"]);
        assert_eq!(args.thresholds.len(), 1);
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        assert!(Cli::try_parse_from(["stampede", "run", "nope"]).is_err());
    }
}
