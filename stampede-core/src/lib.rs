#![forbid(unsafe_code)]

pub mod checks;
mod error;
mod gate;
pub mod http;
pub mod metrics;
mod progress;
pub mod random;
mod run;
mod scenario;
mod summary;
pub mod thresholds;
mod vu;

pub use checks::{CheckResult, Validator};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpRequest, HttpResponse, TransportErrorKind};
pub use metrics::RunMetrics;
pub use progress::{ProgressFn, ProgressUpdate};
pub use run::{RunContext, RunHandle, RunPhase, run_scenario};
pub use scenario::{Scenario, ScenarioConfig, ScenarioError};
pub use summary::{CheckSummary, RequestSummary, RunSummary, build_run_summary};
pub use vu::{Signal, VuContext};
