use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http;
use crate::random;
use crate::vu::VuContext;

/// A named unit of load: one-time setup, then an iteration every VU repeats.
///
/// `Context` is built once by [`Scenario::setup`] and shared read-only by all VUs.
pub trait Scenario: Send + Sync + 'static {
    type Context: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn setup(
        &self,
        vu: &mut VuContext,
    ) -> impl Future<Output = std::result::Result<Self::Context, ScenarioError>> + Send;

    fn iteration(
        &self,
        vu: &mut VuContext,
        ctx: &Self::Context,
    ) -> impl Future<Output = std::result::Result<(), ScenarioError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Transport(#[from] http::Error),

    #[error(transparent)]
    EmptyDomain(#[from] random::Error),

    #[error("unexpected response from {request}: status {status}")]
    UnexpectedStatus { request: String, status: u16 },

    #[error("{0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub vus: u64,
    pub duration: Duration,
    /// Fixed sleep after each iteration.
    pub pause: Option<Duration>,
    /// Optional cap on iterations across all VUs.
    pub iterations: Option<u64>,
    pub seed: Option<u64>,
    /// Applied to requests that do not set their own timeout.
    pub request_timeout: Option<Duration>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            vus: 1,
            duration: Duration::from_secs(10),
            pause: None,
            iterations: None,
            seed: None,
            request_timeout: None,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vus == 0 {
            return Err(Error::InvalidVus);
        }
        if self.duration.is_zero() {
            return Err(Error::InvalidDuration);
        }
        if self.iterations == Some(0) {
            return Err(Error::InvalidIterations);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_values() {
        let ok = ScenarioConfig::default();
        assert!(ok.validate().is_ok());

        let no_vus = ScenarioConfig {
            vus: 0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(no_vus.validate(), Err(Error::InvalidVus)));

        let no_time = ScenarioConfig {
            duration: Duration::ZERO,
            ..ScenarioConfig::default()
        };
        assert!(matches!(no_time.validate(), Err(Error::InvalidDuration)));

        let no_iters = ScenarioConfig {
            iterations: Some(0),
            ..ScenarioConfig::default()
        };
        assert!(matches!(no_iters.validate(), Err(Error::InvalidIterations)));
    }
}
