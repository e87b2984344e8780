use crate::scenario::ScenarioError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("setup for scenario `{scenario}` failed: {source}")]
    Setup {
        scenario: String,
        #[source]
        source: ScenarioError,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
