use crate::exit_codes::ExitCode;

/// Why a run ended without producing a summary.
#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    SetupFailed(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::SetupFailed(_) => ExitCode::SetupFailed,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::SetupFailed(e) | Self::RuntimeError(e) => e,
        }
    }
}

impl From<stampede_core::Error> for RunError {
    fn from(err: stampede_core::Error) -> Self {
        use stampede_core::Error;

        match err {
            Error::InvalidVus | Error::InvalidDuration | Error::InvalidIterations => {
                Self::InvalidInput(anyhow::Error::new(err).context("invalid run configuration"))
            }
            Error::Setup { .. } => Self::SetupFailed(anyhow::Error::new(err)),
            Error::Join(_) => {
                Self::RuntimeError(anyhow::Error::new(err).context("virtual user task failed"))
            }
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) | Self::SetupFailed(e) | Self::RuntimeError(e) => {
                write!(f, "{e:#}")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_are_classified() {
        let invalid = RunError::from(stampede_core::Error::InvalidVus);
        assert_eq!(invalid.exit_code(), ExitCode::InvalidInput);

        let setup = RunError::from(stampede_core::Error::Setup {
            scenario: "reservations".to_string(),
            source: stampede_core::ScenarioError::Aborted("no property".to_string()),
        });
        assert_eq!(setup.exit_code(), ExitCode::SetupFailed);
        assert!(setup.to_string().contains("reservations"));
    }
}
