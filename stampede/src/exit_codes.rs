#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more checks failed, or requests could not be completed.
    ChecksFailed = 10,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Checks and thresholds failed.
    ChecksAndThresholdsFailed = 12,

    /// Scenario setup failed, so no load was generated.
    SetupFailed = 20,

    /// Invalid CLI/config values (bad flags, durations, threshold syntax, missing credentials).
    InvalidInput = 30,

    /// Internal/runtime error (worker panics, signal handler failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_quality_gates(checks_failed: bool, thresholds_failed: bool) -> Self {
        match (checks_failed, thresholds_failed) {
            (false, false) => Self::Success,
            (true, false) => Self::ChecksFailed,
            (false, true) => Self::ThresholdsFailed,
            (true, true) => Self::ChecksAndThresholdsFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_gates_map_to_distinct_codes() {
        assert_eq!(ExitCode::from_quality_gates(false, false).as_i32(), 0);
        assert_eq!(ExitCode::from_quality_gates(true, false).as_i32(), 10);
        assert_eq!(ExitCode::from_quality_gates(false, true).as_i32(), 11);
        assert_eq!(ExitCode::from_quality_gates(true, true).as_i32(), 12);
    }
}
