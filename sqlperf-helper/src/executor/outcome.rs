use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Result of one timed statement execution.
///
/// Fields are private so an outcome cannot be altered after the harness built
/// it, and an error message exists exactly when the execution failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    succeeded: bool,
    elapsed_ms: f64,
    row_count: Option<usize>,
    error_message: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(elapsed: Duration, row_count: Option<usize>) -> Self {
        Self {
            succeeded: true,
            elapsed_ms: duration_ms(elapsed),
            row_count,
            error_message: None,
        }
    }

    pub fn failure(elapsed: Duration, error: impl Display) -> Self {
        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = "statement failed without a driver message".to_string();
        }
        Self {
            succeeded: false,
            elapsed_ms: duration_ms(elapsed),
            row_count: None,
            error_message: Some(message),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms / 1000.0
    }

    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl Display for ExecutionOutcome {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match (&self.error_message, self.row_count) {
            (Some(e), _) => write!(f, "failed after {:.2} ms: {}", self.elapsed_ms, e),
            (None, Some(rows)) => write!(f, "ok in {:.2} ms, {} rows", self.elapsed_ms, rows),
            (None, None) => write!(f, "ok in {:.2} ms", self.elapsed_ms),
        }
    }
}

fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        let outcome = ExecutionOutcome::success(Duration::from_millis(1500), Some(5));
        assert!(outcome.succeeded());
        assert_eq!(outcome.elapsed_ms(), 1500.0);
        assert_eq!(outcome.elapsed_secs(), 1.5);
        assert_eq!(outcome.row_count(), Some(5));
        assert!(outcome.error_message().is_none());
        assert_eq!(outcome.to_string(), "ok in 1500.00 ms, 5 rows");
    }

    #[test]
    fn test_failure_never_has_empty_message() {
        let outcome = ExecutionOutcome::failure(Duration::ZERO, "  ");
        assert!(!outcome.succeeded());
        assert_eq!(outcome.elapsed_ms(), 0.0);
        assert!(outcome.row_count().is_none());
        assert!(!outcome.error_message().unwrap().is_empty());
    }
}
