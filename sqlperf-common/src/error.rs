use std::fmt::{self, Display, Formatter};

use odbc_api::handles::slice_to_cow_utf8;
use thiserror::Error;

use crate::state::{get_obj_by_state, AttemptFailure, OdbcState};

pub type OdbcStdResult<T, E = OdbcStdError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum OdbcStdError {
    #[error("odbc error:`{0}`")]
    OdbcError(OdbcWrapperError),
    #[error("no odbc driver could open a connection: {0}")]
    ConnectionUnavailable(DriverAttempts),
    #[error("io error:`{0}`")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    StringError(String),
}

impl OdbcStdError {
    /// SQLSTATE reported by the driver, when the error carries a known one.
    pub fn sql_state(&self) -> Option<OdbcState> {
        match self {
            OdbcStdError::OdbcError(OdbcWrapperError::StatementError(e)) => {
                get_obj_by_state(&e.state)
            }
            _ => None,
        }
    }
}

impl From<odbc_api::Error> for OdbcStdError {
    fn from(e: odbc_api::Error) -> Self {
        OdbcStdError::OdbcError(e.into())
    }
}

#[derive(Debug, Error)]
pub enum OdbcWrapperError {
    #[error("data handler error:`{0}`")]
    DataHandlerError(String),
    #[error("statement error:`{0}`")]
    StatementError(StatementError),
}

#[derive(Debug, Error)]
pub struct StatementError {
    pub state: String,
    pub error_msg: String,
}

impl Display for StatementError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "state: {:?}, error_msg: {:?}",
            self.state, self.error_msg
        )
    }
}

impl From<odbc_api::Error> for OdbcWrapperError {
    fn from(error: odbc_api::Error) -> Self {
        if let odbc_api::Error::Diagnostics { record, .. } = &error {
            let msg_info = slice_to_cow_utf8(&record.message);
            let state = match std::str::from_utf8(&record.state.0) {
                Ok(state_data) => state_data,
                Err(e) => {
                    return OdbcWrapperError::DataHandlerError(e.to_string());
                }
            };
            return OdbcWrapperError::StatementError(StatementError {
                state: state.to_string(),
                error_msg: msg_info.to_string(),
            });
        }
        OdbcWrapperError::DataHandlerError(error.to_string())
    }
}

/// One driver that was tried while establishing a connection, and why it failed.
#[derive(Debug)]
pub struct DriverAttempt {
    pub driver: String,
    pub error: OdbcStdError,
}

impl DriverAttempt {
    pub fn failure(&self) -> AttemptFailure {
        self.error
            .sql_state()
            .map(|state| state.attempt_failure())
            .unwrap_or(AttemptFailure::Other)
    }
}

impl Display for DriverAttempt {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.driver, self.failure(), self.error)
    }
}

/// Every failed attempt, in the order the drivers were tried.
#[derive(Debug, Default)]
pub struct DriverAttempts(Vec<DriverAttempt>);

impl DriverAttempts {
    pub fn push(&mut self, driver: impl Into<String>, error: OdbcStdError) {
        self.0.push(DriverAttempt {
            driver: driver.into(),
            error,
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DriverAttempt> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn drivers(&self) -> Vec<&str> {
        self.0.iter().map(|a| a.driver.as_str()).collect()
    }
}

impl Display for DriverAttempts {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no driver candidates configured");
        }
        write!(f, "tried {} driver(s)", self.0.len())?;
        for attempt in &self.0 {
            write!(f, "; {}", attempt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement_error(state: &str, msg: &str) -> OdbcStdError {
        OdbcStdError::OdbcError(OdbcWrapperError::StatementError(StatementError {
            state: state.to_string(),
            error_msg: msg.to_string(),
        }))
    }

    #[test]
    fn test_sql_state() {
        let e = statement_error("IM002", "Data source name not found");
        assert_eq!(e.sql_state(), Some(OdbcState::DRIVER_NOT_FOUND));
        assert_eq!(OdbcStdError::StringError("x".into()).sql_state(), None);
    }

    #[test]
    fn test_driver_attempts_display() {
        let mut attempts = DriverAttempts::default();
        attempts.push(
            "ODBC Driver 18 for SQL Server",
            statement_error("IM002", "Data source name not found"),
        );
        attempts.push(
            "ODBC Driver 17 for SQL Server",
            statement_error("28000", "Login failed for user 'sa'"),
        );
        let text = OdbcStdError::ConnectionUnavailable(attempts).to_string();
        assert!(text.contains("tried 2 driver(s)"));
        assert!(text.contains("[ODBC Driver 18 for SQL Server] driver not installed"));
        assert!(text.contains("[ODBC Driver 17 for SQL Server] connection rejected"));
        assert!(text.contains("Login failed"));
    }

    #[test]
    fn test_empty_driver_attempts() {
        let attempts = DriverAttempts::default();
        assert!(attempts.is_empty());
        assert_eq!(attempts.to_string(), "no driver candidates configured");
    }
}
