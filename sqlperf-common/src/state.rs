crate::sqlstate_mapping! {
    OdbcState,
    ( STMT_OK, "00000" ); /* OK */
    ( STMT_WARN, "01000" ); /* general warning */
    ( STMT_TRUNCATED, "01004" ); /* String data, right truncated */
    ( CONN_UNABLE_TO_ESTABLISH, "08001" ); /* client unable to establish connection */
    ( CONN_REJECTED, "08004" ); /* server rejected the connection */
    ( CONN_LINK_FAILURE, "08S01" ); /* communication link failure */
    ( INVALID_AUTHORIZATION, "28000" ); /* login failed */
    ( SERIALIZATION_FAILURE, "40001" ); /* deadlock victim */
    ( SYNTAX_ERROR_OR_ACCESS_VIOLATION, "42000" );
    ( TABLE_NOT_FOUND, "42S02" ); /* invalid object name */
    ( COLUMN_NOT_FOUND, "42S22" ); /* invalid column name */
    ( INTERNAL_ERROR, "HY000" ); /* general error */
    ( LOGIN_TIMEOUT, "HYT00" ); /* timeout expired */
    ( CONNECTION_TIMEOUT, "HYT01" );
    ( DRIVER_NOT_FOUND, "IM002" ); /* data source name not found and no default driver */
    ( DRIVER_LOAD_FAILED, "IM003" ); /* specified driver could not be loaded */
    ( DRIVER_ALLOC_FAILED, "IM004" ); /* driver's SQLAllocHandle on SQL_HANDLE_ENV failed */
}

/// Coarse reason a connection attempt with one driver did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    DriverMissing,
    Timeout,
    Rejected,
    Other,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AttemptFailure::DriverMissing => "driver not installed",
            AttemptFailure::Timeout => "login timeout",
            AttemptFailure::Rejected => "connection rejected",
            AttemptFailure::Other => "failed",
        };
        f.write_str(text)
    }
}

impl OdbcState {
    pub fn is_driver_unavailable(&self) -> bool {
        matches!(
            self,
            OdbcState::DRIVER_NOT_FOUND | OdbcState::DRIVER_LOAD_FAILED | OdbcState::DRIVER_ALLOC_FAILED
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OdbcState::LOGIN_TIMEOUT | OdbcState::CONNECTION_TIMEOUT)
    }

    pub fn is_connection_rejected(&self) -> bool {
        matches!(
            self,
            OdbcState::CONN_UNABLE_TO_ESTABLISH
                | OdbcState::CONN_REJECTED
                | OdbcState::CONN_LINK_FAILURE
                | OdbcState::INVALID_AUTHORIZATION
        )
    }

    pub fn attempt_failure(&self) -> AttemptFailure {
        if self.is_driver_unavailable() {
            AttemptFailure::DriverMissing
        } else if self.is_timeout() {
            AttemptFailure::Timeout
        } else if self.is_connection_rejected() {
            AttemptFailure::Rejected
        } else {
            AttemptFailure::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
    struct TestStruct {
        odbc_state: OdbcState,
        odbc_msg: String,
    }

    #[test]
    fn test_odbc_state() {
        let test_struct = TestStruct {
            odbc_state: OdbcState::DRIVER_NOT_FOUND,
            odbc_msg: "test".to_string(),
        };
        let test_struct_string = serde_json::to_value(test_struct).unwrap().to_string();
        assert!(test_struct_string.contains("IM002"));
        let test_struct: TestStruct = serde_json::from_str(&test_struct_string).unwrap();
        assert_eq!(test_struct.odbc_state, OdbcState::DRIVER_NOT_FOUND);
        assert_eq!(test_struct.odbc_state.to_string(), "IM002");

        assert_eq!(get_obj_by_state("28000").unwrap(), OdbcState::INVALID_AUTHORIZATION);
        assert!(get_obj_by_state("ZZZZZ").is_none());
    }

    #[test]
    fn test_attempt_failure() {
        assert_eq!(
            OdbcState::DRIVER_LOAD_FAILED.attempt_failure(),
            AttemptFailure::DriverMissing
        );
        assert_eq!(OdbcState::LOGIN_TIMEOUT.attempt_failure(), AttemptFailure::Timeout);
        assert_eq!(
            OdbcState::INVALID_AUTHORIZATION.attempt_failure(),
            AttemptFailure::Rejected
        );
        assert_eq!(
            OdbcState::SYNTAX_ERROR_OR_ACCESS_VIOLATION.attempt_failure(),
            AttemptFailure::Other
        );
    }
}
