use crate::executor::connect::Connector;
use crate::executor::database::ConnectionTrait;
use crate::executor::query::QueryResult;
use sqlperf_common::error::{OdbcStdError, OdbcStdResult, OdbcWrapperError, StatementError};
use std::cell::RefCell;
use std::thread;
use std::time::Duration;

pub fn statement_error(state: &str, msg: &str) -> OdbcStdError {
    OdbcStdError::OdbcError(OdbcWrapperError::StatementError(StatementError {
        state: state.to_string(),
        error_msg: msg.to_string(),
    }))
}

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(usize),
    Delayed(Duration, usize),
    NoResult,
    Table(QueryResult),
    Fail(String),
}

/// Connection answering statements from a script of `(substring, reply)` pairs.
/// Every call is recorded, commits and rollbacks as `COMMIT` / `ROLLBACK`.
#[derive(Debug, Default)]
pub struct MockConnection {
    replies: Vec<(String, Reply)>,
    log: RefCell<Vec<String>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, pattern: &str, reply: Reply) -> Self {
        self.replies.push((pattern.to_string(), reply));
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.log.borrow().iter().filter(|s| s.as_str() == sql).count()
    }

    fn lookup(&self, sql: &str) -> Option<&Reply> {
        self.log.borrow_mut().push(sql.to_string());
        self.replies
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, reply)| reply)
    }
}

impl ConnectionTrait for MockConnection {
    fn execute(&self, sql: &str) -> OdbcStdResult<()> {
        match self.lookup(sql) {
            Some(Reply::Fail(msg)) => Err(statement_error("42000", msg)),
            _ => Ok(()),
        }
    }

    fn drain(&self, sql: &str) -> OdbcStdResult<Option<usize>> {
        match self.lookup(sql) {
            Some(Reply::Rows(rows)) => Ok(Some(*rows)),
            Some(Reply::Delayed(delay, rows)) => {
                thread::sleep(*delay);
                Ok(Some(*rows))
            }
            Some(Reply::NoResult) => Ok(None),
            Some(Reply::Table(table)) => Ok(Some(table.rows.len())),
            Some(Reply::Fail(msg)) => Err(statement_error("42000", msg)),
            None => Ok(Some(0)),
        }
    }

    fn query(&self, sql: &str, params: &[&str]) -> OdbcStdResult<QueryResult> {
        let key = if params.is_empty() {
            sql.to_string()
        } else {
            format!("{} [{}]", sql, params.join(", "))
        };
        match self.lookup(&key) {
            Some(Reply::Table(table)) => Ok(table.clone()),
            Some(Reply::Fail(msg)) => Err(statement_error("42000", msg)),
            _ => Ok(QueryResult::default()),
        }
    }

    fn commit(&self) -> OdbcStdResult<()> {
        self.log.borrow_mut().push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&self) -> OdbcStdResult<()> {
        self.log.borrow_mut().push("ROLLBACK".to_string());
        Ok(())
    }
}

/// Connector that only "has" the listed drivers installed.
#[derive(Debug, Default)]
pub struct MockConnector {
    installed: Vec<String>,
    attempts: RefCell<Vec<String>>,
}

impl MockConnector {
    pub fn with_drivers(installed: &[&str]) -> Self {
        Self {
            installed: installed.iter().map(|d| d.to_string()).collect(),
            attempts: RefCell::default(),
        }
    }

    /// Connection strings in the order they were tried.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.borrow().clone()
    }
}

impl Connector for MockConnector {
    type Connection = String;

    fn open(&self, connection_string: &str, _login_timeout_sec: u32) -> OdbcStdResult<String> {
        self.attempts.borrow_mut().push(connection_string.to_string());
        let installed = self
            .installed
            .iter()
            .any(|d| connection_string.contains(&format!("DRIVER={{{}}}", d)));
        if installed {
            Ok(connection_string.to_string())
        } else {
            Err(statement_error(
                "IM002",
                "Data source name not found and no default driver specified",
            ))
        }
    }
}
