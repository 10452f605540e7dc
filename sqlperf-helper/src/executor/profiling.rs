use crate::executor::database::ConnectionTrait;
use sqlperf_common::error::OdbcStdResult;
use std::fmt;

/// Server side statistics a session can report for the statements it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Time,
    Io,
}

impl Counter {
    pub const ALL: [Counter; 2] = [Counter::Time, Counter::Io];

    pub fn enable_sql(&self) -> &'static str {
        match self {
            Counter::Time => "SET STATISTICS TIME ON",
            Counter::Io => "SET STATISTICS IO ON",
        }
    }

    pub fn disable_sql(&self) -> &'static str {
        match self {
            Counter::Time => "SET STATISTICS TIME OFF",
            Counter::Io => "SET STATISTICS IO OFF",
        }
    }
}

/// Keeps `SET STATISTICS TIME/IO` switched on for as long as it lives.
///
/// Every counter that was switched on is switched off exactly once, either by
/// [`ProfilingGuard::release`] or when the guard is dropped (early return,
/// error, unwinding).
pub struct ProfilingGuard<'c, C: ConnectionTrait + ?Sized> {
    conn: &'c C,
    enabled: Vec<Counter>,
}

impl<'c, C: ConnectionTrait + ?Sized> ProfilingGuard<'c, C> {
    /// Switch every counter on. If one fails, those already on are switched off
    /// again before the error is returned.
    pub fn enable(conn: &'c C) -> OdbcStdResult<Self> {
        let mut guard = Self {
            conn,
            enabled: Vec::with_capacity(Counter::ALL.len()),
        };
        for counter in Counter::ALL {
            conn.execute(counter.enable_sql())?;
            guard.enabled.push(counter);
        }
        Ok(guard)
    }

    pub fn enabled(&self) -> &[Counter] {
        &self.enabled
    }

    /// Switch the counters off now, reporting the first error.
    pub fn release(mut self) -> OdbcStdResult<()> {
        self.disable_all()
    }

    fn disable_all(&mut self) -> OdbcStdResult<()> {
        let mut first_error = None;
        while let Some(counter) = self.enabled.pop() {
            if let Err(e) = self.conn.execute(counter.disable_sql()) {
                warn!("`{}` failed: {}", counter.disable_sql(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<C: ConnectionTrait + ?Sized> Drop for ProfilingGuard<'_, C> {
    fn drop(&mut self) {
        if !self.enabled.is_empty() {
            let _ = self.disable_all();
        }
    }
}

impl<C: ConnectionTrait + ?Sized> fmt::Debug for ProfilingGuard<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingGuard")
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::{MockConnection, Reply};

    #[test]
    fn test_release_disables_once() {
        let conn = MockConnection::new();
        let guard = ProfilingGuard::enable(&conn).unwrap();
        assert_eq!(guard.enabled(), &[Counter::Time, Counter::Io]);
        guard.release().unwrap();

        assert_eq!(
            conn.executed(),
            vec![
                "SET STATISTICS TIME ON",
                "SET STATISTICS IO ON",
                "SET STATISTICS IO OFF",
                "SET STATISTICS TIME OFF",
            ]
        );
    }

    #[test]
    fn test_drop_disables() {
        let conn = MockConnection::new();
        {
            let _guard = ProfilingGuard::enable(&conn).unwrap();
        }
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 1);
        assert_eq!(conn.count("SET STATISTICS IO OFF"), 1);
    }

    #[test]
    fn test_partial_enable_is_undone() {
        let conn = MockConnection::new().reply(
            "SET STATISTICS IO ON",
            Reply::Fail("permission denied".into()),
        );
        assert!(ProfilingGuard::enable(&conn).is_err());
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 1);
        assert_eq!(conn.count("SET STATISTICS IO OFF"), 0);
    }

    #[test]
    fn test_disable_failure_reported_once() {
        let conn = MockConnection::new().reply(
            "SET STATISTICS IO OFF",
            Reply::Fail("connection lost".into()),
        );
        let guard = ProfilingGuard::enable(&conn).unwrap();
        assert!(guard.release().is_err());
        // TIME is still switched off after IO failed, and the drop does not retry
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 1);
        assert_eq!(conn.count("SET STATISTICS IO OFF"), 1);
    }
}
