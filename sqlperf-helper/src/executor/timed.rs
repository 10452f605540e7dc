use crate::executor::database::ConnectionTrait;
use crate::executor::outcome::ExecutionOutcome;
use crate::executor::profiling::ProfilingGuard;
use std::time::{Duration, Instant};

/// Execute `sql` once and measure it.
///
/// The timed region starts right before the statement is dispatched and ends
/// once every result set has been drained, so transfer of the rows is part of
/// the measurement. Commit (or rollback on failure) happens after the clock
/// stopped. With `profile` set, `SET STATISTICS TIME/IO` are on around the
/// statement and always switched off again before returning.
///
/// Errors never escape: they become a failed [`ExecutionOutcome`].
pub fn execute_timed<C>(conn: &C, sql: &str, profile: bool) -> ExecutionOutcome
where
    C: ConnectionTrait + ?Sized,
{
    let guard = if profile {
        match ProfilingGuard::enable(conn) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("could not enable statistics: {}", e);
                return ExecutionOutcome::failure(
                    Duration::ZERO,
                    format!("enable statistics failed: {}", e),
                );
            }
        }
    } else {
        None
    };

    let start = Instant::now();
    let drained = conn.drain(sql);
    let elapsed = start.elapsed();

    let outcome = match drained {
        Ok(rows) => match conn.commit() {
            Ok(()) => ExecutionOutcome::success(elapsed, rows),
            Err(e) => ExecutionOutcome::failure(elapsed, format!("commit failed: {}", e)),
        },
        Err(e) => {
            if let Err(rollback) = conn.rollback() {
                warn!("rollback failed: {}", rollback);
            }
            ExecutionOutcome::failure(elapsed, e)
        }
    };
    debug!("{}", outcome);

    if let Some(guard) = guard {
        if let Err(e) = guard.release() {
            warn!("could not disable statistics: {}", e);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::{MockConnection, Reply};

    const VALUES_5: &str = "SELECT v FROM (VALUES (1),(2),(3),(4),(5)) AS t(v)";

    #[test]
    fn test_row_count() {
        let conn = MockConnection::new().reply(VALUES_5, Reply::Rows(5));
        let outcome = execute_timed(&conn, VALUES_5, false);
        assert!(outcome.succeeded());
        assert_eq!(outcome.row_count(), Some(5));
        assert!(outcome.elapsed_ms() >= 0.0);
        assert_eq!(conn.executed(), vec![VALUES_5, "COMMIT"]);
    }

    #[test]
    fn test_statement_without_result_set() {
        let conn = MockConnection::new().reply("EXEC", Reply::NoResult);
        let outcome = execute_timed(&conn, "EXEC dbo.usp_UpdateProjectProgess", false);
        assert!(outcome.succeeded());
        assert_eq!(outcome.row_count(), None);
    }

    #[test]
    fn test_profiling_symmetric_on_success() {
        let conn = MockConnection::new().reply(VALUES_5, Reply::Rows(5));
        let outcome = execute_timed(&conn, VALUES_5, true);
        assert!(outcome.succeeded());
        assert_eq!(
            conn.executed(),
            vec![
                "SET STATISTICS TIME ON",
                "SET STATISTICS IO ON",
                VALUES_5,
                "COMMIT",
                "SET STATISTICS IO OFF",
                "SET STATISTICS TIME OFF",
            ]
        );
    }

    #[test]
    fn test_failure_outcome() {
        let conn = MockConnection::new().reply(
            "SELEC",
            Reply::Fail("Incorrect syntax near 'FROMM'.".into()),
        );
        let outcome = execute_timed(&conn, "SELEC * FROMM nowhere", true);

        assert!(!outcome.succeeded());
        assert!(outcome.elapsed_ms() >= 0.0);
        assert!(outcome.row_count().is_none());
        let message = outcome.error_message().unwrap();
        assert!(message.contains("Incorrect syntax"));

        assert_eq!(conn.count("SET STATISTICS TIME ON"), 1);
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 1);
        assert_eq!(conn.count("SET STATISTICS IO OFF"), 1);
        assert_eq!(conn.count("ROLLBACK"), 1);
        assert_eq!(conn.count("COMMIT"), 0);
    }

    #[test]
    fn test_enable_failure_skips_statement() {
        let conn = MockConnection::new()
            .reply("SET STATISTICS IO ON", Reply::Fail("denied".into()))
            .reply(VALUES_5, Reply::Rows(5));
        let outcome = execute_timed(&conn, VALUES_5, true);

        assert!(!outcome.succeeded());
        assert_eq!(outcome.elapsed_ms(), 0.0);
        assert_eq!(conn.count(VALUES_5), 0);
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 1);
    }

    #[test]
    fn test_no_profiling_statements_when_disabled() {
        let conn = MockConnection::new();
        execute_timed(&conn, "SELECT 1", false);
        assert!(conn.executed().iter().all(|s| !s.starts_with("SET STATISTICS")));
    }

    #[test]
    fn test_delayed_statement_takes_longer() {
        let conn = MockConnection::new()
            .reply("WAITFOR DELAY", Reply::Delayed(Duration::from_millis(100), 1))
            .reply("SELECT 1", Reply::Rows(1));

        let fast = execute_timed(&conn, "SELECT 1", true);
        let slow = execute_timed(&conn, "WAITFOR DELAY '00:00:00.100'; SELECT 1", true);

        assert!(fast.succeeded() && slow.succeeded());
        assert!(slow.elapsed_ms() > fast.elapsed_ms());
        assert!(slow.elapsed_ms() - fast.elapsed_ms() >= 50.0);
    }

    #[test]
    fn test_repeated_calls_do_not_leak_profiling_state() {
        let conn = MockConnection::new().reply("bad", Reply::Fail("boom".into()));
        execute_timed(&conn, "bad statement", true);
        execute_timed(&conn, "SELECT 1", true);
        assert_eq!(conn.count("SET STATISTICS TIME ON"), 2);
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 2);
        assert_eq!(conn.count("SET STATISTICS IO ON"), 2);
        assert_eq!(conn.count("SET STATISTICS IO OFF"), 2);
    }
}
