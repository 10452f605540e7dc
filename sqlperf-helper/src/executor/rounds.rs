use crate::executor::database::ConnectionTrait;
use crate::executor::outcome::ExecutionOutcome;
use crate::executor::timed::execute_timed;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RoundOptions {
    pub rounds: usize,
    // sleep between two rounds, not after the last one
    pub pause: Duration,
    pub profile: bool,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            rounds: Self::DEFAULT_ROUNDS,
            pause: Duration::ZERO,
            profile: true,
        }
    }
}

impl RoundOptions {
    pub const DEFAULT_ROUNDS: usize = 3;
}

/// Outcomes of running the same statement several times in a row.
#[derive(Debug, Clone, Default)]
pub struct Rounds {
    outcomes: Vec<ExecutionOutcome>,
}

impl Rounds {
    /// Run `sql` `options.rounds` times through [`execute_timed`]. A failed round
    /// is recorded and the next one still runs. `on_round` sees each outcome
    /// with its 1-based round number as soon as it is known.
    pub fn run<C, F>(conn: &C, sql: &str, options: RoundOptions, mut on_round: F) -> Self
    where
        C: ConnectionTrait + ?Sized,
        F: FnMut(usize, &ExecutionOutcome),
    {
        let mut outcomes = Vec::with_capacity(options.rounds);
        for round in 1..=options.rounds {
            let outcome = execute_timed(conn, sql, options.profile);
            on_round(round, &outcome);
            outcomes.push(outcome);
            if round < options.rounds && !options.pause.is_zero() {
                thread::sleep(options.pause);
            }
        }
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[ExecutionOutcome] {
        &self.outcomes
    }

    pub fn successes(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn average_ms(&self) -> Option<f64> {
        let count = self.success_count();
        if count == 0 {
            return None;
        }
        Some(self.successes().map(|o| o.elapsed_ms()).sum::<f64>() / count as f64)
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.successes().map(|o| o.elapsed_ms()).reduce(f64::min)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.successes().map(|o| o.elapsed_ms()).reduce(f64::max)
    }

    /// Row count of the last successful round.
    pub fn row_count(&self) -> Option<usize> {
        self.successes().last().and_then(|o| o.row_count())
    }
}

impl From<Vec<ExecutionOutcome>> for Rounds {
    fn from(outcomes: Vec<ExecutionOutcome>) -> Self {
        Self { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::{MockConnection, Reply};

    #[test]
    fn test_rounds_run_in_sequence() {
        let conn = MockConnection::new().reply("EXEC", Reply::Rows(2));
        let mut seen = vec![];
        let rounds = Rounds::run(
            &conn,
            "EXEC dbo.usp_CheckProjectRiskWarn_Contract",
            RoundOptions::default(),
            |round, outcome| seen.push((round, outcome.succeeded())),
        );
        assert_eq!(seen, vec![(1, true), (2, true), (3, true)]);
        assert_eq!(rounds.outcomes().len(), 3);
        assert_eq!(rounds.row_count(), Some(2));
        assert_eq!(conn.count("SET STATISTICS TIME ON"), 3);
        assert_eq!(conn.count("SET STATISTICS TIME OFF"), 3);
    }

    #[test]
    fn test_failures_do_not_stop_rounds() {
        let conn = MockConnection::new().reply("EXEC", Reply::Fail("deadlock".into()));
        let options = RoundOptions {
            rounds: 2,
            profile: false,
            ..RoundOptions::default()
        };
        let rounds = Rounds::run(&conn, "EXEC dbo.usp_x", options, |_, _| {});
        assert_eq!(rounds.outcomes().len(), 2);
        assert_eq!(rounds.success_count(), 0);
        assert!(rounds.average_ms().is_none());
        assert!(rounds.min_ms().is_none());
    }

    #[test]
    fn test_statistics_only_count_successes() {
        let rounds = Rounds::from(vec![
            ExecutionOutcome::success(Duration::from_millis(100), Some(1)),
            ExecutionOutcome::failure(Duration::from_millis(5000), "timeout"),
            ExecutionOutcome::success(Duration::from_millis(300), Some(1)),
        ]);
        assert_eq!(rounds.success_count(), 2);
        assert_eq!(rounds.average_ms(), Some(200.0));
        assert_eq!(rounds.min_ms(), Some(100.0));
        assert_eq!(rounds.max_ms(), Some(300.0));
    }
}
