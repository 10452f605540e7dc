use crate::executor::outcome::ExecutionOutcome;

/// How much faster a rewritten statement ran than its baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Improvement {
    pub baseline_ms: f64,
    pub candidate_ms: f64,
}

impl Improvement {
    /// Only defined when both runs succeeded.
    pub fn between(baseline: &ExecutionOutcome, candidate: &ExecutionOutcome) -> Option<Self> {
        if !baseline.succeeded() || !candidate.succeeded() {
            return None;
        }
        Some(Self {
            baseline_ms: baseline.elapsed_ms(),
            candidate_ms: candidate.elapsed_ms(),
        })
    }

    pub fn saved_ms(&self) -> f64 {
        self.baseline_ms - self.candidate_ms
    }

    /// `(baseline - candidate) / baseline` in percent; negative for regressions.
    pub fn percent(&self) -> Option<f64> {
        if self.baseline_ms <= 0.0 {
            return None;
        }
        Some(self.saved_ms() / self.baseline_ms * 100.0)
    }

    pub fn speedup(&self) -> Option<f64> {
        if self.candidate_ms <= 0.0 {
            return None;
        }
        Some(self.baseline_ms / self.candidate_ms)
    }
}

/// Extra cost of a variant (e.g. with a cross-database join) over the same
/// statement without it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overhead {
    pub with_ms: f64,
    pub without_ms: f64,
}

impl Overhead {
    pub fn of(with_ms: f64, without_ms: f64) -> Self {
        Self {
            with_ms,
            without_ms,
        }
    }

    pub fn diff_ms(&self) -> f64 {
        self.with_ms - self.without_ms
    }

    /// Share of the `with` time spent on the overhead, 0 when nothing was measured.
    pub fn percent(&self) -> f64 {
        share(self.diff_ms(), self.with_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCheck {
    Consistent(usize),
    Mismatch { baseline: usize, candidate: usize },
    // at least one side has no row count
    Unknown,
}

impl RowCheck {
    pub fn of(baseline: &ExecutionOutcome, candidate: &ExecutionOutcome) -> Self {
        match (baseline.row_count(), candidate.row_count()) {
            (Some(a), Some(b)) if a == b => RowCheck::Consistent(a),
            (Some(a), Some(b)) => RowCheck::Mismatch {
                baseline: a,
                candidate: b,
            },
            _ => RowCheck::Unknown,
        }
    }
}

/// `part / total` in percent, 0 for an empty total.
pub fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(ms: u64, rows: usize) -> ExecutionOutcome {
        ExecutionOutcome::success(Duration::from_millis(ms), Some(rows))
    }

    #[test]
    fn test_improvement() {
        let improvement = Improvement::between(&ok(2000, 10), &ok(500, 10)).unwrap();
        assert_eq!(improvement.saved_ms(), 1500.0);
        assert_eq!(improvement.percent(), Some(75.0));
        assert_eq!(improvement.speedup(), Some(4.0));
    }

    #[test]
    fn test_improvement_edges() {
        let failed = ExecutionOutcome::failure(Duration::from_millis(10), "boom");
        assert!(Improvement::between(&failed, &ok(1, 1)).is_none());
        assert!(Improvement::between(&ok(1, 1), &failed).is_none());

        let zero = Improvement::between(&ok(0, 1), &ok(0, 1)).unwrap();
        assert_eq!(zero.percent(), None);
        assert_eq!(zero.speedup(), None);

        let slower = Improvement::between(&ok(100, 1), &ok(150, 1)).unwrap();
        assert_eq!(slower.percent(), Some(-50.0));
    }

    #[test]
    fn test_overhead() {
        let overhead = Overhead::of(800.0, 600.0);
        assert_eq!(overhead.diff_ms(), 200.0);
        assert_eq!(overhead.percent(), 25.0);
        assert_eq!(Overhead::of(0.0, 0.0).percent(), 0.0);
    }

    #[test]
    fn test_row_check() {
        assert_eq!(RowCheck::of(&ok(1, 7), &ok(2, 7)), RowCheck::Consistent(7));
        assert_eq!(
            RowCheck::of(&ok(1, 7), &ok(2, 6)),
            RowCheck::Mismatch {
                baseline: 7,
                candidate: 6
            }
        );
        let failed = ExecutionOutcome::failure(Duration::ZERO, "boom");
        assert_eq!(RowCheck::of(&ok(1, 7), &failed), RowCheck::Unknown);
    }

    #[test]
    fn test_share() {
        assert_eq!(share(1.0, 4.0), 25.0);
        assert_eq!(share(3.0, 0.0), 0.0);
    }
}
