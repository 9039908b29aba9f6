//! Per-path iteration over independent creation requests.

use crate::error::{MknodError, Result};
use tracing::debug;

/// How a batch reacts to a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Record the failure and carry on with the next item.
    ContinueOnError,
    /// Abort the batch with the first error.
    StopOnError,
}

/// Counts of a finished batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items whose operation succeeded.
    pub succeeded: usize,
    /// Items whose failure was reported and skipped.
    pub failed: usize,
}

impl BatchSummary {
    /// True when no item failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Process exit status: 1 as soon as any item failed.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Runs `op` on every item in order.
///
/// Under [`FailureMode::ContinueOnError`] each failure is handed to
/// `on_error` and counted; the batch itself never fails. Under
/// [`FailureMode::StopOnError`] the first failure is returned.
pub fn run<I, T, R>(
    items: I,
    mode: FailureMode,
    mut op: impl FnMut(&T) -> Result<R>,
    mut on_error: impl FnMut(&T, &MknodError),
) -> Result<BatchSummary>
where
    I: IntoIterator<Item = T>,
{
    let mut summary = BatchSummary::default();
    for item in items {
        match op(&item) {
            Ok(_) => summary.succeeded += 1,
            Err(e) => match mode {
                FailureMode::StopOnError => return Err(e),
                FailureMode::ContinueOnError => {
                    on_error(&item, &e);
                    summary.failed += 1;
                }
            },
        }
    }
    debug!(
        "batch done: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(n: &u32) -> Result<()> {
        if n % 2 == 0 {
            Err(MknodError::Usage(format!("even {}", n)))
        } else {
            Ok(())
        }
    }

    #[test]
    fn test_continue_visits_every_item() {
        let mut seen = Vec::new();
        let summary = run(
            vec![1u32, 2, 3, 4, 5],
            FailureMode::ContinueOnError,
            |n| {
                seen.push(*n);
                op(n)
            },
            |_, _| {},
        )
        .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_continue_reports_each_failure() {
        let mut failures = Vec::new();
        run(
            vec![2u32, 3, 4],
            FailureMode::ContinueOnError,
            op,
            |n, e| failures.push((*n, e.to_string())),
        )
        .unwrap();
        assert_eq!(
            failures,
            vec![(2, "even 2".to_string()), (4, "even 4".to_string())]
        );
    }

    #[test]
    fn test_stop_returns_first_error() {
        let mut seen = Vec::new();
        let err = run(
            vec![1u32, 2, 3],
            FailureMode::StopOnError,
            |n| {
                seen.push(*n);
                op(n)
            },
            |_, _| panic!("on_error is not used when stopping"),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "even 2");
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_all_success() {
        let summary = run(vec![1u32, 3], FailureMode::StopOnError, op, |_, _| {}).unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.exit_code(), 0);
    }
}
