//! # Sequential and parallel execution of fallible task batches.
//!
//! Both executors derive one shared scope from the parent token and hand a clone of it
//! to every task. After each task completes, the [`CancelPolicy`] decides whether the
//! shared scope is cancelled.
//!
//! ```text
//! sequential:  t0 ──► t1 ──► t2 ──► ...     (stops issuing tasks once the policy cancels)
//! parallel:    t0 ┐
//!              t1 ┼──► join_all ──► Errors   (policy cancel interrupts running siblings)
//!              t2 ┘
//! ```
//!
//! ## Rules
//! - Errors land in per-task slots and are combined in task order ([`Errors`]);
//! - Cancellation never undoes results that were already produced;
//! - Only policy-triggered cancellation skips sequential tasks; a cancelled parent is
//!   passed down (tasks observe it through their scope) but does not skip them.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Errors};
use crate::tasks::CancelPolicy;

/// Runs `tasks` one after another under `policy`.
///
/// Returns `Ok` if every executed task succeeded, otherwise the combined errors.
pub async fn sequential<I, F, Fut>(
    parent: &CancellationToken,
    policy: CancelPolicy,
    tasks: I,
) -> Result<(), Error>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let scope = parent.child_token();
    let mut errors = Errors::new();

    for task in tasks {
        if scope.is_cancelled() && !parent.is_cancelled() {
            break;
        }
        let res = task(scope.clone()).await;
        if policy.should_cancel(&res) {
            scope.cancel();
        }
        if let Err(err) = res {
            errors.push(err);
        }
    }

    scope.cancel();
    errors.into_result()
}

/// Runs `tasks` concurrently (within the calling task) under `policy`.
///
/// Waits for all of them, then returns the combined errors.
pub async fn parallel<I, F, Fut>(
    parent: &CancellationToken,
    policy: CancelPolicy,
    tasks: I,
) -> Result<(), Error>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let scope = parent.child_token();

    let runs = tasks.into_iter().map(|task| {
        let scope = scope.clone();
        async move {
            let res = task(scope.clone()).await;
            if policy.should_cancel(&res) {
                scope.cancel();
            }
            res
        }
    });
    let results = futures::future::join_all(runs).await;

    scope.cancel();
    results
        .into_iter()
        .filter_map(Result::err)
        .collect::<Errors>()
        .into_result()
}
