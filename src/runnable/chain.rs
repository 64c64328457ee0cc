//! # Chain: nested startup, reverse-order shutdown.
//!
//! `chain([a, b, c])` runs `a` with a callback that runs `b`, whose callback runs `c`,
//! whose callback is the caller's. Each link only returns once everything nested
//! inside it returned, so shutdown unwinds `c → b → a` on its own.
//!
//! ```text
//! a.run ─► ready ─► b.run ─► ready ─► c.run ─► ready ─► callback
//!   ◄──── cleanup ◄──── cleanup ◄──── cleanup ◄──── returns
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::runnable::{Callback, Runnable, RunnableRef};

/// Builds a runnable that nests `runnables` left to right.
///
/// No inputs yield a pass-through that only invokes the callback; a single input is
/// returned unchanged.
pub fn chain<I>(runnables: I) -> RunnableRef
where
    I: IntoIterator<Item = RunnableRef>,
{
    let mut links: Vec<RunnableRef> = runnables.into_iter().collect();
    if links.len() == 1 {
        if let Some(only) = links.pop() {
            return only;
        }
    }

    let name = format!(
        "chain({})",
        links.iter().map(|r| r.name()).collect::<Vec<_>>().join(", ")
    );
    Arc::new(Chain {
        name,
        links: links.into(),
    })
}

struct Chain {
    name: String,
    links: Arc<[RunnableRef]>,
}

#[async_trait]
impl Runnable for Chain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
        run_link(Arc::clone(&self.links), 0, ctx, callback).await
    }
}

fn run_link(
    links: Arc<[RunnableRef]>,
    idx: usize,
    ctx: CancellationToken,
    callback: Callback,
) -> BoxFuture<'static, Result<(), Error>> {
    Box::pin(async move {
        let Some(link) = links.get(idx).cloned() else {
            return callback.call(ctx).await;
        };
        let next = Callback::new(move |ctx| run_link(links, idx + 1, ctx, callback));
        link.run(ctx, next).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Process, State};
    use crate::runnable::probe::{Journal, recorder};

    #[tokio::test]
    async fn starts_left_to_right_and_stops_in_reverse() {
        let journal = Journal::default();
        let composite = chain([
            recorder("a", &journal),
            recorder("b", &journal),
            recorder("c", &journal),
        ]);
        assert_eq!(composite.name(), "chain(a, b, c)");

        let root = CancellationToken::new();
        let p = Process::new(&root, composite);
        p.start(&root).await.unwrap();
        assert_eq!(journal.take(), vec!["start:a", "start:b", "start:c"]);

        p.stop(&root).await.unwrap();
        assert_eq!(journal.take(), vec!["stop:c", "stop:b", "stop:a"]);
    }

    #[tokio::test]
    async fn failing_link_unwinds_the_started_prefix() {
        let journal = Journal::default();
        let composite = chain([
            recorder("a", &journal),
            crate::runnable::probe::broken("b", &journal),
            recorder("c", &journal),
        ]);

        let root = CancellationToken::new();
        let p = Process::new(&root, composite);
        let err = p.start(&root).await.unwrap_err();

        assert!(matches!(err.root(), Error::Fail { error } if error == "b"));
        assert_eq!(p.state(), State::Stopped);
        assert_eq!(journal.take(), vec!["start:a", "start:b", "stop:a"]);
    }

    #[tokio::test]
    async fn empty_chain_passes_through() {
        let composite = chain(Vec::new());
        let root = CancellationToken::new();
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&called);

        composite
            .run(
                root,
                Callback::new(move |_ctx| async move {
                    flag.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await
            .unwrap();
        assert!(called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn single_link_is_returned_unchanged() {
        let journal = Journal::default();
        let only = recorder("only", &journal);
        let composite = chain([Arc::clone(&only)]);
        assert!(Arc::ptr_eq(&only, &composite));
    }
}
