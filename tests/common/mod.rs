#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use procvisor::{
    Callback, Cursor, Error, Event, EventKind, MemoryTable, Runnable, RunnableFn, RunnableRef,
    Supervisor, Table,
};

pub type Sup = Supervisor<&'static str, RunnableRef>;

/// Serves until released; `live` counts executions currently inside `run`.
pub fn service(name: &'static str, live: &Arc<AtomicUsize>) -> RunnableRef {
    let live = Arc::clone(live);
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| {
        let live = Arc::clone(&live);
        async move {
            live.fetch_add(1, Ordering::SeqCst);
            let res = callback.call(ctx).await;
            live.fetch_sub(1, Ordering::SeqCst);
            res
        }
    })
}

/// Serves until `crash` is notified, then fails; `runs` counts executions.
pub fn crashable(name: &'static str, crash: &Arc<Notify>, runs: &Arc<AtomicUsize>) -> RunnableRef {
    let crash = Arc::clone(crash);
    let runs = Arc::clone(runs);
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| {
        runs.fetch_add(1, Ordering::SeqCst);
        let crash = Arc::clone(&crash);
        async move {
            tokio::select! {
                res = callback.call(ctx) => res,
                _ = crash.notified() => Err(Error::fail("crashed")),
            }
        }
    })
}

/// Fails during startup.
pub fn broken(name: &'static str) -> RunnableRef {
    RunnableFn::arc(name, move |_ctx: CancellationToken, _callback: Callback| async move {
        Err::<(), _>(Error::fail(format!("{name} cannot start")))
    })
}

/// Waits for `gate` before becoming ready.
pub fn gated(name: &'static str, gate: &CancellationToken) -> RunnableRef {
    let gate = gate.clone();
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| {
        let gate = gate.clone();
        async move {
            tokio::select! {
                _ = gate.cancelled() => {}
                _ = ctx.cancelled() => return Ok(()),
            }
            callback.call(ctx).await
        }
    })
}

/// Fails during startup once `gate` opens.
pub fn fails_when(name: &'static str, gate: &CancellationToken) -> RunnableRef {
    let gate = gate.clone();
    RunnableFn::arc(name, move |ctx: CancellationToken, _callback: Callback| {
        let gate = gate.clone();
        async move {
            tokio::select! {
                _ = gate.cancelled() => Err(Error::fail(format!("{name} gave up"))),
                _ = ctx.cancelled() => Ok(()),
            }
        }
    })
}

/// Serves normally, then fails during cleanup.
pub fn dirty(name: &'static str) -> RunnableRef {
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| async move {
        callback.call(ctx).await?;
        Err::<(), _>(Error::fail(format!("{name} cleanup failed")))
    })
}

/// Receives events until one of `kind` arrives.
pub async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    loop {
        match rx.recv().await {
            Ok(ev) if ev.kind == kind => return ev,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => panic!("bus closed while waiting for {kind}"),
        }
    }
}

/// A supervisor running in the background until [`Harness::shutdown`].
pub struct Harness {
    pub events: broadcast::Receiver<Event>,
    release: CancellationToken,
    handle: JoinHandle<Result<(), Error>>,
}

impl Harness {
    /// Spawns `sup.run` and waits for the restoration pass to finish.
    pub async fn launch(sup: &Sup) -> Self {
        let mut events = sup.subscribe();
        let release = CancellationToken::new();
        let hold = release.clone();
        let runner = sup.clone();
        let handle = tokio::spawn(async move {
            runner
                .run(
                    CancellationToken::new(),
                    Callback::new(move |_ctx| async move {
                        hold.cancelled().await;
                        Ok(())
                    }),
                )
                .await
        });
        wait_for(&mut events, EventKind::RestoreFinished).await;
        Self {
            events,
            release,
            handle,
        }
    }

    pub async fn shutdown(self) -> Result<(), Error> {
        self.release.cancel();
        self.handle.await.expect("supervisor task panicked")
    }
}

/// Memory table whose iteration can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyTable {
    pub rows: MemoryTable<&'static str, RunnableRef>,
    pub fail_iter: Arc<AtomicBool>,
}

#[async_trait]
impl Table<&'static str, RunnableRef> for FlakyTable {
    async fn get(&self, key: &&'static str) -> Result<RunnableRef, Error> {
        self.rows.get(key).await
    }

    async fn iter(&self) -> Result<Box<dyn Cursor<&'static str, RunnableRef>>, Error> {
        if self.fail_iter.load(Ordering::SeqCst) {
            return Err(Error::table("storage unavailable"));
        }
        self.rows.iter().await
    }
}

/// Asserts `Runnable` is usable through the trait object.
pub fn name_of(r: &RunnableRef) -> &str {
    r.name()
}
