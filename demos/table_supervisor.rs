//! # Example: table_supervisor
//!
//! A supervisor keeping a set of workers alive, driven by an in-memory table.
//!
//! Demonstrates how to:
//! - Put runnables into a [`MemoryTable`] and let the supervisor restore them.
//! - Add a worker at runtime and start it explicitly.
//! - Watch a crashing worker come back on the next reconciliation pass.
//! - Stop a worker and remove it from the table for good.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► table: { ticker-a, flaky }
//!   └─► Supervisor::run(ctx, callback)
//!         ├─► restore: ticker-a, flaky running
//!         └─► callback (the "controller"):
//!               ├─► insert ticker-b, start it
//!               ├─► flaky crashes → ProcessFailed → restarted after restart_interval
//!               ├─► remove ticker-a from the table, stop it
//!               └─► return → supervisor stops everything left
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example table_supervisor
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use procvisor::{
    Callback, Error, LogWriter, MemoryTable, Runnable, RunnableFn, RunnableRef, Subscribe,
    Supervisor, SupervisorConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn ticker(name: &'static str, period: Duration) -> RunnableRef {
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| async move {
        let serve = ctx.child_token();
        let ticks = {
            let serve = serve.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(period) => println!("[{name}] tick"),
                        _ = serve.cancelled() => break,
                    }
                }
            })
        };
        let res = callback.call(ctx).await;
        serve.cancel();
        let _ = ticks.await;
        println!("[{name}] released");
        res
    })
}

/// Crashes shortly after its first start; later runs stay up.
fn flaky(name: &'static str) -> RunnableRef {
    let runs = Arc::new(AtomicUsize::new(0));
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| {
        let run = runs.fetch_add(1, Ordering::SeqCst);
        async move {
            if run > 0 {
                println!("[{name}] back up (run {run})");
                return callback.call(ctx).await;
            }
            tokio::select! {
                res = callback.call(ctx) => res,
                _ = tokio::time::sleep(Duration::from_millis(300)) => Err(Error::fail("lost upstream")),
            }
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let table: MemoryTable<&'static str, RunnableRef> = MemoryTable::from([
        ("ticker-a", ticker("ticker-a", Duration::from_millis(200))),
        ("flaky", flaky("flaky")),
    ]);

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let sup = Supervisor::builder(table.clone())
        .with_config(SupervisorConfig {
            restart_interval: Duration::from_secs(1),
            ..SupervisorConfig::default()
        })
        .with_subscribers(subs)
        .build();

    let controller = {
        let sup = sup.clone();
        Callback::new(move |ctx: CancellationToken| async move {
            println!("restored: {:?}", sup.keys());

            table.insert("ticker-b", ticker("ticker-b", Duration::from_millis(350)));
            sup.start(&ctx, "ticker-b").await?;

            // flaky crashes, reconciliation brings it back
            tokio::time::sleep(Duration::from_millis(1500)).await;
            println!("flaky: {:?}", sup.get(&"flaky").map(|s| s.state()));

            table.remove(&"ticker-a");
            sup.stop(&ctx, &"ticker-a").await?;
            println!("after stop: {:?}", sup.keys());

            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
    };

    sup.run(CancellationToken::new(), controller).await?;
    println!("supervisor finished");
    Ok(())
}
