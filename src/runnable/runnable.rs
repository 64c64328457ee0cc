//! # Runnable contract and its readiness callback.
//!
//! A [`Runnable`] is a long-lived unit: it initializes, invokes its [`Callback`] once it is
//! ready to serve, keeps running while the callback is pending, and cleans up after the
//! callback returns (or its scope is cancelled).
//!
//! ```text
//! run(ctx, callback)
//!   ├─► initialize
//!   ├─► callback.call(ctx) ──► (blocks while the unit is in service)
//!   ├─► cleanup
//!   └─► return Ok / Err
//! ```
//!
//! Because [`Callback::call`] consumes the callback, it can be invoked at most once.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Shared handle to a runnable (`Arc<dyn Runnable>`).
pub type RunnableRef = Arc<dyn Runnable>;

type CallbackFn = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), Error>> + Send>;

/// One-shot readiness callback handed to [`Runnable::run`].
///
/// The callback returns once the unit should shut down: either because a stop was
/// requested by whoever owns the unit, or because the scope passed to it was cancelled.
pub struct Callback {
    f: CallbackFn,
}

impl Callback {
    /// Wraps an async closure as a callback.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            f: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    /// A callback that returns immediately.
    pub fn noop() -> Self {
        Self::new(|_ctx| async { Ok(()) })
    }

    /// A callback that holds the unit until `ctx` is cancelled.
    pub fn until_cancelled() -> Self {
        Self::new(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok(())
        })
    }

    /// Signals readiness and waits for the rest of the unit's service life.
    pub async fn call(self, ctx: CancellationToken) -> Result<(), Error> {
        (self.f)(ctx).await
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// # Long-lived, cancellable unit with a readiness callback.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use procvisor::{Callback, Error, Runnable};
///
/// struct Listener;
///
/// #[async_trait]
/// impl Runnable for Listener {
///     fn name(&self) -> &str { "listener" }
///
///     async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
///         // bind sockets...
///         callback.call(ctx).await?;
///         // close sockets...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Runs the unit until the callback returns or `ctx` is cancelled.
    ///
    /// Implementations call `callback` once initialization completes. Returning before
    /// calling it is a startup failure from the owner's point of view.
    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error>;
}

#[async_trait]
impl<T: Runnable + ?Sized> Runnable for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
        (**self).run(ctx, callback).await
    }
}
