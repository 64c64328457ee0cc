//! # Function-backed runnable (`RunnableFn`)
//!
//! [`RunnableFn`] wraps a closure `F: Fn(CancellationToken, Callback) -> Fut`, producing a
//! fresh future per run. A runnable can be run several times (e.g. after a restart),
//! so shared state belongs in an explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use procvisor::{Callback, Error, Runnable, RunnableFn, RunnableRef};
//!
//! let r: RunnableRef = RunnableFn::arc("worker", |ctx: CancellationToken, callback: Callback| async move {
//!     callback.call(ctx).await?;
//!     Ok::<_, Error>(())
//! });
//!
//! assert_eq!(r.name(), "worker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::runnable::{Callback, Runnable};

/// Function-backed runnable.
#[derive(Debug)]
pub struct RunnableFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> RunnableFn<F> {
    /// Creates a new function-backed runnable.
    ///
    /// Prefer [`RunnableFn::arc`] when you immediately need a [`RunnableRef`](crate::RunnableRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the runnable and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Runnable for RunnableFn<F>
where
    F: Fn(CancellationToken, Callback) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
        (self.f)(ctx, callback).await
    }
}
