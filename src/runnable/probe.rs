//! Recording runnables shared by the composition tests.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::runnable::{Callback, RunnableFn, RunnableRef};

#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Serves until released; journals `start:<name>` and `stop:<name>`.
pub(crate) fn recorder(name: &'static str, journal: &Journal) -> RunnableRef {
    let journal = journal.clone();
    RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| {
        let journal = journal.clone();
        async move {
            journal.push(format!("start:{name}"));
            let res = callback.call(ctx).await;
            journal.push(format!("stop:{name}"));
            res
        }
    })
}

/// Fails during startup with `Error::fail(name)`.
pub(crate) fn broken(name: &'static str, journal: &Journal) -> RunnableRef {
    let journal = journal.clone();
    RunnableFn::arc(name, move |_ctx: CancellationToken, _callback: Callback| {
        let journal = journal.clone();
        async move {
            journal.push(format!("start:{name}"));
            Err::<(), _>(Error::fail(name))
        }
    })
}
