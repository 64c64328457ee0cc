//! # Desired-state table read by the supervisor.
//!
//! The supervisor never writes the table; it only reads it:
//! - [`Table::get`] when a key is started on demand;
//! - [`Table::iter`] on every reconciliation pass, to find keys that should be running.
//!
//! [`MemoryTable`] is a concurrent in-memory implementation.

mod cursor;
mod memory;

pub use cursor::SnapshotCursor;
pub use memory::MemoryTable;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;

/// Shared handle to a table.
pub type TableRef<K, V> = Arc<dyn Table<K, V>>;

/// Keyed source of runnables.
#[async_trait]
pub trait Table<K, V>: Send + Sync + 'static
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    /// Looks up one key; a missing key is [`Error::NotFound`].
    async fn get(&self, key: &K) -> Result<V, Error>;

    /// Opens a cursor over the current contents.
    async fn iter(&self) -> Result<Box<dyn Cursor<K, V>>, Error>;
}

/// Forward-only iteration over a table.
///
/// ```text
/// while cursor.next().await {
///     let (key, value) = cursor.get()?;
/// }
/// if let Some(err) = cursor.err() { ... }
/// cursor.close().await;
/// ```
#[async_trait]
pub trait Cursor<K, V>: Send {
    /// Advances to the next row; `false` when exhausted or failed.
    async fn next(&mut self) -> bool;

    /// Current row.
    fn get(&self) -> Result<(K, V), Error>;

    /// Error that ended the iteration early, if any.
    fn err(&self) -> Option<Error>;

    /// Releases the cursor.
    async fn close(&mut self);
}
