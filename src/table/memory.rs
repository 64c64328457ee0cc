use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Error;
use crate::table::{Cursor, SnapshotCursor, Table};

/// In-memory table; clones share the same contents.
///
/// Cursors iterate a snapshot taken when [`Table::iter`] is called, so writes
/// during a reconciliation pass are picked up by the next one.
pub struct MemoryTable<K, V> {
    rows: Arc<DashMap<K, V>>,
}

impl<K, V> MemoryTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
        }
    }

    /// Inserts or replaces a row; returns the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.rows.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.rows.remove(key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for MemoryTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MemoryTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<K: Eq + Hash + fmt::Debug, V> fmt::Debug for MemoryTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTable")
            .field("len", &self.rows.len())
            .finish()
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for MemoryTable<K, V>
where
    K: Eq + Hash,
{
    fn from(rows: [(K, V); N]) -> Self {
        let table = Self::new();
        for (k, v) in rows {
            table.insert(k, v);
        }
        table
    }
}

#[async_trait]
impl<K, V> Table<K, V> for MemoryTable<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<V, Error> {
        self.rows
            .get(key)
            .map(|row| row.value().clone())
            .ok_or_else(|| Error::not_found(key))
    }

    async fn iter(&self) -> Result<Box<dyn Cursor<K, V>>, Error> {
        let rows: Vec<(K, V)> = self
            .rows
            .iter()
            .map(|row| (row.key().clone(), row.value().clone()))
            .collect();
        Ok(Box::new(SnapshotCursor::new(rows)))
    }
}
