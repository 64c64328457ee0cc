use async_trait::async_trait;

use crate::error::Error;
use crate::table::Cursor;

/// Cursor over rows collected up front.
#[derive(Debug)]
pub struct SnapshotCursor<K, V> {
    rows: std::vec::IntoIter<(K, V)>,
    current: Option<(K, V)>,
    closed: bool,
}

impl<K, V> SnapshotCursor<K, V> {
    pub fn new(rows: Vec<(K, V)>) -> Self {
        Self {
            rows: rows.into_iter(),
            current: None,
            closed: false,
        }
    }
}

#[async_trait]
impl<K, V> Cursor<K, V> for SnapshotCursor<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.rows.next();
        self.current.is_some()
    }

    fn get(&self) -> Result<(K, V), Error> {
        self.current
            .clone()
            .ok_or_else(|| Error::table("cursor is not positioned on a row"))
    }

    fn err(&self) -> Option<Error> {
        None
    }

    async fn close(&mut self) {
        self.closed = true;
        self.current = None;
    }
}
