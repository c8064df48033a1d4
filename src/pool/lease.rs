//! Checkout guard.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::manager::PoolInner;
use super::connection::PooledConnection;
use crate::detection::Transport;

/// A connection checked out of the pool.
///
/// Returns the connection to the idle queue when dropped, so every successful
/// `acquire` is matched by exactly one release on every exit path.
pub struct Lease<T: Transport> {
    conn: Option<PooledConnection<T>>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Transport> Lease<T> {
    pub(crate) fn new(conn: PooledConnection<T>, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Take the connection out of the guard. The caller must hand it back
    /// with [`crate::Pool::release`] or the pool permanently loses a slot.
    pub fn detach(mut self) -> PooledConnection<T> {
        self.conn.take().expect("lease already released")
    }

    /// Return the connection now instead of at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Transport> Deref for Lease<T> {
    type Target = PooledConnection<T>;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("lease already released")
    }
}

impl<T: Transport> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("lease already released")
    }
}

impl<T: Transport> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease").field("conn", &self.conn).finish()
    }
}
