//! # Lazily Built Connector Clients
//!
//! [`LazyClient`] holds the single downstream client of a connector factory. The first
//! caller builds it, every later caller reads the cached `Arc`.
//!
//! ## Construction protocol
//!
//! 1. read the cached client under a shared lock and return it when present
//! 2. otherwise take the construction mutex
//! 3. flip the `created` flag with a compare-and-swap; only the winner builds
//! 4. on failure the flag is reset so the next caller retries
//! 5. everyone else reads the now populated cache
//!
//! Reads after the first build never touch the construction mutex.
//!
//! ## Rust Concepts Used
//!
//! - `parking_lot::RwLock` for the cached reference, `parking_lot::Mutex` for construction
//! - `AtomicBool::compare_exchange` as the "created" flag

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::error::{GatewayError, GatewayResult};

/// Cell building its client at most once until closed
pub struct LazyClient<T> {
    client: RwLock<Option<Arc<T>>>,
    construction: Mutex<()>,
    created: AtomicBool,
}

impl<T> LazyClient<T> {
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            construction: Mutex::new(()),
            created: AtomicBool::new(false),
        }
    }

    /// Cached client, if one has been built
    pub fn get(&self) -> Option<Arc<T>> {
        self.client.read().clone()
    }

    pub fn is_built(&self) -> bool {
        self.client.read().is_some()
    }

    /// Return the cached client or build it with `build`
    pub fn get_or_build<F>(&self, build: F) -> GatewayResult<Arc<T>>
    where
        F: FnOnce() -> GatewayResult<T>,
    {
        if let Some(client) = self.get() {
            return Ok(client);
        }

        let _guard = self.construction.lock();
        if self
            .created
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return match build() {
                Ok(client) => {
                    let client = Arc::new(client);
                    *self.client.write() = Some(client.clone());
                    Ok(client)
                }
                Err(error) => {
                    self.created.store(false, Ordering::Release);
                    Err(error)
                }
            };
        }

        self.get()
            .ok_or_else(|| GatewayError::internal("connector client flagged as created but not cached"))
    }

    /// Drop the cached client so the next call builds a fresh one
    ///
    /// Returns the client that was cached, `None` when nothing was built. Calling it again
    /// is a no-op.
    pub fn close(&self) -> Option<Arc<T>> {
        let _guard = self.construction.lock();
        let client = self.client.write().take();
        self.created.store(false, Ordering::Release);
        client
    }
}

impl<T> Default for LazyClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LazyClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("built", &self.is_built())
            .finish()
    }
}
