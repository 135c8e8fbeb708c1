//! Filter state shared between the filter loop and observers.
//!
//! The filter loop is the only writer. Every mutation (predict, update, feature maintenance)
//! runs as one closure under the write lock, so state and covariance always change together.
//! Observers such as diagnostics or visualization either read under the read lock or take a
//! cloned snapshot; neither can see a slot half way through initialization or removal.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::filter_state::FilterState;

/// Cloneable handle to a [FilterState] behind a `parking_lot::RwLock`.
#[derive(Clone, Debug)]
pub struct SharedFilterState {
    inner: Arc<RwLock<FilterState>>,
}
impl SharedFilterState {
    pub fn new(filter_state: FilterState) -> SharedFilterState {
        SharedFilterState {
            inner: Arc::new(RwLock::new(filter_state)),
        }
    }
    /// Run `f` with exclusive access. Readers wait until `f` returns.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut FilterState) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut guard)
    }
    /// Run `f` with shared access.
    pub fn read<R>(&self, f: impl FnOnce(&FilterState) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }
    /// Consistent copy of state and covariance.
    pub fn snapshot(&self) -> FilterState {
        self.inner.read().clone()
    }
}
