//! The DHT client seam.
//!
//! Routing, transport, storage and bootstrapping all live behind [Dht]; this
//! crate only issues gets and reconciles what comes back.

use std::sync::Arc;

use crate::common::{Id, Value, Where};

/// Called once per value received. Returning `false` asks the client to stop
/// delivering values for this get.
pub type OnValue = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Called exactly once when the get has exhausted every replica (`true`) or
/// failed (`false`).
pub type OnDone = Box<dyn FnOnce(bool) + Send>;

/// A DHT client able to run an asynchronous get.
pub trait Dht: Send + Sync {
    /// Start a get for every value stored under `key` that matches `filter`.
    ///
    /// Must not block. `on_value` may run on any of the client's threads,
    /// concurrently with itself, in any order, and may see the same value
    /// from several replicas. `on_done` runs once, after the last `on_value`.
    fn get(&self, key: Id, filter: Where, on_value: OnValue, on_done: OnDone);
}

impl<T: Dht + ?Sized> Dht for Arc<T> {
    fn get(&self, key: Id, filter: Where, on_value: OnValue, on_done: OnDone) {
        (**self).get(key, filter, on_value, on_done)
    }
}

impl<T: Dht + ?Sized> Dht for &T {
    fn get(&self, key: Id, filter: Where, on_value: OnValue, on_done: OnDone) {
        (**self).get(key, filter, on_value, on_done)
    }
}
