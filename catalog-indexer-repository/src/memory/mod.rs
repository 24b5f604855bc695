//! In-process implementation of the identity store.
//!
//! Suitable for single-process deployments and tests. All operations take one
//! lock, which makes every call (and every transaction) atomic.

mod store;

pub use store::MemoryStore;
