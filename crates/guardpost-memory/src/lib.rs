// guardpost-memory — in-memory `AuthStore` backend.
//
// Intended for tests and local development. All tables live behind a single
// RwLock so multi-row operations stay atomic.

mod store;

pub use store::MemoryStore;
