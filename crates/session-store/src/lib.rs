//! Session Registry for Async Video Analysis
//!
//! Tracks analysis sessions through their lifecycle with thread-safe
//! operations. The store is the single source of truth for session state;
//! every mutation is funneled through one atomic update operation so that
//! readers always observe complete, consistent snapshots.

mod session;
mod store;

pub use session::{Session, SessionStatus, SessionUpdate};
pub use store::{SessionStore, SessionStoreConfig, StoreStats};
