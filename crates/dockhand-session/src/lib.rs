//! Dockhand session store
//!
//! Per-run state for containerization workflows. Sessions are keyed,
//! TTL-bound and versioned; every update produces a new immutable value that
//! is swapped into the store atomically.
//!
//! ## Key Components
//!
//! - `SessionStore`: create / get / update / delete / list with lazy expiry
//! - `SweeperHandle`: background expiry sweep with explicit shutdown
//! - `Session`, `SessionUpdate`, `SessionFilter`: record and mutation types

mod error;
mod model;
mod store;
mod sweeper;

pub use error::{SessionError, SessionResult};
pub use model::{
    deep_merge_map, NewSession, Session, SessionFilter, SessionStatus, SessionUpdate,
};
pub use store::{SessionStore, SessionStoreConfig, StoreStats};
pub use sweeper::SweeperHandle;
