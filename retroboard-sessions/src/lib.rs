//! Retroboard Sessions - Board session registry and authorization engine
//!
//! Keeps the authoritative set of participant sessions per board and decides
//! who may change which fields of whose session:
//!
//! - **Store** ([`store`]): per-board persistence with commit-time invariants
//! - **Filters** ([`filter`]): permissive query predicates for listings
//! - **Authorization** ([`authorization`]): the self/other role decision table
//! - **Service** ([`service`]): the public operations and change notifications
//!
//! Transports (HTTP, realtime) live in `retroboard-web` and call into
//! [`SessionService`].

pub mod authorization;
pub mod errors;
pub mod filter;
pub mod service;
pub mod store;
pub mod types;

pub use authorization::{authorize_bulk, authorize_update, decide, Decision, Relation, RoleChange};
pub use errors::{DenialReason, SessionError, SessionResult};
pub use filter::SessionFilter;
pub use service::SessionService;
pub use store::{MemorySessionStore, SessionStore, StoreError, StoreResult, UpdateGuard};
#[cfg(feature = "sqlite")]
pub use store::SqliteSessionStore;
pub use types::{
    BoardId, BoardSession, SessionEvent, SessionRole, SessionUpdate, SessionUpdateRequest,
    SessionsUpdateRequest, UserId,
};
