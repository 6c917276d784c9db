//! Core module: member lifecycle and dispatch
//!
//! - `Member`: application handle, guards its own status and view
//! - `Registry`: member id -> member, used to route every upcall

mod member;
mod registry;

pub use member::{Member, Status};
pub(crate) use member::ConnectionToken;
pub(crate) use registry::{IdAllocator, Registry};
