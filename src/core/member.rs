//! Group member handle and its lifecycle
//!
//! ```text
//! ┌─────┐ join ┌─────────┐ view ┌────────┐ block_ok ┌─────────┐
//! │ Pre │─────>│ Joining │─────>│ Normal │─────────>│ Blocked │
//! └─────┘      └─────────┘      └────────┘<─────────└─────────┘
//!                                   │         view
//!                                   │ leave
//!                                   ↓
//!                              ┌─────────┐ exit ┌──────┐
//!                              │ Leaving │─────>│ Left │
//!                              └─────────┘      └──────┘
//! ```
//!
//! Only `Normal` accepts downcalls other than join. `Left` is terminal.
//! A member belongs to the connection it joined on; every later downcall
//! must go through that same connection.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::registry::IdAllocator;
use crate::error::{PreconditionError, ProtocolError};
use crate::protocol::View;

/// Member lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Created, not joined yet
    Pre,
    /// Join sent, waiting for the first view
    Joining,
    /// Can cast and send
    Normal,
    /// BlockOk sent, waiting for the next view
    Blocked,
    /// Leave sent, waiting for exit
    Leaving,
    /// Exit received, member is inert
    Left,
}

/// Identifies one connection for the lifetime of the process
pub(crate) type ConnectionToken = u64;

pub(crate) struct MemberState {
    id: Option<i32>,
    status: Status,
    view: Option<Arc<View>>,
    /// Connection the member joined on
    conn: Option<ConnectionToken>,
}

impl MemberState {
    fn invalid(&self, operation: &'static str) -> PreconditionError {
        PreconditionError::InvalidStatus {
            member: self.id,
            status: self.status,
            operation,
        }
    }

    /// Pre -> Joining on `conn`. The id is allocated only if the member is
    /// fresh.
    pub(crate) fn begin_join(
        &mut self,
        ids: &mut IdAllocator,
        conn: ConnectionToken,
    ) -> Result<i32, PreconditionError> {
        if self.status != Status::Pre {
            return Err(self.invalid("join"));
        }
        let id = ids.alloc()?;
        self.id = Some(id);
        self.conn = Some(conn);
        self.status = Status::Joining;
        Ok(id)
    }

    /// Joining -> Pre, for a join that could not be registered
    pub(crate) fn abort_join(&mut self) {
        self.id = None;
        self.conn = None;
        self.status = Status::Pre;
    }

    /// Gate for every downcall except join. Returns the id and current view.
    pub(crate) fn check_valid(
        &self,
        operation: &'static str,
        conn: ConnectionToken,
    ) -> Result<(i32, &View), PreconditionError> {
        if self.conn.is_some_and(|own| own != conn) {
            return Err(PreconditionError::ForeignConnection {
                member: self.id,
                operation,
            });
        }
        match (self.status, self.id, self.view.as_deref()) {
            (Status::Normal, Some(id), Some(view)) => Ok((id, view)),
            _ => Err(self.invalid(operation)),
        }
    }

    /// Normal -> Leaving
    pub(crate) fn begin_leave(&mut self, conn: ConnectionToken) -> Result<i32, PreconditionError> {
        let (id, _) = self.check_valid("leave", conn)?;
        self.status = Status::Leaving;
        Ok(id)
    }

    /// Normal -> Blocked
    pub(crate) fn block(&mut self, conn: ConnectionToken) -> Result<i32, PreconditionError> {
        let (id, _) = self.check_valid("block_ok", conn)?;
        self.status = Status::Blocked;
        Ok(id)
    }

    /// A new view replaces the old one and unblocks the member. A member
    /// that is already leaving stays leaving so its exit is still accepted.
    pub(crate) fn install_view(&mut self, view: Arc<View>) {
        self.view = Some(view);
        if self.status != Status::Leaving {
            self.status = Status::Normal;
        }
    }

    /// Leaving -> Left
    pub(crate) fn exit(&mut self) -> Result<(), ProtocolError> {
        if self.status != Status::Leaving {
            return Err(ProtocolError::UnexpectedExit {
                member: self.id.unwrap_or(-1),
                status: self.status,
            });
        }
        self.status = Status::Left;
        Ok(())
    }
}

/// Application handle to one group membership.
///
/// Cheap to clone; clones refer to the same member. The id is assigned when
/// the member joins and never reused on the same connection.
#[derive(Clone)]
pub struct Member {
    state: Arc<Mutex<MemberState>>,
}

impl Default for Member {
    fn default() -> Self {
        Self::new()
    }
}

impl Member {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemberState {
                id: None,
                status: Status::Pre,
                view: None,
                conn: None,
            })),
        }
    }

    /// Id assigned at join, `None` before that
    pub fn id(&self) -> Option<i32> {
        self.state.lock().id
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    /// Most recent view, `None` until the first one arrives
    pub fn view(&self) -> Option<Arc<View>> {
        self.state.lock().view.clone()
    }

    /// True if both handles refer to the same member
    pub fn ptr_eq(&self, other: &Member) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, MemberState> {
        self.state.lock()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Member")
            .field("id", &state.id)
            .field("status", &state.status)
            .finish()
    }
}
