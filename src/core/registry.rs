//! Member id allocation and the id -> member index
//!
//! The registry owns nothing the member does not already own; it only maps
//! the id the server echoes back in every upcall to the member handle.

use std::collections::HashMap;

use super::member::Member;
use crate::error::{PreconditionError, ProtocolError};

/// Strictly increasing member ids, starting at 1. Never reused or wrapped.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    /// `None` once `i32::MAX` has been handed out
    next: Option<i32>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: Some(1) }
    }
}

impl IdAllocator {
    pub(crate) fn alloc(&mut self) -> Result<i32, PreconditionError> {
        let id = self.next.ok_or(PreconditionError::IdsExhausted)?;
        self.next = id.checked_add(1);
        Ok(id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    members: HashMap<i32, Member>,
}

impl Registry {
    /// Ids come from [`IdAllocator`], so a duplicate means the allocator was
    /// bypassed. The existing entry is kept.
    pub(crate) fn add(&mut self, id: i32, member: Member) -> Result<(), PreconditionError> {
        if self.members.contains_key(&id) {
            return Err(PreconditionError::AlreadyRegistered(id));
        }
        self.members.insert(id, member);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: i32) -> Option<Member> {
        self.members.remove(&id)
    }

    /// Unknown ids are a protocol violation: the server referenced a member
    /// this client never created or already removed.
    pub(crate) fn lookup(&self, id: i32) -> Result<Member, ProtocolError> {
        self.members
            .get(&id)
            .cloned()
            .ok_or(ProtocolError::UnknownMember(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }
}
