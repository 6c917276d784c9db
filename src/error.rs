//! Error taxonomy
//!
//! Two kinds of failure:
//! - [`PreconditionError`]: the caller asked for something illegal. Nothing was
//!   written, the connection stays usable.
//! - [`ProtocolError`] / transport I/O errors: the byte stream is no longer in a
//!   known state. The connection must be torn down by the caller.
//!
//! Nothing in this crate retries.

use std::io;

use thiserror::Error;

use crate::core::Status;

/// Local, synchronous failure at the call site.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// Operation issued against a member in the wrong lifecycle state
    #[error("cannot {operation} while member {member:?} is {status:?}")]
    InvalidStatus {
        /// Member id, `None` if the member never joined
        member: Option<i32>,
        /// Status at the time of the call
        status: Status,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Bulk payload above the per-message ceiling
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Destination or suspect list too long
    #[error("{count} ranks given, at most {max} allowed")]
    TooManyRanks { count: usize, max: usize },

    /// Rank outside of the current view
    #[error("rank {rank} out of bounds for view of {nmembers} members")]
    RankOutOfRange { rank: i32, nmembers: i32 },

    /// Join string longer than the server accepts
    #[error("{field} is {len} bytes, server limit is {max}")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Join string contains characters outside the single-byte set
    #[error("{field} contains non-ASCII characters")]
    NotSingleByte { field: &'static str },

    /// Member joined on a different connection
    #[error("cannot {operation}: member {member:?} belongs to another connection")]
    ForeignConnection {
        member: Option<i32>,
        operation: &'static str,
    },

    /// Every member id of this connection has been handed out
    #[error("member ids exhausted on this connection")]
    IdsExhausted,

    /// Member id already present in the registry
    #[error("member id {0} already registered")]
    AlreadyRegistered(i32),
}

/// Wire protocol violation. Connection-fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("header too short: {0} bytes, need at least 4")]
    HeaderTooShort(i32),

    #[error("{section} of {len} bytes exceeds maximum {max}")]
    FrameTooLarge {
        section: &'static str,
        len: usize,
        max: usize,
    },

    #[error("negative {field} length: {len}")]
    NegativeLength { field: &'static str, len: i32 },

    #[error("truncated header: need {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("string of {len} bytes exceeds maximum {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("bad key size {0}")]
    BadKeySize(i32),

    #[error("unknown upcall type {0}")]
    UnknownUpcall(i32),

    #[error("unknown downcall type {0}")]
    UnknownDowncall(i32),

    /// Server referenced a member this client never created or already removed
    #[error("unknown member id {0}")]
    UnknownMember(i32),

    #[error("header not fully consumed: read {consumed} of {len} bytes")]
    HeaderNotConsumed { consumed: usize, len: usize },

    #[error("exit for member {member} while {status:?}, expected Leaving")]
    UnexpectedExit { member: i32, status: Status },
}

/// Top-level error returned by every [`Connection`](crate::Connection) operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
}

impl Error {
    /// True if the connection must be torn down.
    ///
    /// Transport failures count as fatal: a short write or read leaves the
    /// frame stream out of sync.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Precondition(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
