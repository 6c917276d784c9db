//! Ensemble client: wire protocol engine for the Ensemble group
//! communication server
//!
//! Arsitektur:
//! - Protocol: big-endian codec, downcall/upcall translators
//! - Core: member state machine and id -> member dispatch
//! - Network: length-prefixed frames, one socket shared by all members
//!
//! ```no_run
//! use ensemble::{ClientConfig, Connection, JoinOps, Member, MessageKind};
//!
//! # fn main() -> ensemble::Result<()> {
//! let conn = Connection::connect(&ClientConfig::from_env())?;
//! let member = Member::new();
//! conn.join(&member, JoinOps::new("chat"))?;
//!
//! loop {
//!     let msg = conn.recv()?;
//!     match msg.kind {
//!         MessageKind::View(view) => println!("view: {:?}", view.view),
//!         MessageKind::Cast { origin, data } => println!("{}: {:?}", origin, data),
//!         MessageKind::Block => conn.block_ok(&msg.member)?,
//!         MessageKind::Exit => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod protocol;

pub use config::ClientConfig;
pub use core::{Member, Status};
pub use error::{Error, PreconditionError, ProtocolError, Result};
pub use network::{Connection, Message, MessageKind, Stream};
pub use protocol::{JoinOps, UpType, View, ViewId};
