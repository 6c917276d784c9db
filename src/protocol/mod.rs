//! Protocol Layer: length-prefixed binary marshaling
//!
//! - Big-endian 4-byte integers everywhere
//! - Length-prefixed strings and arrays, ceilings fixed by the server
//! - Typed downcall/upcall translators in both directions

pub mod codec;
pub mod message;
pub mod translator;

pub use codec::{Decoder, Encoder};
pub use message::{DnType, JoinOps, UpType, View, ViewId, DEFAULT_PORT, MSG_MAX_SIZE};
pub use translator::{decode_downcall, decode_upcall, encode_downcall, encode_upcall, Downcall, Upcall};
