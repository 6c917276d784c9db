//! Network Layer: blocking socket I/O
//!
//! - `transport`: length-prefixed frames over any `Read`/`Write`
//! - `Stream`: socket handle that can be cloned, probed and shut down
//! - `Connection`: send path and receive path behind separate locks

mod connection;
mod stream;
pub mod transport;

pub use connection::{Connection, Message, MessageKind};
pub use stream::Stream;
pub use transport::{Frame, FrameReader, FrameWriter};
