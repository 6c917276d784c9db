//! Length-prefixed frame transport
//!
//! ```text
//! [header_length: i32 BE][data_length: i32 BE][header bytes][data bytes]
//! ```
//!
//! The writer stages the header in a reusable [`Encoder`] and sends the
//! payload straight from the caller's slice. The reader keeps one growable
//! header buffer for the life of the connection and allocates the data
//! section fresh for every frame, since it is handed to the application.
//! Lengths above the header or payload ceiling are a protocol error.

use std::io::{self, Read, Write};

use tracing::trace;

use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{Encoder, HEADER_HIGH_WATER, HEADER_INITIAL_CAPACITY};
use crate::protocol::message::{
    FRAME_PREFIX_SIZE, HEADER_MAX_SIZE, INT_SIZE, MIN_HEADER_SIZE, MSG_MAX_SIZE,
};

/// Send half: header staging plus the write side of the stream
pub struct FrameWriter<W> {
    stream: W,
    header: Encoder,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            header: Encoder::new(HEADER_INITIAL_CAPACITY),
        }
    }

    /// Start a new frame. Anything staged before is discarded.
    #[inline]
    pub fn begin(&mut self) -> &mut Encoder {
        self.header.reset();
        &mut self.header
    }

    /// Write the staged header and `data` as one frame.
    ///
    /// Blocks until every byte is written. The staging buffer is reset and,
    /// if it grew past the high-water mark, shrunk back.
    pub fn end(&mut self, data: &[u8]) -> io::Result<()> {
        let header = self.header.as_bytes();
        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        prefix[..INT_SIZE].copy_from_slice(&(header.len() as i32).to_be_bytes());
        prefix[INT_SIZE..].copy_from_slice(&(data.len() as i32).to_be_bytes());

        trace!(header_len = header.len(), data_len = data.len(), "writing frame");

        let result = write_frame(&mut self.stream, &prefix, header, data);

        self.header.reset();
        self.header.shrink_if_oversized();
        result
    }

    /// Bytes currently staged
    pub fn staged(&self) -> &[u8] {
        self.header.as_bytes()
    }

    pub fn header_capacity(&self) -> usize {
        self.header.capacity()
    }

    pub fn get_ref(&self) -> &W {
        &self.stream
    }

    pub fn into_inner(self) -> W {
        self.stream
    }
}

fn write_frame<W: Write>(
    stream: &mut W,
    prefix: &[u8],
    header: &[u8],
    data: &[u8],
) -> io::Result<()> {
    stream.write_all(prefix)?;
    stream.write_all(header)?;
    if !data.is_empty() {
        stream.write_all(data)?;
    }
    stream.flush()
}

/// One received frame. `header` borrows the reader's buffer and is only
/// valid until the next read; `data` is owned.
#[derive(Debug)]
pub struct Frame<'a> {
    pub header: &'a [u8],
    pub data: Vec<u8>,
}

/// Receive half: read side of the stream plus the header buffer
pub struct FrameReader<R> {
    stream: R,
    header: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            header: vec![0u8; HEADER_INITIAL_CAPACITY],
        }
    }

    /// Block until a complete frame has arrived.
    pub fn read_frame(&mut self) -> Result<Frame<'_>> {
        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        self.stream.read_exact(&mut prefix)?;

        let header_len = i32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let data_len = i32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);

        if header_len < MIN_HEADER_SIZE as i32 {
            return Err(ProtocolError::HeaderTooShort(header_len).into());
        }
        let data_len = usize::try_from(data_len).map_err(|_| ProtocolError::NegativeLength {
            field: "data",
            len: data_len,
        })?;
        let header_len = header_len as usize;

        // Both lengths are checked before anything is allocated
        if header_len > HEADER_MAX_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                section: "header",
                len: header_len,
                max: HEADER_MAX_SIZE,
            }
            .into());
        }
        if data_len > MSG_MAX_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                section: "data",
                len: data_len,
                max: MSG_MAX_SIZE,
            }
            .into());
        }

        // Buffer left large by an earlier frame goes back to its initial size
        if self.header.len() > HEADER_HIGH_WATER && header_len <= HEADER_HIGH_WATER {
            self.header = vec![0u8; HEADER_INITIAL_CAPACITY];
        }
        if header_len > self.header.len() {
            let mut new_size = self.header.len().max(1);
            while header_len > new_size {
                new_size *= 2;
            }
            self.header.resize(new_size, 0);
        }
        self.stream.read_exact(&mut self.header[..header_len])?;

        let mut data = Vec::new();
        if data_len > 0 {
            data = vec![0u8; data_len];
            self.stream.read_exact(&mut data)?;
        }

        trace!(header_len, data_len, "read frame");
        Ok(Frame {
            header: &self.header[..header_len],
            data,
        })
    }

    pub fn header_capacity(&self) -> usize {
        self.header.len()
    }

    pub fn get_ref(&self) -> &R {
        &self.stream
    }
}
