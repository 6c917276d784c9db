//! Duplex byte stream used by a connection
//!
//! The connection needs three handles onto one socket: one for the send
//! path, one for the receive path and one to probe for pending bytes or shut
//! the socket down without touching either path lock.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// A connected, blocking, bidirectional byte stream.
pub trait Stream: Read + Write + Send + Sync + Sized + 'static {
    /// Another handle onto the same underlying socket
    fn try_clone(&self) -> io::Result<Self>;

    /// Bytes that can be read without blocking. Must not change the
    /// blocking mode of the socket, other handles are using it.
    fn bytes_pending(&self) -> io::Result<usize>;

    /// Shut down both directions, releasing any thread blocked on the stream
    fn shutdown(&self) -> io::Result<()>;
}

/// `FIONREAD` on the raw descriptor
#[cfg(unix)]
fn fionread<T: AsRawFd>(stream: &T) -> io::Result<usize> {
    let mut pending: libc::c_int = 0;
    // SAFETY: FIONREAD stores a single c_int through the pointer, which
    // points at a live local.
    let rc = unsafe {
        libc::ioctl(
            stream.as_raw_fd(),
            libc::FIONREAD,
            &mut pending as *mut libc::c_int,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(pending.max(0) as usize)
}

impl Stream for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    #[cfg(unix)]
    fn bytes_pending(&self) -> io::Result<usize> {
        fionread(self)
    }

    #[cfg(not(unix))]
    fn bytes_pending(&self) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "pending byte probe is only available on unix",
        ))
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(unix)]
impl Stream for UnixStream {
    fn try_clone(&self) -> io::Result<Self> {
        UnixStream::try_clone(self)
    }

    fn bytes_pending(&self) -> io::Result<usize> {
        fionread(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}
