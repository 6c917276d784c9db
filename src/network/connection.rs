//! Connection to the Ensemble server
//!
//! One socket is shared by every member created on it. Two independent
//! locks guard it:
//! - the send lock serializes downcalls: header staging, id allocation and
//!   the frame write happen as one unit
//! - the receive lock serializes `recv`: frame read, decode and the member
//!   side effects happen as one unit
//!
//! Both paths block. A downcall returns once its frame is fully written,
//! `recv` returns once a full frame has arrived. `close` releases a blocked
//! receiver.
//!
//! Lock order: path lock -> registry lock, path lock -> member lock. The
//! registry and member locks are never held together and never across I/O.

use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::stream::Stream;
use super::transport::{FrameReader, FrameWriter};
use crate::config::ClientConfig;
use crate::core::{ConnectionToken, IdAllocator, Member, Registry};
use crate::error::{PreconditionError, Result};
use crate::protocol::message::DESTS_MAX_SIZE;
use crate::protocol::translator::check_join_ops;
use crate::protocol::{
    decode_upcall, encode_downcall, Decoder, Downcall, JoinOps, UpType, Upcall, View, MSG_MAX_SIZE,
};

/// A decoded upcall together with the member it belongs to
#[derive(Debug)]
pub struct Message {
    pub member: Member,
    pub kind: MessageKind,
}

/// Typed payload of an upcall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// New view, already installed on the member
    View(Arc<View>),
    /// Multicast from `origin`
    Cast { origin: i32, data: Vec<u8> },
    /// Point-to-point from `origin`
    Send { origin: i32, data: Vec<u8> },
    /// Server asks the member to stop sending; answer with `block_ok`
    Block,
    /// Member has left, it is now inert
    Exit,
}

impl Message {
    pub fn up_type(&self) -> UpType {
        match self.kind {
            MessageKind::View(_) => UpType::View,
            MessageKind::Cast { .. } => UpType::Cast,
            MessageKind::Send { .. } => UpType::Send,
            MessageKind::Block => UpType::Block,
            MessageKind::Exit => UpType::Exit,
        }
    }
}

struct SendPath<S> {
    frames: FrameWriter<S>,
    ids: IdAllocator,
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

pub struct Connection<S: Stream = TcpStream> {
    /// Stamped on every member that joins here
    token: ConnectionToken,
    send: Mutex<SendPath<S>>,
    recv: Mutex<FrameReader<S>>,
    registry: Mutex<Registry>,
    /// Third handle, for `poll` and `close` without taking a path lock
    probe: S,
}

impl Connection<TcpStream> {
    /// Connect to the server described by `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port))?;
        stream.set_nodelay(config.nodelay)?;
        info!(host = %config.host, port = config.port, "connected to ensemble server");
        Self::new(stream)
    }
}

fn check_payload(data: &[u8]) -> std::result::Result<(), PreconditionError> {
    if data.len() > MSG_MAX_SIZE {
        return Err(PreconditionError::PayloadTooLarge {
            size: data.len(),
            max: MSG_MAX_SIZE,
        });
    }
    Ok(())
}

fn check_rank_count(count: usize) -> std::result::Result<(), PreconditionError> {
    if count > DESTS_MAX_SIZE {
        return Err(PreconditionError::TooManyRanks {
            count,
            max: DESTS_MAX_SIZE,
        });
    }
    Ok(())
}

/// Ranks must fall in `[0, nmembers]`
fn check_ranks(ranks: &[i32], view: &View) -> std::result::Result<(), PreconditionError> {
    match ranks.iter().find(|&&r| r < 0 || r > view.nmembers) {
        Some(&rank) => Err(PreconditionError::RankOutOfRange {
            rank,
            nmembers: view.nmembers,
        }),
        None => Ok(()),
    }
}

impl<S: Stream> Connection<S> {
    /// Wrap an already connected stream.
    pub fn new(stream: S) -> Result<Self> {
        let reader = stream.try_clone()?;
        let probe = stream.try_clone()?;
        Ok(Self {
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            send: Mutex::new(SendPath {
                frames: FrameWriter::new(stream),
                ids: IdAllocator::default(),
            }),
            recv: Mutex::new(FrameReader::new(reader)),
            registry: Mutex::new(Registry::default()),
            probe,
        })
    }

    fn write_downcall(
        path: &mut SendPath<S>,
        member_id: i32,
        call: &Downcall,
        data: &[u8],
    ) -> Result<()> {
        encode_downcall(path.frames.begin(), member_id, call);
        path.frames.end(data)?;
        debug!(
            member = member_id,
            downcall = ?call.dn_type(),
            data_len = data.len(),
            "downcall sent"
        );
        Ok(())
    }

    /// Join a group. Assigns the member its id and binds it to this
    /// connection; later downcalls on any other connection are rejected.
    pub fn join(&self, member: &Member, ops: JoinOps) -> Result<()> {
        check_join_ops(&ops)?;

        let mut send = self.send.lock();
        let id = member.lock().begin_join(&mut send.ids, self.token)?;
        // Registered before the write so the first view always finds it
        let registered = self.registry.lock().add(id, member.clone());
        if let Err(err) = registered {
            member.lock().abort_join();
            return Err(err.into());
        }
        info!(member = id, group = %ops.group_name, "joining group");

        let result = Self::write_downcall(&mut send, id, &Downcall::Join(ops), &[]);
        if result.is_err() {
            self.registry.lock().remove(id);
        }
        result
    }

    /// Leave the group. Upcalls may still arrive until the exit.
    pub fn leave(&self, member: &Member) -> Result<()> {
        let mut send = self.send.lock();
        let id = member.lock().begin_leave(self.token)?;
        info!(member = id, "leaving group");
        Self::write_downcall(&mut send, id, &Downcall::Leave, &[])
    }

    /// Multicast `data` to the group.
    pub fn cast(&self, member: &Member, data: &[u8]) -> Result<()> {
        check_payload(data)?;
        let mut send = self.send.lock();
        let (id, _) = member.lock().check_valid("cast", self.token)?;
        Self::write_downcall(&mut send, id, &Downcall::Cast, data)
    }

    /// Point-to-point to every rank in `dests`.
    pub fn send(&self, member: &Member, dests: &[i32], data: &[u8]) -> Result<()> {
        check_payload(data)?;
        check_rank_count(dests.len())?;
        let mut send = self.send.lock();
        let id = {
            let state = member.lock();
            let (id, view) = state.check_valid("send", self.token)?;
            check_ranks(dests, view)?;
            id
        };
        Self::write_downcall(&mut send, id, &Downcall::Send(dests.to_vec()), data)
    }

    /// Point-to-point to a single rank.
    pub fn send1(&self, member: &Member, dest: i32, data: &[u8]) -> Result<()> {
        check_payload(data)?;
        let mut send = self.send.lock();
        let id = {
            let state = member.lock();
            let (id, view) = state.check_valid("send1", self.token)?;
            check_ranks(&[dest], view)?;
            id
        };
        Self::write_downcall(&mut send, id, &Downcall::Send1(dest), data)
    }

    /// Report members as failure-suspected.
    pub fn suspect(&self, member: &Member, suspects: &[i32]) -> Result<()> {
        check_rank_count(suspects.len())?;
        let mut send = self.send.lock();
        let id = {
            let state = member.lock();
            let (id, view) = state.check_valid("suspect", self.token)?;
            check_ranks(suspects, view)?;
            id
        };
        Self::write_downcall(&mut send, id, &Downcall::Suspect(suspects.to_vec()), &[])
    }

    /// Acknowledge a block. The member stays blocked until the next view.
    pub fn block_ok(&self, member: &Member) -> Result<()> {
        let mut send = self.send.lock();
        let id = member.lock().block(self.token)?;
        Self::write_downcall(&mut send, id, &Downcall::BlockOk, &[])
    }

    /// True if bytes are waiting, so `recv` will make progress without
    /// waiting on the server. Never blocks.
    pub fn poll(&self) -> Result<bool> {
        Ok(self.probe.bytes_pending()? > 0)
    }

    /// Receive one upcall. Blocks until a full frame has arrived.
    ///
    /// Any error is fatal: the connection should be closed.
    pub fn recv(&self) -> Result<Message> {
        let mut reader = self.recv.lock();
        let result = self.recv_locked(&mut reader);
        if let Err(err) = &result {
            warn!(error = %err, "receive path failed");
        }
        result
    }

    fn recv_locked(&self, reader: &mut FrameReader<S>) -> Result<Message> {
        let frame = reader.read_frame()?;
        let mut decoder = Decoder::new(frame.header);
        let (id, upcall) = decode_upcall(&mut decoder)?;
        decoder.finish()?;

        let member = self.registry.lock().lookup(id)?;
        debug!(
            member = id,
            upcall = ?upcall.up_type(),
            data_len = frame.data.len(),
            "upcall received"
        );

        let kind = match upcall {
            Upcall::View(view) => {
                let view = Arc::new(view);
                member.lock().install_view(Arc::clone(&view));
                info!(
                    member = id,
                    nmembers = view.nmembers,
                    ltime = view.ltime,
                    "view installed"
                );
                MessageKind::View(view)
            }
            Upcall::Cast { origin } => MessageKind::Cast {
                origin,
                data: frame.data,
            },
            Upcall::Send { origin } => MessageKind::Send {
                origin,
                data: frame.data,
            },
            Upcall::Block => MessageKind::Block,
            Upcall::Exit => {
                member.lock().exit()?;
                self.registry.lock().remove(id);
                info!(member = id, "member exited");
                MessageKind::Exit
            }
        };
        Ok(Message { member, kind })
    }

    /// Shut the socket down in both directions. A thread blocked in `recv`
    /// returns with a transport error.
    pub fn close(&self) -> Result<()> {
        match self.probe.shutdown() {
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Members currently joined, joining or leaving
    pub fn member_count(&self) -> usize {
        self.registry.lock().len()
    }
}
