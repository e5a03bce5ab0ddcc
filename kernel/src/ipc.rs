//! IPC Subsystem: bounded per-process message queues.
//!
//! Every pid below `NPROC` owns one queue of `MSG_QUEUE_CAPACITY` entries.
//! Pids are handed out monotonically, so a process whose pid is `NPROC` or
//! above has no queue: sends to it and its own receives fail with
//! `InvalidArgument`.
//! An entry is the sender's pid plus an 8-byte NUL-terminated payload.
//! Queues are never torn down: when a pid's slot is reused, the new process
//! inherits whatever is still queued for that id.
//!
//! **Locking:** one `spin::Mutex` covers all queues, so traffic to different
//! receivers serializes. The lock is never held while parking or unparking.
//!
//! **Delivery:**
//! - unicast `send` fails with `ResourceExhausted` on a full queue and
//!   leaves the queue untouched;
//! - broadcast `send_multi` skips negative receiver slots and silently
//!   skips receivers it cannot deliver to (partial delivery);
//! - `recv` blocks through a [`Parker`] until the caller's own queue is
//!   non-empty and returns the oldest entry.

use core::fmt;

use spin::Mutex;

use crate::config::{MSG_QUEUE_CAPACITY, MSG_SIZE, MULTICAST_FANOUT, NPROC};
use crate::error::{KResult, KernelError};
use crate::sync::park::Parker;
use crate::task::process::Pid;

// ── Payload ─────────────────────────────────────────────────────

/// Fixed 8-byte message body: up to 7 content bytes and a NUL terminator.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload([u8; MSG_SIZE]);

impl Payload {
    pub const EMPTY: Payload = Payload([0; MSG_SIZE]);

    /// Copy `bytes` up to the first NUL, truncated to 7 content bytes.
    pub fn new(bytes: &[u8]) -> Self {
        let mut raw = [0u8; MSG_SIZE];
        let len = bytes
            .iter()
            .take(MSG_SIZE - 1)
            .position(|&b| b == 0)
            .unwrap_or_else(|| bytes.len().min(MSG_SIZE - 1));
        raw[..len].copy_from_slice(&bytes[..len]);
        Payload(raw)
    }

    /// Content bytes, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(MSG_SIZE);
        &self.0[..len]
    }

    /// The full wire form, terminator and padding included.
    pub fn raw(&self) -> &[u8; MSG_SIZE] {
        &self.0
    }

    /// Copy content and terminator into `buf`, bounded by its length.
    /// Returns the number of bytes written.
    pub fn copy_to(&self, buf: &mut [u8]) -> usize {
        let n = (self.as_bytes().len() + 1).min(buf.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        n
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => write!(f, "Payload({:?})", s),
            Err(_) => write!(f, "Payload({:?})", self.as_bytes()),
        }
    }
}

// ── Message ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub sender: Pid,
    pub payload: Payload,
}

impl Message {
    pub const EMPTY: Message = Message {
        sender: Pid(0),
        payload: Payload::EMPTY,
    };
}

// ── Message queue ───────────────────────────────────────────────

/// Fixed-capacity FIFO ring of messages.
#[derive(Clone, Copy)]
pub struct MsgQueue {
    messages: [Message; MSG_QUEUE_CAPACITY],
    head: usize,
    tail: usize,
    count: usize,
}

impl MsgQueue {
    pub const fn new() -> Self {
        Self {
            messages: [Message::EMPTY; MSG_QUEUE_CAPACITY],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Append at the tail; a full queue is left unchanged.
    pub fn push(&mut self, msg: Message) -> KResult<()> {
        if self.is_full() {
            return Err(KernelError::ResourceExhausted);
        }
        self.messages[self.tail] = msg;
        self.tail = (self.tail + 1) % MSG_QUEUE_CAPACITY;
        self.count += 1;
        Ok(())
    }

    /// Take the oldest message.
    pub fn pop(&mut self) -> Option<Message> {
        if self.is_empty() {
            return None;
        }
        let msg = core::mem::replace(&mut self.messages[self.head], Message::EMPTY);
        self.head = (self.head + 1) % MSG_QUEUE_CAPACITY;
        self.count -= 1;
        Some(msg)
    }

    /// Queued messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> + '_ {
        (0..self.count).map(move |i| &self.messages[(self.head + i) % MSG_QUEUE_CAPACITY])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == MSG_QUEUE_CAPACITY
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for MsgQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Queue store ─────────────────────────────────────────────────

struct QueueSet {
    queues: [MsgQueue; NPROC],
    /// The queue's owner is parked (or about to park) waiting for a message.
    waiting: [bool; NPROC],
}

impl QueueSet {
    /// Enqueue and report whether the receiver has to be unparked.
    fn deliver(&mut self, sender: Pid, receiver: Pid, payload: Payload) -> KResult<bool> {
        let (Some(_), Some(slot)) = (sender.queue_index(), receiver.queue_index()) else {
            return Err(KernelError::InvalidArgument);
        };
        self.queues[slot].push(Message { sender, payload })?;
        Ok(core::mem::take(&mut self.waiting[slot]))
    }
}

/// All message queues behind one lock.
pub struct Mailboxes {
    inner: Mutex<QueueSet>,
}

impl Mailboxes {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(QueueSet {
                queues: [MsgQueue::new(); NPROC],
                waiting: [false; NPROC],
            }),
        }
    }

    /// Unicast. Both pids must be below `NPROC`.
    pub fn send<P: Parker>(
        &self,
        sender: Pid,
        receiver: Pid,
        payload: Payload,
        parker: &P,
    ) -> KResult<()> {
        let wake = self.inner.lock().deliver(sender, receiver, payload);
        match wake {
            Ok(wake) => {
                if wake {
                    parker.unpark(receiver);
                }
                Ok(())
            }
            Err(e) => {
                klog::warn!("ipc: send {} -> {} failed: {}", sender, receiver, e);
                Err(e)
            }
        }
    }

    /// Broadcast to up to `MULTICAST_FANOUT` receivers; negative entries are
    /// empty slots. Undeliverable receivers are skipped. Returns how many
    /// receivers got the message.
    pub fn send_multi<P: Parker>(
        &self,
        sender: Pid,
        receivers: &[i64; MULTICAST_FANOUT],
        payload: Payload,
        parker: &P,
    ) -> usize {
        let mut to_wake = [None; MULTICAST_FANOUT];
        let mut delivered = 0;
        {
            let mut set = self.inner.lock();
            for (i, &raw) in receivers.iter().enumerate() {
                if raw < 0 {
                    continue;
                }
                let Some(receiver) = Pid::from_raw(raw) else {
                    klog::debug!("ipc: broadcast from {} skips receiver {}", sender, raw);
                    continue;
                };
                match set.deliver(sender, receiver, payload) {
                    Ok(wake) => {
                        delivered += 1;
                        if wake {
                            to_wake[i] = Some(receiver);
                        }
                    }
                    Err(e) => {
                        klog::debug!("ipc: broadcast from {} skips {}: {}", sender, receiver, e);
                    }
                }
            }
        }
        for receiver in to_wake.into_iter().flatten() {
            parker.unpark(receiver);
        }
        delivered
    }

    /// Take the oldest message for `receiver`, if any.
    pub fn try_recv(&self, receiver: Pid) -> KResult<Option<Message>> {
        let slot = receiver.queue_index().ok_or(KernelError::InvalidArgument)?;
        Ok(self.inner.lock().queues[slot].pop())
    }

    /// Block until `receiver`'s queue is non-empty, then take its oldest
    /// message.
    pub fn recv<P: Parker>(&self, receiver: Pid, parker: &P) -> KResult<Message> {
        let slot = receiver.queue_index().ok_or(KernelError::InvalidArgument)?;
        loop {
            {
                let mut set = self.inner.lock();
                if let Some(msg) = set.queues[slot].pop() {
                    set.waiting[slot] = false;
                    return Ok(msg);
                }
                set.waiting[slot] = true;
            }
            parker.park(receiver);
        }
    }

    /// Number of messages queued for `pid` (0 for pids without a queue).
    pub fn len(&self, pid: Pid) -> usize {
        pid.queue_index()
            .map_or(0, |slot| self.inner.lock().queues[slot].len())
    }

    /// Copy of `pid`'s queue contents, oldest first.
    pub fn snapshot(&self, pid: Pid) -> Option<MsgQueue> {
        let slot = pid.queue_index()?;
        Some(self.inner.lock().queues[slot])
    }
}

impl Default for Mailboxes {
    fn default() -> Self {
        Self::new()
    }
}
