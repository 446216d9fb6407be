// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine façade: `send` / `recv` / `update`
//!
//! The engine is single-threaded and non-reentrant; it never blocks, spawns
//! nothing, and reads no clock. Time advances only through the tick delta
//! passed to [`Engine::update`], which drives frame extraction from the
//! inbound datagram, then the lazy history expiration sweep, then (when the
//! send cadence has elapsed) assembly of the outbound datagram chain.
//!
//! Retransmission is strictly peer-driven: the engine never resends on its
//! own timer. Request frames from the peer are queued in `send_again` and
//! answered on the next output cycle, either with the stored data frame or
//! with a Missing notice once the message has expired out of history. An
//! inbound heartbeat from an otherwise idle peer is converted into a probe
//! for the next id we expect, so the conversation can resynchronize without
//! a handshake.

use crate::config::Config;
use crate::history::{Replay, ReplayCursor, SendHistory};
use crate::packer::{Datagram, Packer};
use crate::pool::BufferPool;
use crate::queue::{Message, MessageQueue};
use crate::reassembly::RecvWindow;
use crate::seq::seq_next;
use crate::wire::{Frame, FrameReader, MAX_MESSAGE_SIZE, TAG_MISSING, TAG_REQUEST};

/// Result of one [`Engine::recv`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing deliverable yet (the next in-order message has not arrived).
    None,
    /// `n` payload bytes were copied into the output buffer. `n` may be 0
    /// for a genuine zero-length message.
    Message(usize),
    /// The next id slot was declared lost by the peer; it is skipped and
    /// will never be delivered.
    Gap,
    /// A corrupt inbound datagram (or a peer Corrupt notice) was seen since
    /// the last call. Reported exactly once per event, then cleared.
    Corrupt,
}

/// Reliable transport engine over an unreliable datagram substrate.
///
/// The host owns the socket and the clock: feed inbound datagrams and tick
/// deltas to [`update`](Self::update), transmit whatever it returns, submit
/// application messages with [`send`](Self::send), and drain in-order
/// deliveries with [`recv`](Self::recv).
///
/// # Example
///
/// ```
/// use rudp::{Config, Delivery, Engine};
///
/// let mut a = Engine::new(Config::default());
/// let mut b = Engine::new(Config::default());
///
/// a.send(b"hello");
/// let chain = a.update(&[], 1).expect("send cadence elapsed");
///
/// let mut out = [0u8; rudp::MAX_MESSAGE_SIZE];
/// for datagram in &chain {
///     b.update(datagram.as_bytes(), 1);
/// }
/// assert_eq!(b.recv(&mut out), Delivery::Message(5));
/// assert_eq!(&out[..5], b"hello");
/// ```
#[derive(Debug)]
pub struct Engine {
    send_delay: u64,
    expired_time: u64,

    pool: BufferPool,
    pending: MessageQueue,
    window: RecvWindow,
    history: SendHistory,
    packer: Packer,

    /// Ids the peer asked us to resend (plus synthetic heartbeat probes),
    /// in arrival order. Drained every output cycle.
    send_again: Vec<u16>,

    corrupt: bool,
    current_tick: u64,
    last_send_tick: u64,
    last_expired_tick: u64,
    next_send_id: u16,
}

impl Engine {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            send_delay: config.send_delay,
            expired_time: config.expired_time,
            pool: BufferPool::new(),
            pending: MessageQueue::new(),
            window: RecvWindow::new(),
            history: SendHistory::new(),
            packer: Packer::new(config.effective_mtu()),
            send_again: Vec::new(),
            corrupt: false,
            current_tick: 0,
            last_send_tick: 0,
            last_expired_tick: 0,
            next_send_id: 0,
        }
    }

    /// Queue an application message for transmission on the next output
    /// cycle.
    ///
    /// Payloads longer than [`MAX_MESSAGE_SIZE`] are dropped with a
    /// diagnostic; it is the caller's job to respect the ceiling.
    pub fn send(&mut self, payload: &[u8]) {
        if payload.len() > MAX_MESSAGE_SIZE {
            log::warn!(
                "[engine] dropping oversized send: {} > {} bytes",
                payload.len(),
                MAX_MESSAGE_SIZE
            );
            return;
        }
        let msg = Message::new(self.next_send_id, self.current_tick, payload, &mut self.pool);
        self.next_send_id = seq_next(self.next_send_id);
        self.pending.push(msg);
    }

    /// Pop the next in-order delivery, copying its payload into `out`.
    ///
    /// The copy is truncated (with a diagnostic) if `out` is shorter than
    /// the message; size `out` to [`MAX_MESSAGE_SIZE`] to never truncate.
    pub fn recv(&mut self, out: &mut [u8]) -> Delivery {
        if self.corrupt {
            self.corrupt = false;
            return Delivery::Corrupt;
        }
        let Some(msg) = self.window.pop_next() else {
            return Delivery::None;
        };
        match msg.payload {
            None => Delivery::Gap,
            Some(buf) => {
                let len = buf.len();
                if out.len() < len {
                    log::warn!(
                        "[engine] recv buffer too small ({} < {} bytes), truncating",
                        out.len(),
                        len
                    );
                }
                let copied = len.min(out.len());
                out[..copied].copy_from_slice(&buf[..copied]);
                self.pool.put(buf);
                Delivery::Message(len)
            }
        }
    }

    /// Advance the clock by `delta_tick`, digest one inbound datagram, and
    /// return the outbound datagram chain when the send cadence has elapsed.
    ///
    /// Pass an empty `inbound` slice when nothing was received. A returned
    /// chain is never empty (an idle cycle still emits a heartbeat); `None`
    /// means the cadence has not elapsed yet.
    pub fn update(&mut self, inbound: &[u8], delta_tick: u64) -> Option<Vec<Datagram>> {
        self.current_tick += delta_tick;

        self.extract(inbound);

        if self.current_tick >= self.last_expired_tick + self.expired_time {
            let threshold = self.last_expired_tick;
            let reclaimed = self.history.expire_before(threshold, &mut self.pool);
            if reclaimed > 0 {
                log::trace!(
                    "[engine] expired {} history entries older than tick {}, {} retained",
                    reclaimed,
                    threshold,
                    self.history.len()
                );
            }
            self.last_expired_tick = self.current_tick;
        }

        if self.current_tick >= self.last_send_tick + self.send_delay {
            self.last_send_tick = self.current_tick;
            Some(self.build_outbound())
        } else {
            None
        }
    }

    /// Number of payload buffers parked in the freelist.
    #[doc(hidden)]
    #[must_use]
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Parse one inbound datagram and dispatch its frames.
    fn extract(&mut self, inbound: &[u8]) {
        for frame in FrameReader::new(inbound) {
            match frame {
                Ok(Frame::Heartbeat) => {
                    // An idle peer is implicitly asking where we stand;
                    // probe for the next id we expect so its next cycle can
                    // answer with data or a Missing notice.
                    if self.send_again.is_empty() {
                        self.send_again.push(self.window.next_id());
                    }
                }
                Ok(Frame::Corrupt) => {
                    log::warn!("[engine] peer reported corruption");
                    self.corrupt = true;
                    return;
                }
                Ok(Frame::Request(id)) => self.send_again.push(id),
                Ok(Frame::Missing(id)) => self.window.insert(id, None, &mut self.pool),
                Ok(Frame::Data { id, payload }) => {
                    self.window.insert(id, Some(payload), &mut self.pool);
                }
                Err(err) => {
                    log::warn!("[engine] corrupt inbound datagram: {err}");
                    self.corrupt = true;
                    return;
                }
            }
        }
    }

    /// Assemble one output cycle:
    /// requests for our gaps, replies to the peer's requests, fresh sends,
    /// and a heartbeat when there was nothing else to say.
    fn build_outbound(&mut self) -> Vec<Datagram> {
        // Phase 1: request every id missing from the receive window.
        for id in self.window.missing_ids() {
            self.packer.push_control(TAG_REQUEST, id);
        }

        // Phase 2: answer the peer's retransmission requests from history.
        let requested = std::mem::take(&mut self.send_again);
        let mut cursor = ReplayCursor::new();
        for id in requested {
            match cursor.seek(&self.history, id) {
                Replay::Found(msg) => {
                    let payload = msg.payload.as_deref().unwrap_or_default();
                    self.packer.push_data(msg.id, payload);
                }
                Replay::Gone => self.packer.push_control(TAG_MISSING, id),
            }
        }

        // Phase 3: first transmission of queued sends, then move them into
        // history in one splice. Messages only enter history once they have
        // actually been through an output cycle.
        for msg in self.pending.iter() {
            let payload = msg.payload.as_deref().unwrap_or_default();
            self.packer.push_data(msg.id, payload);
        }
        self.history.absorb(&mut self.pending);

        // Phase 4 + flush: heartbeat fallback and final seal.
        self.packer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine() -> Engine {
        Engine::new(Config {
            send_delay: 1,
            expired_time: 5,
            mtu: 128,
        })
    }

    fn bytes(chain: &[Datagram]) -> Vec<Vec<u8>> {
        chain.iter().map(|d| d.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_idle_update_sends_heartbeat() {
        let mut engine = test_engine();
        let chain = engine.update(&[], 1).expect("cadence elapsed");
        assert_eq!(bytes(&chain), [vec![0]]);
    }

    #[test]
    fn test_update_respects_send_cadence() {
        let mut engine = Engine::new(Config {
            send_delay: 3,
            expired_time: 5,
            mtu: 128,
        });
        assert!(engine.update(&[], 1).is_none());
        assert!(engine.update(&[], 1).is_none());
        assert!(engine.update(&[], 1).is_some(), "three ticks accumulated");
        assert!(engine.update(&[], 0).is_none(), "cadence restarts");
    }

    #[test]
    fn test_oversized_send_dropped() {
        let mut engine = test_engine();
        engine.send(&vec![0u8; MAX_MESSAGE_SIZE + 1]);
        let chain = engine.update(&[], 1).expect("cadence elapsed");
        assert_eq!(bytes(&chain), [vec![0]], "only the heartbeat goes out");
    }

    #[test]
    fn test_max_size_send_accepted() {
        let mut engine = test_engine();
        engine.send(&vec![0u8; MAX_MESSAGE_SIZE]);
        let chain = engine.update(&[], 1).expect("cadence elapsed");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].len(), 4 + MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_recv_empty_engine() {
        let mut engine = test_engine();
        let mut out = [0u8; 16];
        assert_eq!(engine.recv(&mut out), Delivery::None);
    }

    #[test]
    fn test_corrupt_reported_once() {
        let mut engine = test_engine();
        engine.update(&[1, 0, 0, 0], 0); // Corrupt frame, trailing junk ignored
        let mut out = [0u8; 16];
        assert_eq!(engine.recv(&mut out), Delivery::Corrupt);
        assert_eq!(engine.recv(&mut out), Delivery::None);
    }

    #[test]
    fn test_truncated_frame_latches_corrupt() {
        let mut engine = test_engine();
        engine.update(&[2, 0], 0); // Request frame cut before its id
        let mut out = [0u8; 16];
        assert_eq!(engine.recv(&mut out), Delivery::Corrupt);
    }

    #[test]
    fn test_zero_length_send_roundtrip() {
        let mut a = test_engine();
        let mut b = test_engine();

        a.send(&[]);
        let chain = a.update(&[], 1).expect("cadence elapsed");
        assert_eq!(bytes(&chain), [vec![4, 0, 0]], "tag 4 is a zero-length data frame");

        b.update(chain[0].as_bytes(), 1);
        let mut out = [0u8; 16];
        assert_eq!(b.recv(&mut out), Delivery::Message(0));
    }

    #[test]
    fn test_recv_truncates_into_short_buffer() {
        let mut a = test_engine();
        let mut b = test_engine();

        a.send(&[1, 2, 3, 4, 5, 6]);
        let chain = a.update(&[], 1).expect("cadence elapsed");
        b.update(chain[0].as_bytes(), 1);

        let mut out = [0u8; 4];
        assert_eq!(b.recv(&mut out), Delivery::Message(6), "true length reported");
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_heartbeat_probe_answered_with_missing() {
        let mut engine = test_engine();
        // Peer heartbeat while we have sent nothing: the probe for id 0
        // finds no history entry, so the reply is a Missing notice.
        let chain = engine.update(&[0], 1).expect("cadence elapsed");
        assert_eq!(bytes(&chain), [vec![3, 0, 0]]);
    }

    #[test]
    fn test_delivered_buffers_return_to_pool() {
        let mut a = test_engine();
        let mut b = test_engine();

        a.send(&[1, 2, 3]);
        let chain = a.update(&[], 1).expect("cadence elapsed");
        b.update(chain[0].as_bytes(), 1);

        let mut out = [0u8; 16];
        assert_eq!(b.recv(&mut out), Delivery::Message(3));
        assert_eq!(b.pool_len(), 1, "delivered payload buffer is reclaimed");
    }

    #[test]
    fn test_history_expiration_reclaims_buffers() {
        let mut engine = test_engine();
        engine.send(&[1]);
        engine.update(&[], 1); // transmitted, spliced into history

        // First sweep runs at tick 5 with threshold 0 (keeps everything);
        // the next, at tick 10, sweeps entries older than tick 5.
        engine.update(&[], 4);
        assert_eq!(engine.pool_len(), 0);
        engine.update(&[], 5);
        assert_eq!(engine.pool_len(), 1, "expired entry returned its buffer");
    }
}
