// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send history: the retransmission store
//!
//! Transmitted messages are retained here, ordered by send tick (and thus by
//! id, since both grow monotonically), until they age out. The whole pending
//! send queue is spliced onto the tail once per output cycle, so a message
//! that never reached an output cycle never enters history.
//!
//! Expiration is lazy: it runs at most once per `expired_time` ticks, and the
//! sweep threshold is the tick of the *previous* sweep rather than the
//! current tick. An entry therefore survives for at least one full
//! `expired_time` window after it was sent, which bounds memory without
//! discarding entries the peer may still request mid-flight.

use std::cmp::Ordering;

use crate::pool::BufferPool;
use crate::queue::{Message, MessageQueue};
use crate::seq::seq_cmp;

#[derive(Debug, Default)]
pub(crate) struct SendHistory {
    queue: MessageQueue,
}

impl SendHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splice the entire pending send queue onto the tail, preserving order.
    pub fn absorb(&mut self, pending: &mut MessageQueue) {
        self.queue.append(pending);
    }

    /// Drop every entry stamped before `tick`, returning buffers to the
    /// pool. Survivor order is preserved. Returns the number reclaimed.
    pub fn expire_before(&mut self, tick: u64, pool: &mut BufferPool) -> usize {
        let mut reclaimed = 0;
        while let Some(front) = self.queue.front() {
            if front.tick >= tick {
                break;
            }
            if let Some(msg) = self.queue.pop_front() {
                msg.recycle(pool);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.queue.get(index)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<u16> {
        self.queue.iter().map(|m| m.id).collect()
    }
}

/// Monotonic walk over the history while serving a batch of peer requests.
///
/// Requested ids arrive in the order the peer asked for them, and the
/// history is id-sorted, so a single forward cursor serves the whole batch;
/// it never rewinds, and a repeated id finds the same entry again.
#[derive(Debug, Default)]
pub(crate) struct ReplayCursor {
    index: usize,
}

/// Outcome of looking a requested id up in the history.
pub(crate) enum Replay<'a> {
    /// The stored message, ready to retransmit.
    Found(&'a Message),
    /// The id was never sent or has expired out of the history.
    Gone,
}

impl ReplayCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seek<'a>(&mut self, history: &'a SendHistory, id: u16) -> Replay<'a> {
        while let Some(entry) = history.get(self.index) {
            match seq_cmp(entry.id, id) {
                Ordering::Less => self.index += 1,
                Ordering::Equal => return Replay::Found(entry),
                Ordering::Greater => return Replay::Gone,
            }
        }
        Replay::Gone
    }
}
