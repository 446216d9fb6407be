// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive window: out-of-order insertion and in-order draining
//!
//! Inbound data frames land here in whatever order the network delivers
//! them. The window keeps them sorted by id (wrap-aware), suppresses
//! duplicates, drops ids that fall below the delivery floor, and hands
//! messages back out strictly in id order. Gaps between buffered ids are
//! what the output packer turns into Request frames; an id the peer has
//! declared lost occupies its slot as a tombstone so it is never requested
//! again.

use std::cmp::Ordering;

use crate::pool::BufferPool;
use crate::queue::{Message, MessageQueue};
use crate::seq::{seq_cmp, seq_next};

/// Ordered buffer of received (or tombstoned) messages awaiting delivery.
///
/// Invariant: entries are strictly id-increasing under the wrap-aware
/// comparator, and every entry id is at or above `next_id`.
#[derive(Debug, Default)]
pub(crate) struct RecvWindow {
    queue: MessageQueue,
    /// Next id to deliver; everything below has already been handed out.
    next_id: u16,
    /// Highest id ever buffered; inserts above it append in O(1).
    max_id: u16,
}

impl RecvWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id the application is waiting for.
    pub fn next_id(&self) -> u16 {
        self.next_id
    }

    /// Insert a received payload, or a tombstone when `payload` is `None`.
    ///
    /// Stale ids (below the delivery floor) and duplicates are dropped;
    /// everything else is spliced in at its id position.
    pub fn insert(&mut self, id: u16, payload: Option<&[u8]>, pool: &mut BufferPool) {
        if seq_cmp(id, self.next_id) == Ordering::Less {
            log::debug!(
                "[reassembly] dropping stale id {} (delivery floor is {})",
                id,
                self.next_id
            );
            return;
        }

        if self.queue.is_empty() || seq_cmp(id, self.max_id) == Ordering::Greater {
            self.queue.push(make_entry(id, payload, pool));
            self.max_id = id;
            return;
        }

        let mut slot = None;
        for (index, entry) in self.queue.iter().enumerate() {
            match seq_cmp(entry.id, id) {
                Ordering::Greater => {
                    slot = Some(index);
                    break;
                }
                Ordering::Equal => {
                    log::trace!("[reassembly] dropping duplicate id {}", id);
                    return;
                }
                Ordering::Less => {}
            }
        }

        match slot {
            Some(index) => self.queue.insert(index, make_entry(id, payload, pool)),
            None => {
                // Unreachable: id <= max_id means some buffered entry is >= id.
                log::error!(
                    "[reassembly] BUG: no slot found for id {} <= max {}",
                    id,
                    self.max_id
                );
                debug_assert!(false, "insert scan fell off the end");
            }
        }
    }

    /// Pop the head iff it is the next in-order id, advancing the floor.
    pub fn pop_next(&mut self) -> Option<Message> {
        let msg = self.queue.pop_front_if(self.next_id)?;
        self.next_id = seq_next(self.next_id);
        Some(msg)
    }

    /// Ids between the delivery floor and the buffered entries that have not
    /// arrived, in ascending order. Tombstones count as present.
    pub fn missing_ids(&self) -> MissingIds<'_> {
        MissingIds {
            entries: self.queue.iter(),
            cursor: self.next_id,
            bound: None,
        }
    }

    #[cfg(test)]
    pub fn buffered_ids(&self) -> Vec<u16> {
        self.queue.iter().map(|m| m.id).collect()
    }
}

fn make_entry(id: u16, payload: Option<&[u8]>, pool: &mut BufferPool) -> Message {
    match payload {
        Some(bytes) => Message::new(id, 0, bytes, pool),
        None => Message::tombstone(id),
    }
}

/// Iterator over the gap ids of a [`RecvWindow`].
pub(crate) struct MissingIds<'a> {
    entries: std::collections::vec_deque::Iter<'a, Message>,
    cursor: u16,
    bound: Option<u16>,
}

impl Iterator for MissingIds<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        loop {
            if let Some(bound) = self.bound {
                if seq_cmp(self.cursor, bound) == Ordering::Less {
                    let id = self.cursor;
                    self.cursor = seq_next(id);
                    return Some(id);
                }
                self.bound = None;
                self.cursor = seq_next(bound);
            }
            let entry = self.entries.next()?;
            self.bound = Some(entry.id);
        }
    }
}
