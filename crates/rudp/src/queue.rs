// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message records and FIFO queues
//!
//! The send queue, receive window, and send history are all
//! [`MessageQueue`]s. A record belongs to exactly one queue at a time; it is
//! created from pooled buffers and its buffer goes back to the pool when the
//! record is consumed.

use std::collections::VecDeque;

use crate::pool::BufferPool;

/// One application message (or a placeholder) in flight through the engine.
#[derive(Debug)]
pub(crate) struct Message {
    pub id: u16,
    /// Tick at which the message was submitted; drives history expiration.
    pub tick: u64,
    /// `None` marks a tombstone: an id slot the peer declared permanently
    /// lost. Tombstones occupy their position in the receive window but
    /// carry no payload.
    pub payload: Option<Vec<u8>>,
}

impl Message {
    pub fn new(id: u16, tick: u64, payload: &[u8], pool: &mut BufferPool) -> Self {
        Self {
            id,
            tick,
            payload: Some(pool.take(payload)),
        }
    }

    pub fn tombstone(id: u16) -> Self {
        Self {
            id,
            tick: 0,
            payload: None,
        }
    }

    /// Release the payload buffer back to the pool.
    pub fn recycle(self, pool: &mut BufferPool) {
        if let Some(buf) = self.payload {
            pool.put(buf);
        }
    }
}

/// FIFO of message records with an id-keyed head pop.
#[derive(Debug, Default)]
pub(crate) struct MessageQueue {
    inner: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.inner.push_back(msg);
    }

    /// Remove and return the head iff its id equals `id`.
    pub fn pop_front_if(&mut self, id: u16) -> Option<Message> {
        if self.inner.front()?.id != id {
            return None;
        }
        self.inner.pop_front()
    }

    /// Insert a record at `index`, shifting later records back.
    pub fn insert(&mut self, index: usize, msg: Message) {
        self.inner.insert(index, msg);
    }

    /// Splice all of `other`'s records onto the tail, preserving order.
    pub fn append(&mut self, other: &mut MessageQueue) {
        self.inner.append(&mut other.inner);
    }

    pub fn front(&self) -> Option<&Message> {
        self.inner.front()
    }

    pub fn pop_front(&mut self) -> Option<Message> {
        self.inner.pop_front()
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, Message> {
        self.inner.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.inner.get(index)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: u16) -> Message {
        Message {
            id,
            tick: 0,
            payload: Some(Vec::new()),
        }
    }

    #[test]
    fn test_pop_front_if_matches_head_only() {
        let mut q = MessageQueue::new();
        q.push(msg(3));
        q.push(msg(4));

        assert!(q.pop_front_if(4).is_none(), "head id is 3, not 4");
        assert_eq!(q.pop_front_if(3).expect("head matches").id, 3);
        assert_eq!(q.pop_front_if(4).expect("head matches").id, 4);
        assert!(q.pop_front_if(5).is_none(), "queue drained");
    }

    #[test]
    fn test_append_splices_in_order() {
        let mut history = MessageQueue::new();
        history.push(msg(0));
        let mut pending = MessageQueue::new();
        pending.push(msg(1));
        pending.push(msg(2));

        history.append(&mut pending);

        assert!(pending.is_empty());
        let ids: Vec<u16> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn test_insert_keeps_neighbors() {
        let mut q = MessageQueue::new();
        q.push(msg(1));
        q.push(msg(5));
        q.insert(1, msg(3));

        let ids: Vec<u16> = q.iter().map(|m| m.id).collect();
        assert_eq!(ids, [1, 3, 5]);
    }

    #[test]
    fn test_recycle_returns_buffer() {
        let mut pool = BufferPool::new();
        let m = Message::new(0, 0, &[1, 2, 3], &mut pool);
        assert_eq!(pool.len(), 0);
        m.recycle(&mut pool);
        assert_eq!(pool.len(), 1);

        Message::tombstone(7).recycle(&mut pool);
        assert_eq!(pool.len(), 1, "tombstones carry no buffer");
    }
}
