// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reusable payload buffer pool
//!
//! Every message payload lives in a `Vec<u8>` drawn from this freelist and
//! returned to it when the message is delivered or expires. The pool is
//! unbounded; callers bound memory by bounding outstanding messages.

/// Freelist of reclaimed payload buffers.
#[derive(Debug, Default)]
pub(crate) struct BufferPool {
    free: Vec<Vec<u8>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a buffer filled with a copy of `payload`, reusing a reclaimed
    /// allocation when one is available.
    pub fn take(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut buf = self.free.pop().unwrap_or_default();
        buf.clear();
        buf.extend_from_slice(payload);
        buf
    }

    /// Return a buffer to the freelist.
    pub fn put(&mut self, buf: Vec<u8>) {
        self.free.push(buf);
    }

    /// Number of buffers currently parked in the freelist.
    pub fn len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_roundtrip_reuses_allocation() {
        let mut pool = BufferPool::new();
        let buf = pool.take(&[1, 2, 3, 4]);
        assert_eq!(buf, [1, 2, 3, 4]);
        let cap = buf.capacity();
        let ptr = buf.as_ptr();

        pool.put(buf);
        assert_eq!(pool.len(), 1);

        let buf = pool.take(&[9]);
        assert_eq!(buf, [9]);
        assert_eq!(pool.len(), 0);
        assert!(buf.capacity() >= cap, "reclaimed capacity should be kept");
        assert_eq!(buf.as_ptr(), ptr, "allocation should be reused");
    }

    #[test]
    fn test_pool_empty_take_allocates() {
        let mut pool = BufferPool::new();
        assert_eq!(pool.len(), 0);
        let buf = pool.take(&[]);
        assert!(buf.is_empty());
    }
}
