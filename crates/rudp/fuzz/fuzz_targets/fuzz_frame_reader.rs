// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for the frame decoder
//!
//! Feeds arbitrary bytes to `FrameReader`. Decoding must never panic; at
//! worst it yields a `WireError` and fuses.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut total_payload = 0usize;
    for frame in rudp::wire::FrameReader::new(data) {
        match frame {
            Ok(rudp::wire::Frame::Data { payload, .. }) => total_payload += payload.len(),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    // Decoded payloads can never exceed the input.
    assert!(total_payload <= data.len());
});
