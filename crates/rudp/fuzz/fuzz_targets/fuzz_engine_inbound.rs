// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for the engine's inbound path
//!
//! Drives a full engine with arbitrary datagrams. Neither parsing, window
//! insertion, output assembly, nor delivery may panic on any input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rudp::{Config, Delivery, Engine, MAX_MESSAGE_SIZE};

fuzz_target!(|data: &[u8]| {
    let mut engine = Engine::new(Config {
        send_delay: 1,
        expired_time: 5,
        mtu: 128,
    });
    let mut out = vec![0u8; MAX_MESSAGE_SIZE];

    // Split the input into a handful of datagrams to exercise reassembly
    // across updates.
    for chunk in data.chunks(97) {
        let _ = engine.update(chunk, 1);
        loop {
            match engine.recv(&mut out) {
                Delivery::None => break,
                Delivery::Corrupt | Delivery::Gap | Delivery::Message(_) => {}
            }
        }
    }
});
