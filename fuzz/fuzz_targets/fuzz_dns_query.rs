//! Fuzz target: `dns::build_response`
//!
//! Feeds arbitrary datagrams to the captive-portal DNS spoofer and
//! asserts that it never panics and that any answer it produces echoes
//! the transaction id and fits the output buffer.
//!
//! cargo fuzz run fuzz_dns_query

#![no_main]

use std::net::Ipv4Addr;

use libfuzzer_sys::fuzz_target;
use streak::provisioning::dns::{ANSWER_LEN, HEADER_LEN, MAX_PACKET, build_response};

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_PACKET)];
    let mut out = [0u8; MAX_PACKET + ANSWER_LEN];

    if let Some(n) = build_response(data, Ipv4Addr::new(192, 168, 4, 1), &mut out) {
        assert!(n >= HEADER_LEN + ANSWER_LEN, "answer shorter than header + record");
        assert!(n <= data.len() + ANSWER_LEN, "answer grew past the question");
        assert_eq!(out[..2], data[..2], "transaction id not echoed");
        assert_eq!(out[n - 4..n], [192, 168, 4, 1]);
    }

    // A buffer one byte too small must be refused, not overrun.
    let mut tight = [0u8; HEADER_LEN + ANSWER_LEN - 1];
    let _ = build_response(data, Ipv4Addr::LOCALHOST, &mut tight);
});
