//! Fuzz target: `http::parse_request`
//!
//! Drives arbitrary bytes into the portal's request parser and asserts
//! that it never panics and never yields a body above the size limit.
//!
//! cargo fuzz run fuzz_http_request

#![no_main]

use libfuzzer_sys::fuzz_target;
use streak::provisioning::http::{MAX_BODY, parse_request};

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = parse_request(data) {
        assert!(req.body.len() <= MAX_BODY, "body exceeds MAX_BODY");
        assert!(req.path.starts_with('/'), "target must be origin-form");
        assert!(!req.method.is_empty());
    }
});
