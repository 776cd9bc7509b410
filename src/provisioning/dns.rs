//! Captive DNS responder.
//!
//! Every query, whatever the name or type, is answered with a single A
//! record pointing at the soft-AP.  Client OSes resolve their
//! connectivity-check hosts to us, hit the portal and pop up the sign-in
//! sheet.
//!
//! ## Response layout
//!
//! ```text
//!   ┌──────────┬────────┬─────────┬─────────┬─────────┬─────────┐
//!   │ ID (echo)│ 81 80  │ QDCOUNT │ AN = 1  │ NS = 0  │ AR = 0  │   header
//!   ├──────────┴────────┴─────────┴─────────┴─────────┴─────────┤
//!   │ question section, byte-for-byte from the query             │
//!   ├────────────────────────────────────────────────────────────┤
//!   │ C0 0C │ 00 01 │ 00 01 │ TTL = 60 │ 00 04 │ a.b.c.d         │   answer
//!   └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything after the question section (EDNS OPT records and the like) is
//! not echoed.

use std::net::{Ipv4Addr, UdpSocket};

use async_io_mini::Async;
use log::{debug, info, warn};

/// Fixed DNS header size.
pub const HEADER_LEN: usize = 12;
/// Classic UDP DNS message limit.
pub const MAX_PACKET: usize = 512;
/// Bytes appended for the A record.
pub const ANSWER_LEN: usize = 16;

const TTL_SECS: u32 = 60;
const FLAGS_RESPONSE: [u8; 2] = [0x81, 0x80];
/// Compression pointer to the first question name at offset 12.
const NAME_POINTER: [u8; 2] = [0xC0, 0x0C];
const TYPE_A: [u8; 2] = [0x00, 0x01];
const CLASS_IN: [u8; 2] = [0x00, 0x01];

/// End offset of the question section, or `None` if it runs past the
/// datagram.
fn question_end(query: &[u8], qdcount: u16) -> Option<usize> {
    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        loop {
            let len = *query.get(pos)?;
            if len == 0 {
                pos += 1;
                break;
            }
            if len & 0xC0 == 0xC0 {
                // Compressed tail: two-byte pointer ends the name.
                pos += 2;
                break;
            }
            pos += 1 + usize::from(len);
        }
        // QTYPE + QCLASS
        pos += 4;
        if pos > query.len() {
            return None;
        }
    }
    Some(pos)
}

/// Build the spoofed answer for `query` into `out`.
///
/// Returns the response length, or `None` when the datagram must be
/// dropped (shorter than a header, no question, truncated question, or
/// `out` too small).
pub fn build_response(query: &[u8], addr: Ipv4Addr, out: &mut [u8]) -> Option<usize> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if qdcount == 0 {
        return None;
    }
    let qend = question_end(query, qdcount)?;
    let total = qend + ANSWER_LEN;
    if out.len() < total {
        return None;
    }

    out[..qend].copy_from_slice(&query[..qend]);
    out[2..4].copy_from_slice(&FLAGS_RESPONSE);
    out[6..8].copy_from_slice(&1u16.to_be_bytes());
    out[8..12].fill(0);

    let answer = &mut out[qend..total];
    answer[0..2].copy_from_slice(&NAME_POINTER);
    answer[2..4].copy_from_slice(&TYPE_A);
    answer[4..6].copy_from_slice(&CLASS_IN);
    answer[6..10].copy_from_slice(&TTL_SECS.to_be_bytes());
    answer[10..12].copy_from_slice(&4u16.to_be_bytes());
    answer[12..16].copy_from_slice(&addr.octets());

    Some(total)
}

/// Answer queries on `socket` until the task is dropped.
pub async fn serve(socket: Async<UdpSocket>, addr: Ipv4Addr) {
    info!("DNS: redirecting all queries to {}", addr);
    let mut query = [0u8; MAX_PACKET];
    let mut response = [0u8; MAX_PACKET + ANSWER_LEN];

    loop {
        let (len, peer) = match socket.read_with(|s| s.recv_from(&mut query)).await {
            Ok(r) => r,
            Err(e) => {
                warn!("DNS: recv failed ({})", e);
                continue;
            }
        };

        let Some(n) = build_response(&query[..len], addr, &mut response) else {
            debug!("DNS: dropped {}-byte datagram from {}", len, peer);
            continue;
        };

        if let Err(e) = socket.write_with(|s| s.send_to(&response[..n], peer)).await {
            warn!("DNS: send to {} failed ({})", peer, e);
        }
    }
}
