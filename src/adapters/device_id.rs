//! Device identity derived from the factory MAC address.
//!
//! - `mac_string`: `AA:BB:CC:DD:EE:FF`, sent in every webhook payload.
//! - `claim_code`: 10 characters from a 32-symbol alphabet without the
//!   look-alikes `0 O 1 I`.  The user types it into the companion app to
//!   bind the device to an account.  Pure function of the MAC, recomputed
//!   every boot and never stored.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

pub type ClaimCode = heapless::String<CLAIM_CODE_LEN>;

pub const CLAIM_CODE_LEN: usize = 10;
pub const CLAIM_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Read the factory (WiFi station) MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Colon-separated uppercase hex.
pub fn mac_string(mac: &MacAddress) -> heapless::String<17> {
    let mut s = heapless::String::new();
    let _ = write!(
        s,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}

/// Derive the claim code.
///
/// A 31-multiplier string hash over the 12 uppercase hex digits of the
/// MAC, mixed with each MAC byte shifted by 4 bits per position, then
/// emitted base-32, least significant symbol first.
pub fn claim_code(mac: &MacAddress) -> ClaimCode {
    let mut hex = heapless::String::<12>::new();
    for b in mac {
        let _ = write!(hex, "{:02X}", b);
    }

    let mut hash = hex
        .bytes()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(u32::from(c)));
    for (i, b) in mac.iter().enumerate() {
        hash ^= u32::from(*b) << (i * 4);
    }

    let mut code = ClaimCode::new();
    for _ in 0..CLAIM_CODE_LEN {
        let _ = code.push(char::from(CLAIM_ALPHABET[(hash % 32) as usize]));
        hash /= 32;
    }
    code
}
