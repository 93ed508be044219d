//! Wire protocol for Pulselink.
//!
//! Defines the packet frame format and the link-health state machine driven
//! by decoded frames.
//!
//! ## Frame Format
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Unique ID (4) │ Lifesign (2) │ Data Length (2) │ Payload (N) │
//! ├──────────────────────────────────────────────────────────────┤
//! │                          CRC-32 (4)                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian, the frame is tightly packed, and the
//! CRC-32 (IEEE 802.3) covers the header and payload (the first 8+N bytes).
//! The over-the-wire bytes are the contract; serialization is explicit
//! field-by-field and never relies on in-memory struct layout.

mod link;
mod packet;

pub use link::{LinkMonitor, LinkStatus};
pub use packet::{Frame, RxPacket, TxPacket};

/// Header size in bytes (unique_id + lifesign + data_length).
pub const HEADER_SIZE: usize = 8;

/// Footer size in bytes (crc32).
pub const FOOTER_SIZE: usize = 4;

/// Fixed per-frame overhead (header + footer).
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;

/// Maximum payload size in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Maximum encoded frame size.
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

/// Calculate the IEEE 802.3 CRC-32 of `data`.
///
/// Polynomial 0xEDB88320 (reflected), initial value 0xFFFFFFFF, final XOR
/// 0xFFFFFFFF.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    // IEEE 802.3 reference vectors.
    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(b""), 0x00000000);
    }

    #[test]
    fn test_crc32_single_byte() {
        assert_eq!(crc32(b"a"), 0xE8B7BE43);
    }

    #[test]
    fn test_crc32_check_string() {
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }
}
