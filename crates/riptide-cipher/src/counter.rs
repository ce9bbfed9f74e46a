//! Big-endian block counter arithmetic
//!
//! CTR mode encrypts successive values of a fixed-width counter. The counter
//! is stored exactly as it goes into the block cipher: a 16-byte big-endian
//! integer (most significant byte first). Overflow wraps silently past the
//! most significant byte — the transport's own counter has the same width
//! and the keystream sequences must stay in lockstep, so the wrap is
//! protocol behavior and must not be widened.

/// Cipher block length in bytes (AES).
pub const BLOCK_LEN: usize = 16;

/// One keystream or data block.
pub type Block = [u8; BLOCK_LEN];

/// A block-width big-endian counter.
///
/// `Copy` on purpose: producers snapshot a queue's counter, advance their
/// private copy while filling, and publish the repositioned value in a
/// single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter([u8; BLOCK_LEN]);

impl Counter {
    /// Counter starting at the given initial value (the per-direction IV).
    pub fn new(iv: [u8; BLOCK_LEN]) -> Self {
        Self(iv)
    }

    /// Raw big-endian bytes, as fed to the block cipher.
    pub fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }

    /// Add 1, carrying leftward from the least significant byte.
    ///
    /// Wraps to all-zero after all-ones.
    pub fn increment(&mut self) {
        for byte in self.0.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                return;
            }
        }
    }

    /// Add `n`, carrying leftward from the least significant byte.
    ///
    /// Used to jump a queue's counter a whole ring rotation ahead after a
    /// fill pass, so each producer can reposition a queue without consulting
    /// any other thread. Carry past the most significant byte is discarded.
    pub fn add(&mut self, n: u64) {
        let mut num = n;
        let mut carry = 0u16;
        for byte in self.0.iter_mut().rev() {
            if num == 0 && carry == 0 {
                return;
            }
            let sum = u16::from(*byte) + u16::from((num & 0xff) as u8) + carry;
            *byte = (sum & 0xff) as u8;
            carry = sum >> 8;
            num >>= 8;
        }
    }
}
