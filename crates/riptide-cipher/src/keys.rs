//! Key material and per-worker block cipher handles
//!
//! Every producer thread builds its own AES handle from the shared raw key
//! bytes, so the expensive keystream computation never contends on a shared
//! cipher context. The raw bytes live for the lifetime of the producer pool
//! and are wiped when the pool's shared state is dropped.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::counter::Block;
use crate::error::CipherError;

/// AES key lengths the engine can be instantiated with, in bytes.
pub const SUPPORTED_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

/// Raw key bytes shared read-only across the producer pool.
///
/// Zeroized on drop; a rekey drops the whole shared state and with it the
/// old key.
pub(crate) struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Copies the key, rejecting unsupported lengths up front so no partial
    /// context can ever exist with a key the cipher cannot use.
    pub(crate) fn new(key: &[u8]) -> Result<Self, CipherError> {
        if !SUPPORTED_KEY_LENGTHS.contains(&key.len()) {
            return Err(CipherError::UnsupportedKeyLength { len: key.len() });
        }
        Ok(Self { bytes: key.to_vec() })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// A private single-block AES encryptor, one per producer thread.
pub(crate) enum BlockCipher {
    Aes128(Box<Aes128>),
    Aes192(Box<Aes192>),
    Aes256(Box<Aes256>),
}

impl BlockCipher {
    /// Key schedule for the worker. The length was validated when the
    /// [`KeyMaterial`] was built, so a mismatch here is a bug.
    pub(crate) fn new(key: &[u8]) -> Result<Self, CipherError> {
        let invalid = |_| CipherError::UnsupportedKeyLength { len: key.len() };
        match key.len() {
            16 => Ok(Self::Aes128(Box::new(Aes128::new_from_slice(key).map_err(invalid)?))),
            24 => Ok(Self::Aes192(Box::new(Aes192::new_from_slice(key).map_err(invalid)?))),
            32 => Ok(Self::Aes256(Box::new(Aes256::new_from_slice(key).map_err(invalid)?))),
            len => Err(CipherError::UnsupportedKeyLength { len }),
        }
    }

    /// Encrypt one block in place. For CTR keystream generation the block
    /// holds the counter value and comes back as the keystream block.
    pub(crate) fn encrypt_block(&self, block: &mut Block) {
        let block = aes::Block::from_mut_slice(block.as_mut_slice());
        match self {
            Self::Aes128(cipher) => cipher.encrypt_block(block),
            Self::Aes192(cipher) => cipher.encrypt_block(block),
            Self::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_supported_key_lengths() {
        for len in SUPPORTED_KEY_LENGTHS {
            let key = vec![0x42u8; len];
            assert!(KeyMaterial::new(&key).is_ok());
            assert!(BlockCipher::new(&key).is_ok());
        }
    }

    #[test]
    fn rejects_unsupported_key_lengths() {
        for len in [0usize, 1, 15, 17, 20, 31, 33, 64] {
            let key = vec![0u8; len];
            assert!(matches!(
                KeyMaterial::new(&key),
                Err(CipherError::UnsupportedKeyLength { len: l }) if l == len
            ));
        }
    }

    #[test]
    fn encrypt_block_matches_fips197_vector() {
        // FIPS-197 appendix C.1: AES-128, key 000102...0f, input 00112233...ff
        let key: Vec<u8> = (0u8..16).collect();
        let cipher = BlockCipher::new(&key).unwrap();

        let mut block = [0u8; 16];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = (i as u8) * 0x11;
        }
        cipher.encrypt_block(&mut block);

        assert_eq!(hex::encode(block), "69c4e0d86a7b0430d8cdb78070b4c55a");
    }
}
