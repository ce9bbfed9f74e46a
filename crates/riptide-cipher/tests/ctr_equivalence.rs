//! Equivalence of the parallel engine with single-threaded CTR
//!
//! The contract under test: for any key, IV, and block-aligned length, the
//! engine's output is byte-for-byte what a serial CTR walk produces —
//! pregeneration must never reorder, skip, or duplicate a keystream block,
//! across any number of ring rotations.
//!
//! The reference is the `ctr` crate, an implementation the engine shares no
//! code with.

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use ctr::Ctr128BE;
use proptest::prelude::*;
use riptide_cipher::{CtrEngine, EngineConfig};

/// Independent serial AES-CTR reference.
fn serial_ctr(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    match key.len() {
        16 => Ctr128BE::<Aes128>::new_from_slices(key, iv).unwrap().apply_keystream(&mut out),
        24 => Ctr128BE::<Aes192>::new_from_slices(key, iv).unwrap().apply_keystream(&mut out),
        32 => Ctr128BE::<Aes256>::new_from_slices(key, iv).unwrap().apply_keystream(&mut out),
        len => unreachable!("unsupported test key length {len}"),
    }
    out
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[test]
fn pinned_scenario_zero_key_two_by_four_ring() {
    // 128-bit all-zero key, all-zero IV, ring of 2 queues x 4 blocks,
    // 20 zero plaintext blocks: the ciphertext is AES(key, 0..20)
    // concatenated, since keystream XOR zero = keystream.
    let key = [0u8; 16];
    let iv = [0u8; 16];
    let config = EngineConfig { threads: 2, queues: 2, queue_blocks: 4 };

    let mut engine = CtrEngine::with_config(&key, &iv, config).unwrap();
    let mut data = vec![0u8; 20 * 16];
    engine.transform_in_place(&mut data).unwrap();

    let cipher = Aes128::new_from_slice(&key).unwrap();
    let mut expected = Vec::with_capacity(20 * 16);
    for i in 0..20u128 {
        let mut block = aes::Block::from(i.to_be_bytes());
        cipher.encrypt_block(&mut block);
        expected.extend_from_slice(&block);
    }

    assert_eq!(data, expected);
}

#[test]
fn matches_serial_ctr_across_many_rotations_all_key_sizes() {
    let iv = [0x5au8; 16];
    let config = EngineConfig { threads: 2, queues: 3, queue_blocks: 4 };
    // 12 blocks per rotation; run 10 rotations worth.
    let plaintext = patterned(120 * 16);

    for key_len in [16usize, 24, 32] {
        let key: Vec<u8> = (0..key_len).map(|i| (i * 7 + 3) as u8).collect();

        let mut engine = CtrEngine::with_config(&key, &iv, config).unwrap();
        let mut data = plaintext.clone();
        engine.transform_in_place(&mut data).unwrap();

        assert_eq!(data, serial_ctr(&key, &iv, &plaintext), "key length {key_len}");
    }
}

#[test]
fn counter_wraparound_matches_serial_ctr() {
    // IV three blocks below the counter ceiling: the sequence wraps through
    // zero mid-stream and must keep matching the reference, which wraps at
    // the same 128-bit width.
    let key = [0x31u8; 16];
    let iv = (u128::MAX - 2).to_be_bytes();
    let config = EngineConfig { threads: 2, queues: 2, queue_blocks: 2 };
    let plaintext = patterned(24 * 16);

    let mut engine = CtrEngine::with_config(&key, &iv, config).unwrap();
    let mut data = plaintext.clone();
    engine.transform_in_place(&mut data).unwrap();

    assert_eq!(data, serial_ctr(&key, &iv, &plaintext));
}

#[test]
fn chunked_and_whole_consumption_agree() {
    // Keystream position is engine state, not call state: any chunking of
    // the same stream must see the same keystream.
    let key = [9u8; 24];
    let iv = [1u8; 16];
    let config = EngineConfig { threads: 2, queues: 2, queue_blocks: 4 };
    let plaintext = patterned(40 * 16);

    let mut whole = CtrEngine::with_config(&key, &iv, config).unwrap();
    let mut expected = plaintext.clone();
    whole.transform_in_place(&mut expected).unwrap();

    let mut chunked = CtrEngine::with_config(&key, &iv, config).unwrap();
    let mut data = plaintext.clone();
    let mut offset = 0;
    // Uneven block-aligned chunks, crossing queue boundaries.
    for chunk_blocks in [1usize, 3, 7, 2, 11, 4, 1, 8, 3] {
        let len = chunk_blocks * 16;
        chunked.transform_in_place(&mut data[offset..offset + len]).unwrap();
        offset += len;
    }
    chunked.transform_in_place(&mut data[offset..]).unwrap();

    assert_eq!(data, expected);
}

#[test]
fn split_buffer_transform_matches_in_place() {
    let key = [3u8; 32];
    let iv = [8u8; 16];
    let config = EngineConfig { threads: 1, queues: 2, queue_blocks: 3 };
    let plaintext = patterned(9 * 16);

    let mut by_copy = CtrEngine::with_config(&key, &iv, config).unwrap();
    let mut dest = vec![0u8; plaintext.len()];
    by_copy.transform(&plaintext, &mut dest).unwrap();

    let mut in_place = CtrEngine::with_config(&key, &iv, config).unwrap();
    let mut data = plaintext.clone();
    in_place.transform_in_place(&mut data).unwrap();

    assert_eq!(dest, data);
    assert_eq!(dest, serial_ctr(&key, &iv, &plaintext));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_engine_matches_serial_ctr(
        key_bytes in any::<[u8; 32]>(),
        key_len in prop::sample::select(vec![16usize, 24, 32]),
        iv in any::<[u8; 16]>(),
        data in prop::collection::vec(any::<u8>(), 0..768),
        threads in 1usize..=3,
        queues in 2usize..=4,
        queue_blocks in 1usize..=5,
    ) {
        let key = &key_bytes[..key_len];
        let config = EngineConfig { threads, queues, queue_blocks };

        let aligned_len = data.len() - data.len() % 16;
        let plaintext = &data[..aligned_len];

        let mut engine = CtrEngine::with_config(key, &iv, config).unwrap();
        let mut out = plaintext.to_vec();
        engine.transform_in_place(&mut out).unwrap();

        prop_assert_eq!(out, serial_ctr(key, &iv, plaintext));
    }

    #[test]
    fn prop_transform_round_trips(
        key_bytes in any::<[u8; 32]>(),
        iv in any::<[u8; 16]>(),
        blocks in 0usize..48,
    ) {
        let config = EngineConfig { threads: 2, queues: 3, queue_blocks: 2 };
        let plaintext = patterned(blocks * 16);

        let mut enc = CtrEngine::with_config(&key_bytes, &iv, config).unwrap();
        let mut dec = CtrEngine::with_config(&key_bytes, &iv, config).unwrap();

        let mut data = plaintext.clone();
        enc.transform_in_place(&mut data).unwrap();
        dec.transform_in_place(&mut data).unwrap();

        prop_assert_eq!(data, plaintext);
    }
}
