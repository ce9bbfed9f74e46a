//! Keystream producer loop
//!
//! Each worker owns a private AES handle keyed identically to the context
//! and walks the queue ring looking for empty queues to fill. Keystream for
//! a block is `AES(counter)`; the counter each queue encrypts from was fixed
//! when the ring was seeded and is re-derived deterministically after every
//! fill, so contention is only ever about *when* a queue is filled, never
//! about *which* keystream it holds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::counter::Counter;
use crate::keys::{BlockCipher, KeyMaterial};
use crate::queue::{Claim, FillClaim, KeystreamQueue};

/// State shared between the engine and its producer pool.
pub(crate) struct Shared {
    /// The queue ring; fixed size for the lifetime of the pool.
    pub(crate) queues: Vec<KeystreamQueue>,
    /// Raw key bytes, read-only while the pool runs.
    pub(crate) key: KeyMaterial,
    /// Cooperative cancellation flag, checked at every loop head and on
    /// every condvar wakeup.
    pub(crate) stop: AtomicBool,
    /// Blocks per queue.
    pub(crate) queue_blocks: usize,
    /// Context tag for log correlation.
    pub(crate) engine_id: u64,
}

impl Shared {
    /// Counter distance a queue jumps after a fill pass so that it is
    /// positioned for its next pass, one ring rotation later: the fill
    /// itself advanced `queue_blocks`, the remaining `ring − 1` queues cover
    /// the rest.
    fn ring_jump(&self) -> u64 {
        ((self.queues.len() - 1) * self.queue_blocks) as u64
    }
}

/// The life of a producer: the designated first worker (index 0) fills
/// queue 0 so the consumer has keystream before any data flows, then every
/// worker scans the ring from index 1, circularly, forever — skipping busy
/// queues, filling empty ones, and parking on draining ones until the
/// consumer hands them back or shutdown is signaled.
pub(crate) fn run(shared: &Arc<Shared>, worker: usize) {
    let Ok(cipher) = BlockCipher::new(shared.key.bytes()) else {
        // Key length was validated before the pool was spawned.
        unreachable!("producer spawned with unsupported key length");
    };

    tracing::debug!(engine = shared.engine_id, worker, "keystream producer started");

    if worker == 0 {
        shared.queues[0].first_fill(&cipher, shared.ring_jump());
    }

    let ring = shared.queues.len();
    let mut qidx = 1 % ring;
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        match shared.queues[qidx].begin_fill(&shared.stop) {
            Claim::Stopped => break,
            Claim::Busy => {}
            Claim::Granted(mut claim) => {
                // Lock released: the expensive part runs in parallel with
                // every other queue's fill and the consumer's XOR.
                fill(&cipher, &mut claim);
                claim.counter.add(shared.ring_jump());
                shared.queues[qidx].commit_full(claim);
            }
        }

        qidx = (qidx + 1) % ring;
    }

    tracing::debug!(engine = shared.engine_id, worker, "keystream producer stopped");
}

/// Encrypt successive counter values into the claimed buffer.
fn fill(cipher: &BlockCipher, claim: &mut FillClaim) {
    let FillClaim { counter, blocks } = claim;
    for block in blocks.iter_mut() {
        *block = *counter.as_bytes();
        cipher.encrypt_block(block);
        counter.increment();
    }
}

/// Seed the queue ring for a fresh key/IV installation: queue 0 carries the
/// IV itself (and starts in `Init`), queue `i` carries IV + `i × queue_blocks`.
pub(crate) fn seed_queues(iv: [u8; crate::counter::BLOCK_LEN], queues: usize, queue_blocks: usize) -> Vec<KeystreamQueue> {
    (0..queues)
        .map(|i| {
            let mut counter = Counter::new(iv);
            counter.add((i * queue_blocks) as u64);
            KeystreamQueue::new(counter, queue_blocks, i == 0)
        })
        .collect()
}
