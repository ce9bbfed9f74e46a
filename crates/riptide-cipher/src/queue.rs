//! Keystream queue state machine
//!
//! Each slot of the queue ring is a fixed-capacity batch of precomputed
//! keystream blocks plus a state tag, guarded by its own mutex/condvar pair
//! so producers working on different queues never contend.
//!
//! ```text
//!          (first producer, startup only)
//!   Init ────────────────────────────────► Draining
//!
//!   Empty ──claim──► Filling ──commit──► Full ──consumer──► Draining
//!     ▲                                                         │
//!     └──────────────────── consumer releases ──────────────────┘
//! ```
//!
//! Transitions are only reachable through the methods below, all of which
//! take the queue lock; the expensive work (AES fills, XOR draining) happens
//! with the lock released. Safe Rust gets the original lock-free fill by
//! moving the block buffer out of the slot while it is `Filling` or
//! `Draining` — the state tag then guarantees nobody else can even name it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use zeroize::Zeroize;

use crate::counter::{Block, Counter, BLOCK_LEN};
use crate::keys::BlockCipher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    /// Queue 0 before its one-time startup fill.
    Init,
    /// Consumed (or never filled); a producer may claim it.
    Empty,
    /// A producer owns the buffer and is computing keystream.
    Filling,
    /// Keystream ready; waiting for the consumer to rotate onto it.
    Full,
    /// The consumer owns the buffer and is XOR-ing it against data.
    Draining,
}

/// Guarded slot contents. The buffer is moved out (left empty) while the
/// state is `Filling` or `Draining`.
struct Slot {
    state: QueueState,
    counter: Counter,
    blocks: Vec<Block>,
}

/// Outcome of a producer's attempt to claim a queue.
pub(crate) enum Claim {
    /// The queue was empty; the caller now owns the fill.
    Granted(FillClaim),
    /// Another producer got there first (filling or already full); scan on.
    Busy,
    /// The stop flag was raised while waiting.
    Stopped,
}

/// Exclusive ownership of one fill pass: the counter to encrypt from and
/// the buffer to encrypt into. Publish the result with
/// [`KeystreamQueue::commit_full`].
pub(crate) struct FillClaim {
    pub(crate) counter: Counter,
    pub(crate) blocks: Vec<Block>,
}

/// One slot of the queue ring.
pub(crate) struct KeystreamQueue {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl KeystreamQueue {
    /// New queue seeded with its ring-offset counter. Queue 0 starts in
    /// `Init` and is filled by the designated first producer before the
    /// consumer is allowed to proceed; every other queue starts `Empty`.
    pub(crate) fn new(counter: Counter, queue_blocks: usize, first: bool) -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: if first { QueueState::Init } else { QueueState::Empty },
                counter,
                blocks: vec![[0u8; BLOCK_LEN]; queue_blocks],
            }),
            cond: Condvar::new(),
        }
    }

    /// The engine owns every thread that can touch a slot, so a poisoned
    /// lock carries no torn invariants worth propagating; recover the guard.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Slot>) -> MutexGuard<'a, Slot> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer scan step: claim this queue if it is empty.
    ///
    /// Blocks while the queue is `Draining` (or still `Init`), re-checking
    /// `stop` on every wakeup so shutdown can interrupt the wait. Several
    /// producers may wake together when the consumer releases a queue; the
    /// first to re-acquire the lock sees `Empty` and wins, the rest observe
    /// `Filling` and skip.
    pub(crate) fn begin_fill(&self, stop: &AtomicBool) -> Claim {
        let mut slot = self.lock();
        while matches!(slot.state, QueueState::Draining | QueueState::Init) {
            if stop.load(Ordering::Acquire) {
                return Claim::Stopped;
            }
            slot = self.wait(slot);
        }
        if stop.load(Ordering::Acquire) {
            return Claim::Stopped;
        }
        if slot.state != QueueState::Empty {
            return Claim::Busy;
        }
        slot.state = QueueState::Filling;
        let claim = FillClaim {
            counter: slot.counter,
            blocks: std::mem::take(&mut slot.blocks),
        };
        // Let scanning producers observe Filling and move on.
        self.cond.notify_all();
        Claim::Granted(claim)
    }

    /// Publish a completed fill and wake the consumer.
    ///
    /// The claim's counter must already be repositioned to the value this
    /// queue will need on its next fill, a full ring rotation ahead.
    pub(crate) fn commit_full(&self, claim: FillClaim) {
        let mut slot = self.lock();
        debug_assert_eq!(slot.state, QueueState::Filling);
        slot.counter = claim.counter;
        slot.blocks = claim.blocks;
        slot.state = QueueState::Full;
        self.cond.notify_all();
    }

    /// One-time startup fill of queue 0 by the first producer.
    ///
    /// Unlike the general scan this holds the lock across the whole fill:
    /// the consumer is blocked in [`wait_ready_take`](Self::wait_ready_take)
    /// until the queue leaves `Init`, and no data can flow before then.
    /// `ring_jump` is `(ring − 1) × queue_blocks`, positioning the counter
    /// for this queue's next pass.
    pub(crate) fn first_fill(&self, cipher: &BlockCipher, ring_jump: u64) {
        let mut slot = self.lock();
        if slot.state != QueueState::Init {
            return;
        }
        let mut counter = slot.counter;
        for block in &mut slot.blocks {
            *block = *counter.as_bytes();
            cipher.encrypt_block(block);
            counter.increment();
        }
        counter.add(ring_jump);
        slot.counter = counter;
        slot.state = QueueState::Draining;
        self.cond.notify_all();
    }

    /// Consumer startup: block until queue 0 leaves `Init`, then take its
    /// keystream. Guarantees the consumer never observes an uninitialized
    /// queue.
    pub(crate) fn wait_ready_take(&self) -> Vec<Block> {
        let mut slot = self.lock();
        while slot.state == QueueState::Init {
            slot = self.wait(slot);
        }
        debug_assert_eq!(slot.state, QueueState::Draining);
        std::mem::take(&mut slot.blocks)
    }

    /// Consumer rotation: wait until this queue is `Full`, mark it
    /// `Draining`, and take ownership of its keystream.
    ///
    /// This is the only point where the engine's caller can block.
    pub(crate) fn wait_full_take(&self) -> Vec<Block> {
        let mut slot = self.lock();
        while slot.state != QueueState::Full {
            slot = self.wait(slot);
        }
        slot.state = QueueState::Draining;
        let blocks = std::mem::take(&mut slot.blocks);
        self.cond.notify_all();
        blocks
    }

    /// Consumer hand-back: return the spent buffer to the queue it was
    /// drained from, mark it `Empty`, and wake producers waiting to refill.
    pub(crate) fn release_empty(&self, spent: Vec<Block>) {
        let mut slot = self.lock();
        debug_assert_eq!(slot.state, QueueState::Draining);
        slot.blocks = spent;
        slot.state = QueueState::Empty;
        self.cond.notify_all();
    }

    /// Wake every waiter so it can observe the stop flag. Taking the lock
    /// first closes the race against a producer that has checked the flag
    /// but not yet parked on the condvar.
    pub(crate) fn wake_all(&self) {
        let _slot = self.lock();
        self.cond.notify_all();
    }

    /// Wipe whatever keystream is parked in the slot. Teardown only; the
    /// producers must already be stopped.
    pub(crate) fn wipe(&self) {
        let mut slot = self.lock();
        slot.blocks.zeroize();
    }
}
