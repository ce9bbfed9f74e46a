//! Cipher context lifecycle and the consumer-side transform
//!
//! `CtrEngine` is the drop-in symmetric cipher engine: construction installs
//! a key and per-direction initial counter, seeds the queue ring, and starts
//! the producer pool; `transform` XORs precomputed keystream against data on
//! the caller's thread; `rekey` tears the pool down and rebuilds it under
//! the new key; drop stops every producer and wipes key material and
//! keystream before releasing memory.
//!
//! The parallel engine must consume keystream block-for-block identical to a
//! single-threaded CTR walk from the same key and IV. Two rules enforce
//! this: every queue's counter is assigned deterministically (at ring seed
//! time, then re-derived after each fill), and only the consumer decides
//! rotation order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use zeroize::Zeroize;

use crate::counter::{Block, BLOCK_LEN};
use crate::error::CipherError;
use crate::keys::KeyMaterial;
use crate::producer::{self, Shared};
use crate::sizing::EngineConfig;

/// Consumer position within the ring: which queue is draining, how many of
/// its blocks are spent, and the drained queue's keystream itself (owned by
/// the consumer while draining, handed back on rotation).
struct Cursor {
    qidx: usize,
    ridx: usize,
    active: Vec<Block>,
}

/// Multi-threaded AES-CTR keystream engine.
///
/// Symmetric: the transform XORs keystream against its input, so the same
/// calls encrypt and decrypt. One consumer thread per engine; the type is
/// `Send` but the transform entry points take `&mut self` and are not meant
/// to be raced from multiple callers.
pub struct CtrEngine {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    config: EngineConfig,
    cursor: Cursor,
    engine_id: u64,
}

impl CtrEngine {
    /// Create an engine with platform-sized threads and queues.
    ///
    /// Fails fast on an unsupported key length or if any producer thread
    /// cannot be spawned — a partially provisioned pool silently changes
    /// throughput, so it is rejected outright.
    pub fn new(key: &[u8], iv: &[u8; BLOCK_LEN]) -> Result<Self, CipherError> {
        Self::with_config(key, iv, EngineConfig::auto())
    }

    /// Create an engine with explicit geometry.
    pub fn with_config(
        key: &[u8],
        iv: &[u8; BLOCK_LEN],
        config: EngineConfig,
    ) -> Result<Self, CipherError> {
        config.validate()?;
        let key = KeyMaterial::new(key)?;
        let engine_id = next_engine_id();

        let (shared, workers, active) = start_pool(key, *iv, &config, engine_id)?;

        Ok(Self {
            shared,
            workers,
            config,
            cursor: Cursor { qidx: 0, ridx: 0, active },
            engine_id,
        })
    }

    /// Encrypt or decrypt `src` into `dest`.
    ///
    /// Lengths must match and be a whole number of blocks; zero length is a
    /// no-op. May block briefly while producers catch up — the only
    /// blocking point visible to the caller.
    pub fn transform(&mut self, src: &[u8], dest: &mut [u8]) -> Result<(), CipherError> {
        if src.len() != dest.len() {
            return Err(CipherError::LengthMismatch { src: src.len(), dest: dest.len() });
        }
        dest.copy_from_slice(src);
        self.transform_in_place(dest)
    }

    /// Encrypt or decrypt a buffer in place.
    pub fn transform_in_place(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() % BLOCK_LEN != 0 {
            return Err(CipherError::UnalignedLength { len: data.len() });
        }

        for chunk in data.chunks_exact_mut(BLOCK_LEN) {
            let keystream = &self.cursor.active[self.cursor.ridx];
            for (byte, key_byte) in chunk.iter_mut().zip(keystream) {
                *byte ^= key_byte;
            }
            self.cursor.ridx += 1;
            if self.cursor.ridx == self.config.queue_blocks {
                self.rotate();
            }
        }
        Ok(())
    }

    /// Replace the key and IV on a running engine.
    ///
    /// The full producer pool is stopped and joined before any counter or
    /// key state changes — a stale producer must never write keystream under
    /// the old key into queues the consumer believes are under the new one.
    /// The old key and all old keystream are wiped before the new pool
    /// starts. An unsupported key length is rejected before the pool is
    /// touched and leaves the engine running under the old key; a spawn
    /// failure during the restart leaves it stopped, fit only for drop.
    pub fn rekey(&mut self, key: &[u8], iv: &[u8; BLOCK_LEN]) -> Result<(), CipherError> {
        let key = KeyMaterial::new(key)?;

        tracing::debug!(engine = self.engine_id, "rekey: stopping producer pool");
        stop_pool(&self.shared, &mut self.workers);
        self.wipe_keystream();

        let (shared, workers, active) = start_pool(key, *iv, &self.config, self.engine_id)?;

        // Dropping the old shared state zeroizes the old key.
        self.shared = shared;
        self.workers = workers;
        self.cursor = Cursor { qidx: 0, ridx: 0, active };
        tracing::debug!(engine = self.engine_id, "rekey: producer pool restarted");
        Ok(())
    }

    /// Geometry this engine is running with.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Consumer rotation: mark the next queue draining (waiting for it to
    /// fill if need be), then hand the spent queue back to the producers.
    /// The order matters — the next queue is secured before the old one is
    /// released, so producers always see a consistent window.
    fn rotate(&mut self) {
        let next = (self.cursor.qidx + 1) % self.shared.queues.len();
        let fresh = self.shared.queues[next].wait_full_take();
        let spent = std::mem::replace(&mut self.cursor.active, fresh);
        self.shared.queues[self.cursor.qidx].release_empty(spent);
        self.cursor.qidx = next;
        self.cursor.ridx = 0;
    }

    fn wipe_keystream(&mut self) {
        self.cursor.active.zeroize();
        for queue in &self.shared.queues {
            queue.wipe();
        }
    }
}

impl Drop for CtrEngine {
    fn drop(&mut self) {
        stop_pool(&self.shared, &mut self.workers);
        self.wipe_keystream();
        tracing::debug!(engine = self.engine_id, "cipher context torn down");
    }
}

/// Seed a fresh ring, spawn the pool, and wait for queue 0 to be filled.
///
/// Returns the shared state, the join handles, and queue 0's keystream with
/// the consumer cursor implicitly at (queue 0, block 0). If any spawn
/// fails, workers already running are stopped and joined before the error
/// is returned.
fn start_pool(
    key: KeyMaterial,
    iv: [u8; BLOCK_LEN],
    config: &EngineConfig,
    engine_id: u64,
) -> Result<(Arc<Shared>, Vec<JoinHandle<()>>, Vec<Block>), CipherError> {
    let shared = Arc::new(Shared {
        queues: producer::seed_queues(iv, config.queues, config.queue_blocks),
        key,
        stop: AtomicBool::new(false),
        queue_blocks: config.queue_blocks,
        engine_id,
    });

    let mut workers = Vec::with_capacity(config.threads);
    for worker in 0..config.threads {
        let worker_shared = Arc::clone(&shared);
        let spawned = std::thread::Builder::new()
            .name(format!("riptide-keygen-{worker}"))
            .spawn(move || producer::run(&worker_shared, worker));
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(source) => {
                tracing::error!(engine = engine_id, worker, %source, "producer spawn failed");
                stop_pool(&shared, &mut workers);
                return Err(CipherError::WorkerSpawn { worker, source });
            }
        }
    }
    tracing::debug!(
        engine = engine_id,
        threads = config.threads,
        queues = config.queues,
        "producer pool running"
    );

    // Block until the first producer moves queue 0 out of Init; the
    // consumer must never observe an uninitialized queue.
    let active = shared.queues[0].wait_ready_take();
    Ok((shared, workers, active))
}

/// Signal every producer to stop, wake any that are parked on a queue
/// condvar, and join them all. Idempotent: a drained worker list is a no-op.
/// Producers must be gone before key material or queue buffers are touched.
fn stop_pool(shared: &Shared, workers: &mut Vec<JoinHandle<()>>) {
    if workers.is_empty() {
        return;
    }
    shared.stop.store(true, Ordering::Release);
    for queue in &shared.queues {
        queue.wake_all();
    }
    for handle in workers.drain(..) {
        if handle.join().is_err() {
            tracing::error!(engine = shared.engine_id, "keystream producer panicked");
        }
    }
}

/// Process-wide context tag for log correlation.
fn next_engine_id() -> u64 {
    static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed)
}
