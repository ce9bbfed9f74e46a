//! Producer pool sizing policy
//!
//! Measurement under bulk transfer showed keystream pregeneration
//! saturating around six workers — more threads stop helping and start
//! costing cache bandwidth — and that four queues per worker keeps producers
//! from idling while the consumer drains. The policy here reproduces those
//! numbers: half the logical CPUs (a quarter when SMT is active, since the
//! sibling threads share the AES units), floored at two and capped at six,
//! with the queue count a fixed 4× multiple.

use crate::error::CipherError;

/// Hard cap on producer threads.
pub const MAX_THREADS: usize = 6;

/// Hard cap on keystream queues.
pub const MAX_QUEUES: usize = MAX_THREADS * 4;

/// Safe minimum when the host is small or topology is unknown.
pub const MIN_THREADS: usize = 2;

/// Default blocks per queue (128 KiB of keystream per queue). Queues are
/// torn down on rekey and one must fill completely before any data flows,
/// so this should not grow much larger.
pub const DEFAULT_QUEUE_BLOCKS: usize = 8192;

/// Queues per producer thread.
const QUEUES_PER_THREAD: usize = 4;

/// Platform-derived thread and queue counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism {
    /// Producer threads to spawn.
    pub threads: usize,
    /// Keystream queues in the ring.
    pub queues: usize,
}

impl Parallelism {
    /// Size the pool from the host's CPU topology.
    pub fn detect() -> Self {
        let logical = num_cpus::get();
        let physical = num_cpus::get_physical();
        let smt = logical > physical;
        let sized = Self::from_topology(logical, smt);
        tracing::debug!(
            logical,
            physical,
            smt,
            threads = sized.threads,
            queues = sized.queues,
            "sized keystream producer pool"
        );
        sized
    }

    /// Pure sizing rule, split out so the policy is testable without
    /// depending on the machine running the tests.
    fn from_topology(logical_cpus: usize, smt: bool) -> Self {
        let divisor = if smt { 4 } else { 2 };
        let threads = (logical_cpus / divisor).clamp(MIN_THREADS, MAX_THREADS);
        let queues = (threads * QUEUES_PER_THREAD).min(MAX_QUEUES);
        Self { threads, queues }
    }
}

/// Engine geometry: thread count, ring size, and blocks per queue.
///
/// [`EngineConfig::auto`] applies the platform sizing policy; explicit
/// geometry (used heavily by tests to force ring rotations) is validated,
/// not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Producer threads.
    pub threads: usize,
    /// Queues in the ring; must be at least 2 so the consumer always has a
    /// distinct next queue to rotate onto.
    pub queues: usize,
    /// Keystream blocks per queue.
    pub queue_blocks: usize,
}

impl EngineConfig {
    /// Platform-sized configuration.
    pub fn auto() -> Self {
        let Parallelism { threads, queues } = Parallelism::detect();
        Self { threads, queues, queue_blocks: DEFAULT_QUEUE_BLOCKS }
    }

    pub(crate) fn validate(&self) -> Result<(), CipherError> {
        if self.threads == 0 {
            return Err(CipherError::InvalidGeometry {
                reason: "at least one producer thread is required".to_string(),
            });
        }
        if self.queues < 2 {
            return Err(CipherError::InvalidGeometry {
                reason: "the queue ring needs at least two queues".to_string(),
            });
        }
        if self.queue_blocks == 0 {
            return Err(CipherError::InvalidGeometry {
                reason: "queues must hold at least one block".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::auto()
    }
}
