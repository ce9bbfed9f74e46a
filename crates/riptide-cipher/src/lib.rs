//! Riptide multi-threaded CTR cipher engine
//!
//! Bulk encryption in the Riptide transport is CTR mode over AES, and the
//! expensive part — encrypting successive counter values — does not depend
//! on the data at all. This crate exploits that: a pool of producer threads
//! pregenerates keystream into a fixed ring of queues, running ahead of the
//! connection, while the caller's thread only XORs precomputed keystream
//! against its data.
//!
//! ```text
//!                       ┌────────── queue ring ──────────┐
//!  producer pool ─────► │ q0 │ q1 │ q2 │ … │ q(n−1) │ ───┐
//!  (fill Empty queues)  └────────────────────────────────┘
//!        ▲                                               │
//!        └──── release spent queue ◄── consumer (XOR) ◄──┘
//! ```
//!
//! The keystream consumed is block-for-block identical to a serial CTR walk
//! from the same key and IV; parallelism never reorders, skips, or
//! duplicates a block.
//!
//! # Example
//!
//! ```
//! use riptide_cipher::{CtrEngine, EngineConfig};
//!
//! let key = [0x42u8; 32];
//! let iv = [0u8; 16];
//! let mut engine = CtrEngine::with_config(
//!     &key,
//!     &iv,
//!     EngineConfig { threads: 2, queues: 4, queue_blocks: 64 },
//! )?;
//!
//! let mut data = *b"sixteen byte msg";
//! engine.transform_in_place(&mut data)?;   // encrypt
//!
//! let mut peer = CtrEngine::with_config(
//!     &key,
//!     &iv,
//!     EngineConfig { threads: 2, queues: 4, queue_blocks: 64 },
//! )?;
//! peer.transform_in_place(&mut data)?;     // decrypt (same operation)
//! assert_eq!(&data, b"sixteen byte msg");
//! # Ok::<(), riptide_cipher::CipherError>(())
//! ```
//!
//! # Security
//!
//! - CTR only: no authentication, no key exchange, no framing. The
//!   transport layers those separately.
//! - Key bytes and generated keystream are zeroized on rekey and teardown.
//! - Counter wraparound mirrors the transport's own 128-bit counter; the
//!   caller is responsible for rekeying before keystream reuse.

pub mod buffer;
pub mod counter;
mod engine;
mod error;
mod keys;
mod producer;
mod queue;
pub mod sizing;

pub use buffer::{BufferError, StageBuffer};
pub use counter::{Block, Counter, BLOCK_LEN};
pub use engine::CtrEngine;
pub use error::CipherError;
pub use sizing::{EngineConfig, Parallelism};
