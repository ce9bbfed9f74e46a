//! Staging buffer with window-sized growth
//!
//! The transport stages plaintext and ciphertext in a growable byte buffer
//! around the cipher engine. Growth is normally rounded up in fixed
//! increments, which is the wrong shape for bulk transfer: the buffer inches
//! toward the flow-control window through repeated realloc-and-copy cycles.
//! When the expected window size is known, callers install it as a growth
//! hint and the buffer jumps straight to it the first time an allocation
//! crosses the watershed.
//!
//! The cipher engine itself only ever uses fixed-size block buffers; this
//! module exists for the engine's callers, and the hint must survive the
//! trip around the cipher untouched.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use zeroize::Zeroize;

/// Initial allocation.
const SIZE_INIT: usize = 256;

/// Growth granularity; allocations are rounded up to this.
const SIZE_INC: usize = 256;

/// Default ceiling (128 MiB).
pub const SIZE_MAX: usize = 0x0800_0000;

/// Allocation size past which the window hint takes over from incremental
/// growth (matches the transport's maximum packet size).
const WATERSHED: usize = 256 * 1024;

/// Errors from staging buffer operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// Reservation would exceed the buffer's maximum size
    #[error("requested size {requested} exceeds buffer maximum {max}")]
    MaxSizeExceeded {
        /// Total size the reservation asked for
        requested: usize,
        /// Configured ceiling
        max: usize,
    },

    /// Consume asked for more bytes than the buffer holds
    #[error("cannot consume {requested} bytes from a buffer holding {available}")]
    Underflow {
        /// Bytes requested
        requested: usize,
        /// Bytes available
        available: usize,
    },
}

/// Growable staging buffer with a preferred-growth-target hint.
///
/// Contents are wiped on drop; staged data is plaintext or keystream-derived
/// and gets the same hygiene as key material.
#[derive(Debug)]
pub struct StageBuffer {
    data: BytesMut,
    max_size: usize,
    window_hint: usize,
}

impl StageBuffer {
    /// Empty buffer with the default ceiling and no window hint.
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(SIZE_INIT),
            max_size: SIZE_MAX,
            window_hint: 0,
        }
    }

    /// Empty buffer with an explicit ceiling.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(SIZE_INIT.min(max_size)),
            max_size,
            window_hint: 0,
        }
    }

    /// Install the preferred growth target (typically the negotiated
    /// flow-control window). Zero disables the fast path.
    pub fn set_window_hint(&mut self, hint: usize) {
        self.window_hint = hint;
    }

    /// Currently installed growth target.
    pub fn window_hint(&self) -> usize {
        self.window_hint
    }

    /// Bytes currently staged.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current allocation.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Configured ceiling.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Ensure room for `additional` more bytes.
    ///
    /// Growth is rounded up to [`SIZE_INC`] units. Once the target
    /// allocation crosses the watershed and a window hint is set, the
    /// buffer grows directly to cover the hint instead, trading one large
    /// allocation for many realloc-and-copy rounds.
    pub fn reserve(&mut self, additional: usize) -> Result<(), BufferError> {
        let Some(required) = self.data.len().checked_add(additional) else {
            return Err(BufferError::MaxSizeExceeded {
                requested: usize::MAX,
                max: self.max_size,
            });
        };
        if required > self.max_size {
            return Err(BufferError::MaxSizeExceeded { requested: required, max: self.max_size });
        }
        if required <= self.data.capacity() {
            return Ok(());
        }

        let mut target = round_up(required, SIZE_INC);
        if target > WATERSHED && self.window_hint > 0 && self.data.capacity() < self.window_hint {
            target = round_up(required.max(self.window_hint), SIZE_INC);
        }
        let target = target.min(self.max_size);

        self.data.reserve(target - self.data.len());
        Ok(())
    }

    /// Stage bytes, growing as needed.
    pub fn put(&mut self, src: &[u8]) -> Result<(), BufferError> {
        self.reserve(src.len())?;
        self.data.extend_from_slice(src);
        Ok(())
    }

    /// Take the first `len` staged bytes.
    pub fn consume(&mut self, len: usize) -> Result<Bytes, BufferError> {
        if len > self.data.len() {
            return Err(BufferError::Underflow { requested: len, available: self.data.len() });
        }
        Ok(self.data.split_to(len).freeze())
    }

    /// Mutable view of everything staged, for in-place transforms.
    pub fn staged_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

impl Default for StageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StageBuffer {
    fn drop(&mut self) {
        self.data.as_mut().zeroize();
    }
}

fn round_up(value: usize, granule: usize) -> usize {
    value.div_ceil(granule) * granule
}
