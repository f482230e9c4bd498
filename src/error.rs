//! Error types
//!
//! Queue penuh atau kosong bukan error: keduanya hasil normal dari
//! operasi non-blocking. `QueueError` hanya untuk input yang salah.

use std::fmt;

use thiserror::Error;

use crate::config::{MAX_LOG_CAPACITY, MIN_LOG_CAPACITY};

/// Error konfigurasi dan argumen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Eksponen kapasitas di luar `[MIN_LOG_CAPACITY, MAX_LOG_CAPACITY]`
    #[error(
        "capacity exponent {0} out of range [{min}, {max}]",
        min = MIN_LOG_CAPACITY,
        max = MAX_LOG_CAPACITY
    )]
    InvalidCapacityExponent(u32),

    /// Mencoba enqueue representasi kosong (`None`)
    #[error("cannot enqueue the empty item")]
    EmptyItem,

    /// Buffer tujuan `copy_to` tidak muat untuk snapshot
    #[error("destination too small: {needed} items from offset {offset}, {available} slots available")]
    DestinationTooSmall {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Item yang ditolak karena queue penuh, dikembalikan ke caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Ambil kembali item yang ditolak
    #[inline(always)]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

/// Pelanggaran invariant protokol = bug konkurensi. Tidak bisa dipulihkan.
#[cold]
#[inline(never)]
pub(crate) fn protocol_violation(what: &str, found: i64) -> ! {
    crate::trace::error!(what, found, "protocol invariant violated");
    panic!("snapring protocol violation: {what} (found {found})");
}
