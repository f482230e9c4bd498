//! Primitive sinkronisasi yang dipakai queue.
//!
//! Di build normal semuanya berasal dari `std` dan `crossbeam-utils`.
//! Dengan `RUSTFLAGS="--cfg loom"` atomics dan yield diganti milik loom
//! supaya model checker bisa menjelajahi semua interleaving.

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Backoff kooperatif untuk retry loop.
///
/// Spin sebentar lalu menyerahkan giliran ke scheduler. Tidak ada batas
/// jumlah retry: di bawah kontensi ekstrem caller bisa kelaparan.
#[cfg(not(loom))]
pub(crate) struct Backoff(crossbeam_utils::Backoff);

#[cfg(not(loom))]
impl Backoff {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self(crossbeam_utils::Backoff::new())
    }

    #[inline(always)]
    pub(crate) fn snooze(&self) {
        self.0.snooze();
    }
}

#[cfg(loom)]
pub(crate) struct Backoff;

#[cfg(loom)]
impl Backoff {
    pub(crate) fn new() -> Self {
        Self
    }

    // loom harus diberi tahu setiap spin, kalau tidak model tidak pernah selesai
    pub(crate) fn snooze(&self) {
        loom::thread::yield_now();
    }
}
