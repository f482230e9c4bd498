//! Pasangan cursor `head`/`tail` dan protokol exclusive berbasis sentinel.
//!
//! Kedua cursor adalah counter 64-bit yang naik monoton. Nilai `LOCKED`
//! tidak pernah menjadi posisi valid; ia menandai bahwa operasi
//! whole-queue (snapshot, copy, clear) sedang memegang queue.
//!
//! Lock dua cursor tidak bisa dilakukan dengan satu atomic, jadi acquire
//! berjalan dua fase:
//!
//! ```text
//! CAS(head, h -> LOCKED)  gagal -> ulang dari awal
//! CAS(tail, t -> LOCKED)  gagal -> swap(head, h), ulang dari awal
//! ```
//!
//! Setelah `acquire` kembali, kedua cursor pasti `LOCKED`; tidak pernah
//! hanya satu.
//!
//! Di luar `LOCKED` cursor tidak pernah mundur, termasuk setelah clear
//! (head dimajukan ke tail). Dua load terpisah karena itu selalu memberi
//! `tail - head >= 0`, dan CAS tail yang berhasil tidak pernah melewati
//! kapasitas: head saat CAS paling tidak sama dengan head yang dibaca.

use crossbeam_utils::CachePadded;

use crate::error::protocol_violation;
use crate::sync::{AtomicI64, Backoff, Ordering};
use crate::trace::trace;

/// Sentinel: operasi exclusive sedang berjalan
pub(crate) const LOCKED: i64 = -1;

/// Cursor producer dan consumer, masing-masing di cache line sendiri
pub(crate) struct Cursors {
    head: CachePadded<AtomicI64>,
    tail: CachePadded<AtomicI64>,
}

impl Cursors {
    pub(crate) fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicI64::new(0)),
            tail: CachePadded::new(AtomicI64::new(0)),
        }
    }

    /// Baca `(head, tail)`. `None` kalau salah satunya `LOCKED`.
    #[inline(always)]
    pub(crate) fn load(&self) -> Option<(i64, i64)> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head == LOCKED || tail == LOCKED {
            None
        } else {
            Some((head, tail))
        }
    }

    /// Seperti `load`, tapi menunggu (yield) sampai tidak ada yang memegang lock.
    #[inline(always)]
    pub(crate) fn load_unlocked(&self, backoff: &Backoff) -> (i64, i64) {
        loop {
            if let Some(pair) = self.load() {
                return pair;
            }
            backoff.snooze();
        }
    }

    /// Pasangan `(head, tail)` di mana `head` tidak berubah selama `tail`
    /// dibaca, jadi `tail - head` benar-benar pernah berlaku.
    pub(crate) fn load_settled(&self, backoff: &Backoff) -> (i64, i64) {
        loop {
            if let Some((head, tail)) = self.load() {
                if self.head.load(Ordering::Acquire) == head {
                    return (head, tail);
                }
            }
            backoff.snooze();
        }
    }

    /// Reservasi index `tail` untuk producer. Titik linearisasi enqueue.
    #[inline(always)]
    pub(crate) fn try_advance_tail(&self, tail: i64) -> bool {
        self.tail
            .compare_exchange(tail, tail + 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Klaim index `head` untuk consumer.
    #[inline(always)]
    pub(crate) fn try_advance_head(&self, head: i64) -> bool {
        self.head
            .compare_exchange(head, head + 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Ambil akses exclusive atas seluruh queue. Yield sampai berhasil.
    pub(crate) fn acquire(&self) -> Exclusive<'_> {
        let backoff = Backoff::new();
        loop {
            let (head, tail) = self.load_unlocked(&backoff);

            if self
                .head
                .compare_exchange(head, LOCKED, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                backoff.snooze();
                continue;
            }

            if self
                .tail
                .compare_exchange(tail, LOCKED, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Exclusive {
                    cursors: self,
                    head,
                    tail,
                    restore: (head, tail),
                };
            }

            // rollback: jangan pernah tinggalkan hanya head yang terkunci
            let prev = self.head.swap(head, Ordering::AcqRel);
            if prev != LOCKED {
                protocol_violation("head not LOCKED during rollback", prev);
            }
            trace!(head, tail, "exclusive acquire rolled back");
            backoff.snooze();
        }
    }
}

/// Guard akses exclusive. Saat drop, cursor dipulihkan.
///
/// Default-nya cursor kembali ke nilai sebelum lock (operasi read-only).
/// `mark_drained` membuat `head = tail` saat release (dipakai `clear`):
/// queue kosong dan index berikutnya dimulai segar, tanpa cursor mundur.
pub(crate) struct Exclusive<'a> {
    cursors: &'a Cursors,
    head: i64,
    tail: i64,
    restore: (i64, i64),
}

impl Exclusive<'_> {
    /// Rentang logis `[head, tail)` saat lock diambil
    #[inline(always)]
    pub(crate) fn range(&self) -> std::ops::Range<i64> {
        self.head..self.tail
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        (self.tail - self.head) as usize
    }

    pub(crate) fn mark_drained(&mut self) {
        self.restore = (self.tail, self.tail);
    }
}

impl Drop for Exclusive<'_> {
    fn drop(&mut self) {
        // pemilik tunggal LOCKED: tulis langsung, lalu verifikasi sentinel-nya
        let prev_tail = self.cursors.tail.swap(self.restore.1, Ordering::Release);
        let prev_head = self.cursors.head.swap(self.restore.0, Ordering::Release);
        if prev_tail != LOCKED {
            protocol_violation("tail not LOCKED on release", prev_tail);
        }
        if prev_head != LOCKED {
            protocol_violation("head not LOCKED on release", prev_head);
        }
    }
}
