//! Bounded Multi-Producer Multi-Consumer Ring Queue
//!
//! Fast path (enqueue, dequeue, peek, count) hanya memakai CAS pada cursor
//! dan yield kooperatif. Operasi whole-queue (`to_vec`, `copy_to`, `clear`)
//! mengunci kedua cursor ke sentinel `LOCKED` sehingga melihat snapshot
//! yang konsisten tanpa Mutex.
//!
//! Urutan enqueue ditentukan oleh urutan CAS `tail` yang berhasil. Dequeue
//! FIFO terhadap urutan itu; consumer mungkin perlu menunggu producer yang
//! lambat selesai menulis slot-nya.
//!
//! Retry tidak dibatasi. Di bawah kontensi patologis sebuah caller bisa
//! kelaparan; ini tradeoff yang diterima.

use std::fmt;
use std::ops::Range;

use crate::config::QueueConfig;
use crate::error::{Full, QueueError};
use crate::sync::Backoff;
use crate::trace::{debug, trace};

use super::cursor::Cursors;
use super::slot::Slot;

/// Queue konkuren berkapasitas tetap (power of 2).
pub struct BoundedRingQueue<T> {
    cursors: Cursors,
    // Pre-allocated di heap, tidak ada alokasi setelah init
    slots: Box<[Slot<T>]>,
    mask: i64,
    capacity: usize,
}

impl<T> BoundedRingQueue<T> {
    /// Membuat queue dengan kapasitas `1 << log_capacity`.
    ///
    /// `log_capacity` harus di `[2, 20]`, selain itu
    /// `QueueError::InvalidCapacityExponent` dan tidak ada queue yang dibuat.
    pub fn new(log_capacity: u32) -> Result<Self, QueueError> {
        Self::with_config(QueueConfig::new(log_capacity))
    }

    pub fn with_config(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let capacity = config.capacity();
        let slots: Box<[Slot<T>]> = (0..capacity).map(|_| Slot::new()).collect();

        debug!(capacity, "ring queue created");

        Ok(Self {
            cursors: Cursors::new(),
            slots,
            mask: (capacity - 1) as i64,
            capacity,
        })
    }

    #[inline(always)]
    fn slot(&self, index: i64) -> &Slot<T> {
        &self.slots[(index & self.mask) as usize]
    }

    /// Kapasitas queue
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Selalu `true`: semua operasi thread-safe.
    #[inline(always)]
    pub fn is_synchronized(&self) -> bool {
        true
    }

    // ------------------------------------------------------------------
    // Non-blocking API
    // ------------------------------------------------------------------

    /// Enqueue ke tail.
    ///
    /// `Err(Full(item))` kalau queue penuh; item dikembalikan ke caller.
    pub fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        let backoff = Backoff::new();
        loop {
            let (head, tail) = self.cursors.load_unlocked(&backoff);

            if tail - head >= self.capacity as i64 {
                return Err(Full(item));
            }

            if self.cursors.try_advance_tail(tail) {
                // slot diisi SETELAH reservasi; consumer menunggu publish
                self.slot(tail).publish(tail, item);
                return Ok(());
            }

            backoff.snooze();
        }
    }

    /// Enqueue dari representasi nullable.
    ///
    /// `None` adalah representasi kosong dan ditolak dengan
    /// `QueueError::EmptyItem` tanpa menyentuh queue. `Ok(false)` kalau
    /// penuh; item yang ditolak di-drop. Pakai `try_enqueue` untuk
    /// mendapatkan item kembali.
    pub fn try_add(&self, item: Option<T>) -> Result<bool, QueueError> {
        let item = item.ok_or(QueueError::EmptyItem)?;
        Ok(self.try_enqueue(item).is_ok())
    }

    /// Dequeue dari head. `None` kalau kosong.
    pub fn try_dequeue(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let (head, tail) = self.cursors.load_unlocked(&backoff);

            if head >= tail {
                return None;
            }

            let slot = self.slot(head);

            // index sudah direservasi tapi producer belum menulis: jangan majukan head
            if !slot.is_published(head) {
                backoff.snooze();
                continue;
            }

            if self.cursors.try_advance_head(head) {
                // SAFETY: CAS head menjadikan kita pemilik tunggal index ini
                return Some(unsafe { slot.take(head) });
            }

            backoff.snooze();
        }
    }

    /// Sama dengan `try_dequeue`.
    #[inline(always)]
    pub fn try_take(&self) -> Option<T> {
        self.try_dequeue()
    }

    /// Lihat item di head tanpa mengambilnya.
    ///
    /// Peek berturut-turut mengembalikan item yang sama selama tidak ada
    /// thread lain yang dequeue atau clear.
    pub fn try_peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let backoff = Backoff::new();
        loop {
            let (head, tail) = self.cursors.load_unlocked(&backoff);

            if head >= tail {
                return None;
            }

            if let Some(value) = self.slot(head).peek(head) {
                return Some(value);
            }

            backoff.snooze();
        }
    }

    /// Jumlah item saat ini. Hanya estimasi: bisa basi sebelum dibaca caller.
    pub fn count(&self) -> usize {
        let backoff = Backoff::new();
        let (head, tail) = self.cursors.load_settled(&backoff);
        (tail - head) as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Seperti `try_dequeue` tapi mengembalikan `T::default()` kalau kosong.
    pub fn dequeue_or_default(&self) -> T
    where
        T: Default,
    {
        self.try_dequeue().unwrap_or_default()
    }

    /// Seperti `try_peek` tapi mengembalikan `T::default()` kalau kosong.
    pub fn peek_or_default(&self) -> T
    where
        T: Clone + Default,
    {
        self.try_peek().unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Blocking API (exclusive)
    // ------------------------------------------------------------------

    /// Snapshot semua item dalam urutan FIFO.
    ///
    /// Producer dan consumer diblokir (yield) selama copy, jadi hasilnya
    /// adalah isi queue pada satu titik waktu, tanpa item setengah ditulis.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let guard = self.cursors.acquire();
        let mut out = Vec::with_capacity(guard.len());
        for index in guard.range() {
            // SAFETY: lock dipegang dan index di dalam [head, tail)
            out.push(unsafe { self.slot(index).clone_locked(index) });
        }
        trace!(len = out.len(), "snapshot taken");
        out
    }

    /// Copy snapshot ke `dest` mulai dari `offset`. Mengembalikan jumlah item.
    ///
    /// Kalau `dest` tidak muat, `QueueError::DestinationTooSmall` dan
    /// `dest` tidak diubah sama sekali.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<usize, QueueError>
    where
        T: Clone,
    {
        let guard = self.cursors.acquire();
        let needed = guard.len();
        let available = dest.len().saturating_sub(offset);
        if needed > available || offset > dest.len() {
            return Err(QueueError::DestinationTooSmall {
                offset,
                needed,
                available,
            });
        }

        for (out, index) in dest[offset..offset + needed].iter_mut().zip(guard.range()) {
            // SAFETY: lock dipegang dan index di dalam [head, tail)
            *out = unsafe { self.slot(index).clone_locked(index) };
        }
        Ok(needed)
    }

    /// Kosongkan queue.
    ///
    /// Saat release `head` dimajukan ke `tail`: queue kosong dan enqueue
    /// berikutnya memakai index segar. Item yang di-enqueue setelah clear
    /// selesai tidak terpengaruh.
    ///
    /// Kalau drop sebuah item panic, sisa item dibuang tanpa di-drop (leak)
    /// dan panic diteruskan; queue tetap kosong dan bisa dipakai.
    pub fn clear(&self) {
        let mut guard = self.cursors.acquire();
        guard.mark_drained();

        let mut drain = Drain {
            queue: self,
            pending: guard.range(),
        };
        while let Some(index) = drain.pending.next() {
            // SAFETY: lock dipegang dan index di dalam [head, tail)
            unsafe { self.slot(index).discard(index) };
        }

        debug!(dropped = guard.len(), "queue cleared");
    }

    /// Iterasi atas snapshot (`to_vec`).
    pub fn iter(&self) -> std::vec::IntoIter<T>
    where
        T: Clone,
    {
        self.to_vec().into_iter()
    }
}

/// Sisa index milik `clear` yang belum dibuang. Hanya tidak kosong saat
/// unwind; slotnya dikosongkan tanpa drop supaya producer tidak macet.
struct Drain<'a, T> {
    queue: &'a BoundedRingQueue<T>,
    pending: Range<i64>,
}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        for index in self.pending.by_ref() {
            // SAFETY: lock `clear` masih dipegang; guard-nya drop setelah ini
            unsafe { self.queue.slot(index).abandon(index) };
        }
    }
}

impl<'a, T: Clone> IntoIterator for &'a BoundedRingQueue<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> fmt::Debug for BoundedRingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRingQueue")
            .field("capacity", &self.capacity)
            .field("count", &self.count())
            .finish()
    }
}

impl<T> Drop for BoundedRingQueue<T> {
    fn drop(&mut self) {
        let Some((head, tail)) = self.cursors.load() else {
            return;
        };
        let mask = self.mask;
        for index in head..tail {
            self.slots[(index & mask) as usize].drop_in_place_mut(index);
        }
    }
}
