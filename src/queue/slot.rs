//! Slot ring buffer dengan stamp okupansi eksplisit.
//!
//! Rust tidak punya null di `T`, jadi "kosong" disimpan di samping data:
//!
//! | `stamp`       | arti                                              |
//! |---------------|---------------------------------------------------|
//! | `VACANT`      | kosong, producer boleh menulis                    |
//! | `TAKING`      | consumer/clear sedang memindahkan nilai keluar     |
//! | `index + 1`   | berisi nilai untuk index logis `index`            |
//!
//! Stamp menyimpan index, bukan sekadar flag, sehingga clear kondisional
//! setelah dequeue tidak pernah menghapus data generasi berikutnya.
//!
//! `pins` menghitung peeker yang sedang meng-clone nilai. Pengambil nilai
//! menulis `TAKING` lalu menunggu `pins == 0` (Dekker-style, SeqCst di
//! kedua sisi), jadi clone tidak pernah membaca nilai yang sudah dipindah.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

use crate::error::protocol_violation;
use crate::sync::{AtomicI64, AtomicUsize, Backoff, Ordering};

const VACANT: i64 = 0;
const TAKING: i64 = -1;

#[inline(always)]
const fn published(index: i64) -> i64 {
    index + 1
}

pub(crate) struct Slot<T> {
    stamp: AtomicI64,
    pins: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: akses ke `value` diserialisasi oleh `stamp`:
// - hanya satu producer per index yang menulis, dan hanya saat VACANT
// - hanya pemenang CAS head (atau clear yang memegang lock) yang memindahkan
// - pembaca bersama (peek, snapshot) hanya membaca saat stamp == published
// Peek dan snapshot meminjam `&T` dari banyak thread, jadi Sync butuh `T: Sync`.
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send + Sync> Sync for Slot<T> {}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            stamp: AtomicI64::new(VACANT),
            pins: AtomicUsize::new(0),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Apakah slot sudah berisi nilai untuk `index`
    #[inline(always)]
    pub(crate) fn is_published(&self, index: i64) -> bool {
        self.stamp.load(Ordering::Acquire) == published(index)
    }

    /// Tulis nilai untuk `index` yang sudah direservasi via tail.
    ///
    /// Consumer generasi sebelumnya mungkin belum selesai memindahkan
    /// nilainya; tunggu sampai slot `VACANT`.
    #[inline(always)]
    pub(crate) fn publish(&self, index: i64, value: T) {
        let backoff = Backoff::new();
        while self.stamp.load(Ordering::Acquire) != VACANT {
            backoff.snooze();
        }

        // SAFETY: index ini milik kita (CAS tail) dan slot VACANT
        unsafe { (*self.value.get()).write(value) };

        self.stamp.store(published(index), Ordering::Release);
    }

    /// Pindahkan nilai untuk `index` keluar dan kosongkan slot.
    ///
    /// # Safety
    /// Caller harus pemilik tunggal `index`: pemenang CAS head, atau
    /// pemegang lock exclusive dengan `index` di dalam `[head, tail)`.
    #[inline(always)]
    pub(crate) unsafe fn take(&self, index: i64) -> T {
        self.wait_published(index);
        self.begin_take();

        // SAFETY: stamp TAKING dan tidak ada peeker, nilai sudah diinisialisasi
        let value = unsafe { (*self.value.get()).assume_init_read() };

        self.end_take();
        value
    }

    /// Seperti `take` tapi langsung drop nilainya (untuk clear).
    ///
    /// # Safety
    /// Sama dengan `take`.
    pub(crate) unsafe fn discard(&self, index: i64) {
        self.wait_published(index);
        self.begin_take();

        // Drop milik T boleh panic; slot tetap harus kembali VACANT
        let _vacate = Vacate(self);

        // SAFETY: lihat `take`
        unsafe { (*self.value.get()).assume_init_drop() };
    }

    /// Kosongkan slot untuk `index` tanpa men-drop nilainya (leak).
    ///
    /// Dipakai clear yang sedang unwind setelah drop sebuah item panic.
    ///
    /// # Safety
    /// Sama dengan `take`.
    pub(crate) unsafe fn abandon(&self, index: i64) {
        self.wait_published(index);
        self.begin_take();
        self.end_take();
    }

    /// Clone nilai untuk `index` tanpa mengosongkan slot.
    ///
    /// `None` kalau slot belum/tidak lagi berisi `index` (producer belum
    /// selesai, atau sudah di-dequeue dan dipakai ulang).
    #[inline(always)]
    pub(crate) fn peek(&self, index: i64) -> Option<T>
    where
        T: Clone,
    {
        let _pin = PeekPin::new(&self.pins);
        if self.stamp.load(Ordering::SeqCst) != published(index) {
            return None;
        }

        // SAFETY: pin mencegah pengambil memindahkan nilai selama clone
        Some(unsafe { (*self.value.get()).assume_init_ref() }.clone())
    }

    /// Clone nilai untuk `index` di bawah lock exclusive.
    ///
    /// # Safety
    /// Caller memegang lock exclusive dan `index` ada di `[head, tail)`,
    /// sehingga tidak ada yang bisa memindahkan nilai ini.
    pub(crate) unsafe fn clone_locked(&self, index: i64) -> T
    where
        T: Clone,
    {
        self.wait_published(index);

        // SAFETY: lihat kontrak fungsi
        unsafe { (*self.value.get()).assume_init_ref() }.clone()
    }

    /// Akses langsung lewat `&mut`: tidak ada thread lain.
    pub(crate) fn drop_in_place_mut(&mut self, index: i64) {
        if self.stamp.load(Ordering::Relaxed) == published(index) {
            // SAFETY: &mut self, stamp membuktikan nilai terinisialisasi
            unsafe { (*self.value.get()).assume_init_drop() };
            self.stamp.store(VACANT, Ordering::Relaxed);
        }
    }

    // Producer sudah mereservasi index ini sebelum lock/CAS; ia pasti selesai.
    #[inline(always)]
    fn wait_published(&self, index: i64) {
        let backoff = Backoff::new();
        while !self.is_published(index) {
            backoff.snooze();
        }
    }

    #[inline(always)]
    fn begin_take(&self) {
        self.stamp.store(TAKING, Ordering::SeqCst);
        let backoff = Backoff::new();
        while self.pins.load(Ordering::SeqCst) != 0 {
            backoff.snooze();
        }
    }

    #[inline(always)]
    fn end_take(&self) {
        // kosongkan hanya kalau masih milik kita
        if let Err(found) =
            self.stamp
                .compare_exchange(TAKING, VACANT, Ordering::Release, Ordering::Relaxed)
        {
            protocol_violation("slot not TAKING after take", found);
        }
    }
}

struct Vacate<'a, T>(&'a Slot<T>);

impl<T> Drop for Vacate<'_, T> {
    #[inline(always)]
    fn drop(&mut self) {
        self.0.end_take();
    }
}

struct PeekPin<'a>(&'a AtomicUsize);

impl<'a> PeekPin<'a> {
    #[inline(always)]
    fn new(pins: &'a AtomicUsize) -> Self {
        pins.fetch_add(1, Ordering::SeqCst);
        Self(pins)
    }
}

impl Drop for PeekPin<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}
