//! Konfigurasi queue
//!
//! Ukuran queue didefinisikan secara logaritmik: kapasitas = `1 << log_capacity`.
//! Queue tidak pernah tumbuh atau menyusut setelah dibuat.

use crate::error::QueueError;

/// Eksponen kapasitas terkecil (4 slot)
pub const MIN_LOG_CAPACITY: u32 = 2;
/// Eksponen kapasitas terbesar (1 048 576 slot)
pub const MAX_LOG_CAPACITY: u32 = 20;

/// Konfigurasi `BoundedRingQueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub log_capacity: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { log_capacity: 10 }
    }
}

impl QueueConfig {
    pub const fn new(log_capacity: u32) -> Self {
        Self { log_capacity }
    }

    /// Validasi eksponen. Dipanggil saat konstruksi, bukan belakangan.
    pub fn validate(&self) -> Result<(), QueueError> {
        if (MIN_LOG_CAPACITY..=MAX_LOG_CAPACITY).contains(&self.log_capacity) {
            Ok(())
        } else {
            Err(QueueError::InvalidCapacityExponent(self.log_capacity))
        }
    }

    /// Jumlah slot. Hanya bermakna untuk konfigurasi yang valid.
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        1usize << self.log_capacity
    }
}
