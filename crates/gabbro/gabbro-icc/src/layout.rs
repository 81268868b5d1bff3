//! Shared memory layout of the request ring.
//!
//! The binary layout of the memory-mapped region, stable across processes:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ RingHeader (64 bytes)                                         │
//! │  magic │ version │ capacity │ elem_size │ 4 cursors │ 4 locks │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Descriptor slot 0                                             │
//! ├───────────────────────────────────────────────────────────────┤
//! │ ...                                                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Descriptor slot capacity-1                                    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Reply area (rest of the mapping, owned by clients)            │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use crate::descriptor::Descriptor;
use crate::error::ChannelError;
use crate::sync::SpinLock;
use std::mem::size_of;
use std::sync::atomic::AtomicU32;

/// Magic number identifying a request-ring region: ASCII "GABBRORQ".
pub const RING_MAGIC: u64 = 0x4741_4242_524F_5251;

/// Current region format version. Bump on any incompatible layout change;
/// peers reject regions with a mismatched version.
pub const RING_VERSION: u64 = 1;

/// Header at offset 0 of every mapped region.
///
/// `#[repr(C)]` keeps field order and padding identical in every process.
/// The cursors and locks are the only mutable state in the region besides
/// the slots themselves; everything else is written once at creation.
#[repr(C)]
pub struct RingHeader {
    /// Must equal [`RING_MAGIC`].
    pub magic: u64,
    /// Must equal [`RING_VERSION`].
    pub version: u64,
    /// Number of descriptor slots (usable capacity is one less).
    pub capacity: u64,
    /// `size_of::<Descriptor>()` at creation time, checked on open.
    pub elem_size: u64,

    /// Index of the last slot reserved by a producer.
    pub producer_head: AtomicU32,
    /// Index of the last slot published by a producer.
    pub producer_tail: AtomicU32,
    /// Index of the last slot reserved by a consumer.
    pub consumer_head: AtomicU32,
    /// Index of the last slot released by a consumer.
    pub consumer_tail: AtomicU32,

    /// Guards compare-and-advance of `producer_head`.
    pub producer_head_lock: SpinLock,
    /// Guards the store that publishes `producer_tail`.
    pub producer_tail_lock: SpinLock,
    /// Guards compare-and-advance of `consumer_head`.
    pub consumer_head_lock: SpinLock,
    /// Guards the store that publishes `consumer_tail`.
    pub consumer_tail_lock: SpinLock,
}

impl RingHeader {
    /// Validates a header read from an existing mapping.
    ///
    /// `region_len` is the total length of the mapping; the region must be
    /// at least large enough for the header plus `capacity` slots.
    pub fn validate(&self, region_len: usize) -> Result<(), ChannelError> {
        if self.magic != RING_MAGIC {
            return Err(ChannelError::BadMagic { found: self.magic });
        }
        if self.version != RING_VERSION {
            return Err(ChannelError::BadVersion {
                expected: RING_VERSION,
                found: self.version,
            });
        }
        if self.capacity < 2 || self.capacity > u32::MAX as u64 {
            return Err(ChannelError::BadCapacity(self.capacity));
        }
        if self.elem_size as usize != size_of::<Descriptor>() {
            return Err(ChannelError::ElemSizeMismatch {
                expected: size_of::<Descriptor>() as u64,
                found: self.elem_size,
            });
        }
        let needed = bytes_for_ring(self.capacity as u32);
        if region_len < needed {
            return Err(ChannelError::RegionTooSmall {
                needed,
                got: region_len,
            });
        }
        // A corrupted cursor would otherwise only surface as a panic deep
        // in the index arithmetic of the first submit or receive.
        for cursor in [
            &self.producer_head,
            &self.producer_tail,
            &self.consumer_head,
            &self.consumer_tail,
        ] {
            let value = cursor.load(std::sync::atomic::Ordering::Relaxed);
            if value as u64 >= self.capacity {
                return Err(ChannelError::CursorOutOfRange {
                    value,
                    capacity: self.capacity,
                });
            }
        }
        Ok(())
    }
}

/// Bytes occupied by the ring itself (header plus slot array). The reply
/// area starts at this offset within the region.
pub fn bytes_for_ring(capacity: u32) -> usize {
    size_of::<RingHeader>() + capacity as usize * size_of::<Descriptor>()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The header is part of the cross-process wire layout; its size and
    /// alignment must never drift. 64 bytes: four u64 fields, four u32
    /// cursors, four u32 lock words.
    #[test]
    fn header_layout_is_stable() {
        assert_eq!(size_of::<RingHeader>(), 64, "RingHeader layout changed");
        assert_eq!(std::mem::align_of::<RingHeader>(), 8);
    }

    #[test]
    fn ring_bytes_accounts_for_all_slots() {
        assert_eq!(bytes_for_ring(4), 64 + 4 * size_of::<Descriptor>());
        // Slot size is 24 and the header is 64, so the reply area always
        // starts 8-byte aligned.
        assert_eq!(bytes_for_ring(1023) % 8, 0);
    }

    #[test]
    fn validate_rejects_foreign_regions() {
        let header = RingHeader {
            magic: 0,
            version: RING_VERSION,
            capacity: 8,
            elem_size: size_of::<Descriptor>() as u64,
            producer_head: AtomicU32::new(0),
            producer_tail: AtomicU32::new(0),
            consumer_head: AtomicU32::new(0),
            consumer_tail: AtomicU32::new(0),
            producer_head_lock: SpinLock::new(),
            producer_tail_lock: SpinLock::new(),
            consumer_head_lock: SpinLock::new(),
            consumer_tail_lock: SpinLock::new(),
        };
        assert!(matches!(
            header.validate(bytes_for_ring(8)),
            Err(ChannelError::BadMagic { .. })
        ));
    }

    #[test]
    fn validate_rejects_truncated_regions() {
        let header = RingHeader {
            magic: RING_MAGIC,
            version: RING_VERSION,
            capacity: 8,
            elem_size: size_of::<Descriptor>() as u64,
            producer_head: AtomicU32::new(0),
            producer_tail: AtomicU32::new(0),
            consumer_head: AtomicU32::new(0),
            consumer_tail: AtomicU32::new(0),
            producer_head_lock: SpinLock::new(),
            producer_tail_lock: SpinLock::new(),
            consumer_head_lock: SpinLock::new(),
            consumer_tail_lock: SpinLock::new(),
        };
        assert!(matches!(
            header.validate(bytes_for_ring(8) - 1),
            Err(ChannelError::RegionTooSmall { .. })
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_cursors() {
        let header = RingHeader {
            magic: RING_MAGIC,
            version: RING_VERSION,
            capacity: 8,
            elem_size: size_of::<Descriptor>() as u64,
            producer_head: AtomicU32::new(0),
            producer_tail: AtomicU32::new(0),
            consumer_head: AtomicU32::new(8),
            consumer_tail: AtomicU32::new(0),
            producer_head_lock: SpinLock::new(),
            producer_tail_lock: SpinLock::new(),
            consumer_head_lock: SpinLock::new(),
            consumer_tail_lock: SpinLock::new(),
        };
        assert!(matches!(
            header.validate(bytes_for_ring(8)),
            Err(ChannelError::CursorOutOfRange { value: 8, capacity: 8 })
        ));
    }
}
