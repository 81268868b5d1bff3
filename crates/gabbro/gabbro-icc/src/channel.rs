//! Multi-producer, multi-consumer request channel over a shared region.
//!
//! The channel is a bounded ring of [`Descriptor`] slots plus four cursors,
//! living at offset 0 of a memory-mapped region (file-backed for
//! cross-process use, anonymous for in-process use). Producers block in
//! [`RequestChannel::submit`] while the ring is full; consumers block in
//! [`RequestChannel::receive`] while it is empty. Replies travel
//! out-of-band: the consumer writes the completed descriptor at the
//! producer-chosen `reply_offset` inside the same region and sets its
//! `ready` flag last.
//!
//! # Protocol
//!
//! Each side runs the same two-phase reserve-then-publish sequence on its
//! own cursor pair:
//!
//! 1. **Reserve** the next slot by advancing the head cursor under that
//!    side's head lock. The lock covers exactly the compare-and-advance;
//!    waiting for space (ring full) or data (ring empty) happens outside
//!    it, so stalled threads wait on the opposite side rather than on each
//!    other.
//! 2. Copy the payload in or out of the reserved slot. No lock is held:
//!    reservation is exclusive, so no other thread touches the slot until
//!    it is published.
//! 3. **Publish** by advancing the tail cursor to the reserved index, but
//!    only after the tail has reached the slot's predecessor. This forces
//!    publish order to equal reservation order: a fast thread that reserved
//!    a later slot cannot expose it past a slower thread still filling an
//!    earlier one.
//!
//! A slot's content is therefore fully written before the Release store of
//! the tail makes it visible, and the matching Acquire load on the other
//! side makes the content visible before it is read or overwritten.

use crate::descriptor::Descriptor;
use crate::error::ChannelError;
use crate::index::{self, RingConfig};
use crate::layout::{RING_MAGIC, RING_VERSION, RingHeader, bytes_for_ring};
use crate::sync::SpinLock;
use gabbro_mmap::{MmapAnon, MmapFileMut};
use std::mem::{align_of, offset_of, size_of};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Owns the mapping that backs the region.
enum Backing {
    File(#[allow(dead_code)] MmapFileMut),
    Anon(#[allow(dead_code)] MmapAnon),
}

/// Handle to a shared request ring.
///
/// Cheap to share: wrap it in an `Arc` and hand clones to every producer
/// and worker thread. Any number of handles (across any number of
/// processes, for file-backed regions) may call [`submit`] and [`receive`]
/// concurrently.
///
/// [`submit`]: RequestChannel::submit
/// [`receive`]: RequestChannel::receive
pub struct RequestChannel {
    /// Keeps the mapping alive; never accessed after construction.
    _backing: Backing,
    /// Start of the mapped region (the header lives here).
    base: *mut u8,
    /// Total mapped length, ring plus reply area.
    len: usize,
    /// Slot count, cached out of the header.
    capacity: u32,
}

// SAFETY: all mutation of the shared region goes through atomics, the
// in-region spinlocks, or slot/reply writes whose exclusivity the
// reservation protocol guarantees. The raw base pointer is only a view
// into the mapping owned by `_backing`.
unsafe impl Send for RequestChannel {}
unsafe impl Sync for RequestChannel {}

impl RequestChannel {
    /// Creates a new ring in a file-backed region at `path`.
    ///
    /// The file is sized to hold the ring plus `reply_bytes` of
    /// client-owned reply area, and the whole region is reset to the empty
    /// state. Other processes attach with [`RequestChannel::open`].
    pub fn create<P: AsRef<Path>>(
        path: P,
        cfg: RingConfig,
        reply_bytes: usize,
    ) -> Result<Self, ChannelError> {
        let len = bytes_for_ring(cfg.capacity) + reply_bytes;
        let mut mm = MmapFileMut::create_rw(path, len as u64)?;
        let base = mm.as_mut_ptr();

        // SAFETY: the mapping was just created with exactly `len` bytes and
        // nothing else can have mapped it yet.
        unsafe { init_region(base, cfg) };

        Ok(Self {
            _backing: Backing::File(mm),
            base,
            len,
            capacity: cfg.capacity,
        })
    }

    /// Attaches to an existing file-backed ring.
    ///
    /// Validates the header (magic, version, capacity, descriptor size,
    /// region length) before touching anything else; a region this process
    /// did not create is never trusted blindly.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChannelError> {
        let mut mm = MmapFileMut::open_rw(path)?;
        let len = mm.len();
        if len < size_of::<RingHeader>() {
            return Err(ChannelError::RegionTooSmall {
                needed: size_of::<RingHeader>(),
                got: len,
            });
        }
        let base = mm.as_mut_ptr();

        // SAFETY: the region is at least header-sized; validate() decides
        // whether the rest of it can be trusted.
        let header = unsafe { &*(base as *const RingHeader) };
        header.validate(len)?;
        let capacity = header.capacity as u32;

        Ok(Self {
            _backing: Backing::File(mm),
            base,
            len,
            capacity,
        })
    }

    /// Creates a ring in an anonymous mapping, visible only to this
    /// process. Tests and benchmarks use this to run many independent
    /// channels side by side.
    pub fn in_memory(cfg: RingConfig, reply_bytes: usize) -> Result<Self, ChannelError> {
        let len = bytes_for_ring(cfg.capacity) + reply_bytes;
        let mut mm = MmapAnon::new(len)?;
        let base = mm.as_mut_ptr();

        // SAFETY: freshly allocated anonymous mapping of exactly `len` bytes.
        unsafe { init_region(base, cfg) };

        Ok(Self {
            _backing: Backing::Anon(mm),
            base,
            len,
            capacity: cfg.capacity,
        })
    }

    /// Number of descriptor slots (usable capacity is one less).
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total length of the mapped region in bytes.
    #[inline]
    pub fn region_len(&self) -> usize {
        self.len
    }

    /// Offset of the first byte past the ring: the start of the
    /// client-owned reply area.
    #[inline]
    pub fn reply_area_offset(&self) -> u64 {
        bytes_for_ring(self.capacity) as u64
    }

    /// Offset of the `i`-th descriptor-sized reply slot in the reply area.
    /// Purely arithmetic; bounds are enforced when the offset is used.
    #[inline]
    pub fn reply_slot_offset(&self, i: usize) -> u64 {
        self.reply_area_offset() + (i * size_of::<Descriptor>()) as u64
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        // SAFETY: base points at a header this handle initialized or
        // validated at construction.
        unsafe { &*(self.base as *const RingHeader) }
    }

    #[inline]
    fn slot_ptr(&self, idx: u32) -> *mut Descriptor {
        debug_assert!(idx < self.capacity);
        // SAFETY: idx is a reserved cursor value, always below capacity.
        unsafe { (self.base.add(size_of::<RingHeader>()) as *mut Descriptor).add(idx as usize) }
    }

    /// Blocking enqueue: copies `desc` into the ring and returns once the
    /// slot is published. Blocks indefinitely while the ring is full; a
    /// permanently stalled consumer therefore blocks producers forever
    /// (documented limitation, there is no timeout).
    pub fn submit(&self, desc: &Descriptor) {
        let hdr = self.header();
        let cap = self.capacity;

        // Phase 1: reserve a slot.
        let reserved = loop {
            // Wait for apparent space without holding the reservation lock,
            // so a full ring leaves producers waiting on the consumer side
            // instead of serializing against each other.
            let mut spins = 0u32;
            while index::next(hdr.producer_head.load(Ordering::Relaxed), cap)
                == hdr.consumer_tail.load(Ordering::Acquire)
            {
                wait_spin(&mut spins);
            }

            // The lock scope is exactly the compare-and-advance. The check
            // must be repeated under the lock; it cannot go stale there,
            // since consumer_tail moving only ever creates more space.
            let _g = hdr.producer_head_lock.lock();
            let head = hdr.producer_head.load(Ordering::Relaxed);
            let next = index::next(head, cap);
            if next != hdr.consumer_tail.load(Ordering::Acquire) {
                hdr.producer_head.store(next, Ordering::Relaxed);
                break next;
            }
            // Another producer took the last slot while we were waiting.
        };

        // Phase 2: fill the slot. No lock: reservation is exclusive until
        // the tail passes this index.
        // SAFETY: `reserved` is ours alone between reserve and publish.
        unsafe { self.slot_ptr(reserved).write(*desc) };

        // Phase 3: publish in reservation order. At most capacity - 1
        // reservations are ever in flight, so `tail == prev(reserved)`
        // uniquely identifies our turn.
        let predecessor = index::prev(reserved, cap);
        let mut spins = 0u32;
        while hdr.producer_tail.load(Ordering::Relaxed) != predecessor {
            wait_spin(&mut spins);
        }
        let _g = hdr.producer_tail_lock.lock();
        // Release pairs with the consumer's Acquire of producer_tail and
        // makes the slot contents visible with it.
        hdr.producer_tail.store(reserved, Ordering::Release);
    }

    /// Blocking dequeue: waits for a published descriptor, copies it out,
    /// and releases the slot. Items come out in the exact order producers
    /// published them, and each item is delivered to exactly one caller.
    pub fn receive(&self) -> Descriptor {
        let hdr = self.header();
        let cap = self.capacity;

        let reserved = loop {
            // Empty while our head has caught up with the producer tail.
            let mut spins = 0u32;
            while hdr.consumer_head.load(Ordering::Relaxed)
                == hdr.producer_tail.load(Ordering::Acquire)
            {
                wait_spin(&mut spins);
            }

            // Re-check under the lock; producer_tail only moves forward, so
            // a non-empty verdict cannot be invalidated while we hold it.
            let _g = hdr.consumer_head_lock.lock();
            let head = hdr.consumer_head.load(Ordering::Relaxed);
            if head != hdr.producer_tail.load(Ordering::Acquire) {
                let next = index::next(head, cap);
                hdr.consumer_head.store(next, Ordering::Relaxed);
                break next;
            }
            // Another consumer drained the last item; wait again.
        };

        // The Acquire load of producer_tail that let us reserve synchronizes
        // with the producer's Release publish, so the slot is fully written.
        // SAFETY: `reserved` is ours alone between reserve and release.
        let desc = unsafe { self.slot_ptr(reserved).read() };

        // Release the slot in reservation order, mirroring submit.
        let predecessor = index::prev(reserved, cap);
        let mut spins = 0u32;
        while hdr.consumer_tail.load(Ordering::Relaxed) != predecessor {
            wait_spin(&mut spins);
        }
        let _g = hdr.consumer_tail_lock.lock();
        // Release pairs with the producer's Acquire of consumer_tail: our
        // copy of the slot completes before a producer may overwrite it.
        hdr.consumer_tail.store(reserved, Ordering::Release);

        desc
    }

    /// Writes a completed reply descriptor at `reply.reply_offset`.
    ///
    /// The payload fields are stored first, then the `ready` flag flips to
    /// 1 with Release ordering, so a poller that observes the flag sees the
    /// whole reply. The `ready` word itself is only ever touched through
    /// its atomic view; a concurrent poller races with it on that word
    /// alone. The offset is validated against the reply area before any
    /// dereference; a bad offset is an error, never a wild write.
    pub fn write_reply(&self, reply: &Descriptor) -> Result<(), ChannelError> {
        let off = self.check_reply_offset(reply.reply_offset)?;
        // SAFETY: offset checked in-bounds and aligned above.
        unsafe {
            let dst = self.base.add(off) as *mut Descriptor;
            (&raw mut (*dst).key).write(reply.key);
            (&raw mut (*dst).value).write(reply.value);
            (&raw mut (*dst).kind).write(reply.kind);
            (&raw mut (*dst).reply_offset).write(reply.reply_offset);
            self.ready_flag(dst).store(1, Ordering::Release);
        }
        Ok(())
    }

    /// Polls the reply slot at `offset`. Returns the completed descriptor
    /// once its `ready` flag has been set by [`RequestChannel::write_reply`].
    pub fn poll_reply(&self, offset: u64) -> Result<Option<Descriptor>, ChannelError> {
        let off = self.check_reply_offset(offset)?;
        // SAFETY: offset checked in-bounds and aligned above. The payload
        // reads happen only after the Acquire load observed the flag, and
        // the flag word is read through the atomic, never plainly.
        unsafe {
            let slot = self.base.add(off) as *mut Descriptor;
            if self.ready_flag(slot).load(Ordering::Acquire) == 0 {
                return Ok(None);
            }
            Ok(Some(Descriptor {
                key: (&raw const (*slot).key).read(),
                value: (&raw const (*slot).value).read(),
                kind: (&raw const (*slot).kind).read(),
                ready: 1,
                reply_offset: (&raw const (*slot).reply_offset).read(),
            }))
        }
    }

    /// Clears the `ready` flag at `offset` so the slot can carry another
    /// reply. Callers do this before submitting a request that reuses a
    /// reply slot.
    pub fn arm_reply(&self, offset: u64) -> Result<(), ChannelError> {
        let off = self.check_reply_offset(offset)?;
        // SAFETY: offset checked in-bounds and aligned above.
        unsafe {
            let slot = self.base.add(off) as *mut Descriptor;
            self.ready_flag(slot).store(0, Ordering::Release);
        }
        Ok(())
    }

    fn check_reply_offset(&self, offset: u64) -> Result<usize, ChannelError> {
        let area_start = self.reply_area_offset();
        let area_end = self.len as u64;
        let elem = size_of::<Descriptor>() as u64;
        let end = offset.checked_add(elem);
        if offset < area_start || end.is_none_or(|end| end > area_end) {
            return Err(ChannelError::ReplyOutOfBounds {
                offset,
                area_start,
                area_end,
            });
        }
        if offset % align_of::<Descriptor>() as u64 != 0 {
            return Err(ChannelError::ReplyMisaligned(offset));
        }
        Ok(offset as usize)
    }

    /// View of a reply slot's `ready` field as an atomic word.
    #[inline]
    fn ready_flag(&self, slot: *mut Descriptor) -> &AtomicU32 {
        // SAFETY: `ready` is a u32 at a 4-aligned offset inside the slot,
        // and AtomicU32 has the same layout as u32.
        unsafe { &*((slot as *mut u8).add(offset_of!(Descriptor, ready)) as *const AtomicU32) }
    }
}

/// Writes a fresh header and zeroed slots into a region of at least
/// `bytes_for_ring(cfg.capacity)` bytes.
///
/// All four cursors start equal (at 0): the empty configuration. The
/// in-region spinlocks are plain zero-initialized words, so there is no
/// fallible lock setup step.
///
/// # Safety
/// `base` must point at an exclusively owned, writable region large enough
/// for the ring.
unsafe fn init_region(base: *mut u8, cfg: RingConfig) {
    unsafe {
        let h = base as *mut RingHeader;
        ptr::write(
            h,
            RingHeader {
                magic: RING_MAGIC,
                version: RING_VERSION,
                capacity: cfg.capacity as u64,
                elem_size: size_of::<Descriptor>() as u64,
                producer_head: AtomicU32::new(0),
                producer_tail: AtomicU32::new(0),
                consumer_head: AtomicU32::new(0),
                consumer_tail: AtomicU32::new(0),
                producer_head_lock: SpinLock::new(),
                producer_tail_lock: SpinLock::new(),
                consumer_head_lock: SpinLock::new(),
                consumer_tail_lock: SpinLock::new(),
            },
        );

        let slots = base.add(size_of::<RingHeader>()) as *mut Descriptor;
        for i in 0..cfg.capacity as usize {
            slots.add(i).write(Descriptor::default());
        }
    }
}

/// One step of a blocking wait: mostly a pause hint, with a periodic yield
/// so waiters do not starve the thread that must unblock them on small
/// machines.
#[inline]
fn wait_spin(spins: &mut u32) {
    *spins = spins.wrapping_add(1);
    if *spins % 1024 == 0 {
        std::thread::yield_now();
    } else {
        std::hint::spin_loop();
    }
}
