//! Synchronization primitives that live inside the shared region.
//!
//! std mutexes cannot be placed in a memory mapping shared between
//! processes, so cursor reservation uses a minimal test-and-set spinlock
//! built on `AtomicU32`. The zero-initialized state is "unlocked", which
//! means a freshly created (zero-filled) mapping starts with all locks
//! released and no lock "initialization" step can fail.

use std::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// A test-and-set spinlock usable across process boundaries.
///
/// `#[repr(transparent)]` pins the layout to a single `u32` word so the
/// lock can be embedded in the `#[repr(C)]` ring header.
#[repr(transparent)]
pub struct SpinLock(AtomicU32);

impl SpinLock {
    pub const fn new() -> Self {
        SpinLock(AtomicU32::new(UNLOCKED))
    }

    /// Acquires the lock, spinning until it is available.
    ///
    /// Critical sections guarded by this lock are a handful of loads and
    /// one store (cursor compare-and-advance), so spinning is cheap; the
    /// lock is never held across a full/empty wait.
    pub fn lock(&self) -> SpinGuard<'_> {
        loop {
            if self
                .0
                .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinGuard(self);
            }
            // Wait for the holder to release before retrying the CAS, so
            // contending threads don't ping-pong the cache line.
            while self.0.load(Ordering::Relaxed) == LOCKED {
                std::hint::spin_loop();
            }
        }
    }
}

/// RAII guard: releases the lock on drop.
pub struct SpinGuard<'a>(&'a SpinLock);

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.store(UNLOCKED, Ordering::Release);
    }
}
