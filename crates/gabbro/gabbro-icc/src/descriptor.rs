//! The fixed-size unit of data moved through the ring: one request or reply.

/// What the client is asking the worker to do with `key`/`value`.
///
/// `#[repr(u32)]` keeps the discriminant at a stable 4-byte encoding so the
/// descriptor has the same layout in every process mapping the region.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestKind {
    /// Look up `key`; the reply carries the stored value (0 if absent).
    #[default]
    Get = 0,
    /// Store `(key, value)`; the reply echoes the request.
    Put = 1,
}

/// A request or reply descriptor.
///
/// Plain old data, `#[repr(C)]` and `Copy`, so it can be written into and
/// read out of the memory-mapped ring byte-for-byte. Producers fill in all
/// fields except `ready`; workers write the completed copy back at
/// `reply_offset` and flip `ready` last.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Request key.
    pub key: u32,
    /// Request payload for `Put`; result slot for a `Get` reply.
    pub value: u32,
    /// What to do with `key`/`value`.
    pub kind: RequestKind,
    /// Completion flag: 0 while pending, 1 once the worker has written the
    /// reply. Stored as `u32` so the flag can be poked atomically in place.
    pub ready: u32,
    /// Byte offset from the start of the shared region where the worker
    /// writes the completed descriptor. Must point inside the region's
    /// reply area; the channel validates it before dereferencing.
    pub reply_offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    /// The descriptor layout is shared across processes, so its size and
    /// alignment must never drift. 24 bytes: four u32 fields plus the u64
    /// offset, 8-byte aligned with no internal padding.
    #[test]
    fn descriptor_layout_is_stable() {
        assert_eq!(size_of::<Descriptor>(), 24, "Descriptor layout changed");
        assert_eq!(align_of::<Descriptor>(), 8);
        assert_eq!(size_of::<RequestKind>(), 4);
    }

    #[test]
    fn ready_field_offset_is_stable() {
        // write_reply flips this field in place through an atomic; the
        // offset is part of the wire layout.
        assert_eq!(std::mem::offset_of!(Descriptor, ready), 12);
    }
}
