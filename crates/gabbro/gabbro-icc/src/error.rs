use thiserror::Error;

/// Errors surfaced when constructing a channel or writing a reply.
///
/// `submit` and `receive` themselves never fail: a full or empty ring
/// blocks the caller instead of returning an error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to map shared region")]
    Io(#[from] std::io::Error),

    #[error("shared region is not a request ring (bad magic {found:#018x})")]
    BadMagic { found: u64 },

    #[error("request ring format version mismatch (expected {expected}, found {found})")]
    BadVersion { expected: u64, found: u64 },

    #[error("invalid ring capacity {0} (must be at least 2)")]
    BadCapacity(u64),

    #[error("descriptor size mismatch (expected {expected}, found {found})")]
    ElemSizeMismatch { expected: u64, found: u64 },

    #[error("shared region too small ({got} bytes, ring needs {needed})")]
    RegionTooSmall { needed: usize, got: usize },

    #[error("ring cursor holds {value}, outside [0, {capacity})")]
    CursorOutOfRange { value: u32, capacity: u64 },

    #[error("reply offset {offset} outside the reply area [{area_start}, {area_end})")]
    ReplyOutOfBounds {
        offset: u64,
        area_start: u64,
        area_end: u64,
    },

    #[error("reply offset {0} is not aligned for a descriptor")]
    ReplyMisaligned(u64),
}
