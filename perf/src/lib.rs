//! Shared helpers for the gabbro benchmarks.

use gabbro_icc::{Descriptor, RequestKind};

/// Unique temp path for a file-backed ring, safe for parallel bench runs.
pub fn temp_shm_path(tag: &str) -> String {
    format!("/tmp/gabbro_perf_{tag}_{}", std::process::id())
}

/// A representative request descriptor for steady-state measurements.
pub fn make_test_descriptor() -> Descriptor {
    Descriptor {
        key: 42,
        value: 7,
        kind: RequestKind::Put,
        ready: 0,
        reply_offset: 0,
    }
}
