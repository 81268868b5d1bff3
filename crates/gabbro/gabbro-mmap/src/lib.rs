use memmap2::MmapMut;
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// A file-backed read-write memory mapping.
///
/// Both sides of the request channel mutate the mapped region (producers
/// write descriptors, consumers write replies), so there is no read-only
/// variant: every peer maps the file read-write.
pub struct MmapFileMut {
    _file: File,
    mmap: MmapMut,
}

/// An anonymous read-write mapping, not backed by any file.
///
/// Used for in-process channels, mainly in tests and benchmarks where
/// multiple independent instances are needed without touching the
/// filesystem.
pub struct MmapAnon {
    mmap: MmapMut,
}

impl MmapFileMut {
    /// Create (or truncate) a file of `size_bytes` and map it read-write.
    pub fn create_rw<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Open an existing file and map it read-write, at its current length.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self { _file: file, mmap })
    }

    /// Return raw pointer to start of memory mapped file data
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }
}

impl MmapAnon {
    /// Allocate a zero-filled anonymous mapping of `size_bytes`.
    pub fn new(size_bytes: usize) -> io::Result<Self> {
        let mmap = MmapMut::map_anon(size_bytes)?;
        Ok(Self { mmap })
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_reopen_keeps_length() {
        let path = std::env::temp_dir().join(format!("gabbro_mmap_{}", std::process::id()));
        let created = MmapFileMut::create_rw(&path, 4096).unwrap();
        assert_eq!(created.len(), 4096);
        drop(created);

        let reopened = MmapFileMut::open_rw(&path).unwrap();
        assert_eq!(reopened.len(), 4096);
        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn anon_mapping_is_zeroed() {
        let mut mm = MmapAnon::new(1024).unwrap();
        assert_eq!(mm.len(), 1024);
        let base = mm.as_mut_ptr();
        for i in 0..1024 {
            assert_eq!(unsafe { *base.add(i) }, 0);
        }
    }
}
