use crate::virtual_machine::errors::VMError;
use std::collections::HashMap;

/// Size of one lazily committed memory page.
pub(super) const PAGE_SIZE: usize = 4096;

/// Byte-addressable VM memory with a fixed capacity.
///
/// Pages are committed on first write, so a large address space costs nothing
/// until it is used. Bytes of uncommitted pages read as zero.
///
/// Every public access checks `offset + len <= capacity` before touching any
/// page; a failed check leaves memory unchanged.
pub(super) struct Memory {
    capacity: u64,
    pages: HashMap<u64, Box<[u8; PAGE_SIZE]>>,
}

impl Memory {
    pub(super) fn new(capacity: u64) -> Self {
        Self {
            capacity,
            pages: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(super) fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of pages that have been written to.
    #[cfg(test)]
    pub(super) fn committed_pages(&self) -> usize {
        self.pages.len()
    }

    /// Validates an access of `len` bytes starting at `offset`.
    ///
    /// Returns [`VMError::MemoryOutOfBounds`] if the range ends past capacity
    /// or its end overflows `u64`.
    pub(super) fn check_bounds(&self, offset: u64, len: u64) -> Result<(), VMError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(VMError::MemoryOutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            }),
        }
    }

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    pub(super) fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), VMError> {
        self.check_bounds(offset, buf.len() as u64)?;

        let mut done = 0;
        while done < buf.len() {
            let (page, within, n) = Self::chunk(offset, done, buf.len());
            match self.pages.get(&page) {
                Some(frame) => buf[done..done + n].copy_from_slice(&frame[within..within + n]),
                None => buf[done..done + n].fill(0),
            }
            done += n;
        }
        Ok(())
    }

    /// Writes `data` starting at `offset`, committing pages as needed.
    pub(super) fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), VMError> {
        self.check_bounds(offset, data.len() as u64)?;

        let mut done = 0;
        while done < data.len() {
            let (page, within, n) = Self::chunk(offset, done, data.len());
            let frame = self
                .pages
                .entry(page)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
            frame[within..within + n].copy_from_slice(&data[done..done + n]);
            done += n;
        }
        Ok(())
    }

    /// Reads a big-endian word at `offset`.
    pub(super) fn read_u64(&self, offset: u64) -> Result<u64, VMError> {
        let mut word = [0u8; 8];
        self.read(offset, &mut word)?;
        Ok(u64::from_be_bytes(word))
    }

    /// Writes `value` big-endian at `offset`.
    pub(super) fn write_u64(&mut self, offset: u64, value: u64) -> Result<(), VMError> {
        self.write(offset, &value.to_be_bytes())
    }

    /// Returns a copy of `len` bytes starting at `offset`.
    pub(super) fn slice(&self, offset: u64, len: u64) -> Result<Vec<u8>, VMError> {
        self.check_bounds(offset, len)?;
        let size = usize::try_from(len).map_err(|_| VMError::MemoryOutOfBounds {
            offset,
            len,
            capacity: self.capacity,
        })?;
        let mut out = vec![0u8; size];
        self.read(offset, &mut out)?;
        Ok(out)
    }

    /// Drops every committed page.
    pub(super) fn clear(&mut self) {
        self.pages.clear();
    }

    /// Splits the access at `offset + done` into (page index, offset within page, chunk length).
    fn chunk(offset: u64, done: usize, total: usize) -> (u64, usize, usize) {
        let addr = offset + done as u64;
        let page = addr / PAGE_SIZE as u64;
        let within = (addr % PAGE_SIZE as u64) as usize;
        let n = (PAGE_SIZE - within).min(total - done);
        (page, within, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_reads_zero() {
        let memory = Memory::new(1 << 16);
        assert_eq!(memory.read_u64(128).unwrap(), 0);
        assert_eq!(memory.committed_pages(), 0);
    }

    #[test]
    fn write_read_word_big_endian() {
        let mut memory = Memory::new(64);
        memory.write_u64(0, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(memory.slice(0, 8).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(memory.read_u64(0).unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn access_across_page_boundary() {
        let mut memory = Memory::new(3 * PAGE_SIZE as u64);
        let offset = PAGE_SIZE as u64 - 3;
        memory.write_u64(offset, u64::MAX - 1).unwrap();
        assert_eq!(memory.committed_pages(), 2);
        assert_eq!(memory.read_u64(offset).unwrap(), u64::MAX - 1);
    }

    #[test]
    fn bounds_exact_fit_and_one_past() {
        let mut memory = Memory::new(16);
        assert!(memory.write_u64(8, 1).is_ok());
        assert_eq!(
            memory.write_u64(9, 1),
            Err(VMError::MemoryOutOfBounds {
                offset: 9,
                len: 8,
                capacity: 16
            })
        );
        assert!(memory.check_bounds(16, 0).is_ok());
        assert!(memory.check_bounds(16, 1).is_err());
    }

    #[test]
    fn bounds_overflowing_end() {
        let memory = Memory::new(16);
        assert!(matches!(
            memory.check_bounds(u64::MAX, 8),
            Err(VMError::MemoryOutOfBounds { .. })
        ));
        assert!(memory.slice(0, u64::MAX).is_err());
    }

    #[test]
    fn failed_write_commits_nothing() {
        let mut memory = Memory::new(8);
        assert!(memory.write(4, &[1; 8]).is_err());
        assert_eq!(memory.committed_pages(), 0);
    }

    #[test]
    fn large_address_space_is_lazy() {
        let mut memory = Memory::new(1 << 32);
        memory.write((1 << 32) - 8, &[0xAB; 8]).unwrap();
        assert_eq!(memory.committed_pages(), 1);
        assert_eq!(memory.slice((1 << 32) - 8, 8).unwrap(), vec![0xAB; 8]);
    }

    #[test]
    fn clear_drops_pages() {
        let mut memory = Memory::new(64);
        memory.write(0, &[9]).unwrap();
        memory.clear();
        assert_eq!(memory.committed_pages(), 0);
        assert_eq!(memory.slice(0, 1).unwrap(), vec![0]);
    }
}
