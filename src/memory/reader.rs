//! Zero-padding reads of a virtual address range

use std::io::{self, Read};

use crate::core::types::Address;
use crate::snapshot::AddressSpace;

/// Streams `len` bytes starting at a virtual address
///
/// Pages that are not resident read as zeros, so the stream always yields
/// exactly `len` bytes.
pub struct RegionReader<'a> {
    space: &'a dyn AddressSpace,
    next: u64,
    remaining: u64,
}

impl<'a> RegionReader<'a> {
    pub fn new(space: &'a dyn AddressSpace, start: Address, len: u64) -> Self {
        RegionReader {
            space,
            next: start.as_u64(),
            remaining: len,
        }
    }

    /// Bytes left in the stream
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Reads the whole range into memory
    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(usize::try_from(self.remaining).unwrap_or(0));
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for RegionReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let page_size = self.space.page_size().max(1);
        let to_boundary = page_size - self.next % page_size;
        let n = (buf.len() as u64).min(self.remaining).min(to_boundary) as usize;

        self.space.zread(self.next, &mut buf[..n]);
        self.next = self.next.saturating_add(n as u64);
        self.remaining -= n as u64;
        Ok(n)
    }
}
