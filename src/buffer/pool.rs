use std::collections::HashMap;

// Upper bound on idle buffers kept for any one size
const FREE_LIST_MAX: usize = 64;

/// Source of scratch byte buffers for an endpoint.
pub trait BufferAllocator {
    /// Returns a zeroed buffer of exactly `size` bytes.
    fn acquire(&mut self, size: usize) -> Box<[u8]>;

    /// Returns a buffer previously obtained from `acquire`.
    fn release(&mut self, buffer: Box<[u8]>);
}

/// Allocator which recycles released buffers, keyed by size.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: HashMap<usize, Vec<Box<[u8]>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

impl BufferAllocator for BufferPool {
    fn acquire(&mut self, size: usize) -> Box<[u8]> {
        match self.free.get_mut(&size).and_then(Vec::pop) {
            Some(mut buffer) => {
                buffer.fill(0);
                buffer
            }
            None => vec![0; size].into_boxed_slice(),
        }
    }

    fn release(&mut self, buffer: Box<[u8]>) {
        let list = self.free.entry(buffer.len()).or_default();

        if list.len() < FREE_LIST_MAX {
            list.push(buffer);
        }
    }
}
