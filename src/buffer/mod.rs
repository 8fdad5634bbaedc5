mod pool;
mod sequence;

pub use pool::BufferAllocator;
pub use pool::BufferPool;

pub use sequence::SequenceBuffer;
