mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
