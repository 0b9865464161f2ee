//! Array backend implementations

pub mod file;
pub mod memory;

pub use file::{FileBackend, METADATA_FILE};
pub use memory::MemoryBackend;
