//! Grouped columnar store
//!
//! A dataset is partitioned by a group key and laid out per group: numeric
//! columns are packed row-major into one block, every datetime or text
//! column gets its own array, and each group carries an ordering array used
//! by the splitter. Reads select arbitrary row positions without loading a
//! whole group.
//!
//! ```text
//! <root>/metadata.json
//! <root>/groups/g00000/numeric.bin   [rows, numeric columns]
//! <root>/groups/g00000/c000.bin      one non-numeric column
//! <root>/groups/g00000/orderby.bin   [rows]
//! ```

pub mod backends;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod grouped;
pub mod traits;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use backends::{FileBackend, MemoryBackend};
pub use builder::StoreBuilder;
pub use config::{NumericDtype, StoreBackendKind, StoreConfig};
pub use error::{StorageError, StorageResult};
pub use factory::{create_backend, FileStoreProvider, SharedStoreProvider};
pub use grouped::GroupedColumnStore;
pub use traits::{ArrayBackend, StoreProvider};
pub use transport::{DirectoryTransport, StoreTransport};
pub use types::{ArrayDescriptor, ElementType, GroupMetadata, StoreMetadata};
