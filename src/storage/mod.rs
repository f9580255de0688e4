//! Storage backends for the alias registry.
//!
//! [`RegistryStorage`] is the abstract blob interface; [`InMemoryStorage`]
//! is always available and the directory backend is behind the `persistent`
//! feature.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryStorage;
pub use traits::{RegistryStorage, StorageError, StorageId, StorageMetadata};
