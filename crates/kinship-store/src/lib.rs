//! Kinship Store - Where contact documents live
//!
//! The sync engine never touches storage directly; it reads and writes
//! whole documents through the [`ContactStore`] trait.

pub mod error;
pub mod memory;
pub mod traits;
pub mod vault;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::ContactStore;
pub use vault::VaultStore;
