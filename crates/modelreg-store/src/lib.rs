//! modelreg Store - Registry store trait and implementations
//!
//! The store is the single source of truth for model versions, aliases and
//! the alias change log:
//!
//! - **RegistryStore**: async trait every backend implements
//! - **ModelDocument**: per-model state; all invariants are enforced here, so
//!   every backend applies mutations the same way
//! - **InMemoryRegistryStore**: for tests and embedding
//! - **FileRegistryStore**: one JSON document per model, guarded by lock files
//!   so separate processes can share a registry directory
//!
//! Writes on one model are linearizable. Reads return an immutable snapshot of
//! a model's document and never observe a half-applied write.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod document;
pub mod error;
pub mod file;
mod lock;
pub mod memory;
pub mod store;

// Re-exports
pub use document::{AliasPrecondition, ModelDocument, FORMAT_VERSION};
pub use error::{Result, StoreError};
pub use file::{FileRegistryStore, LockOptions};
pub use memory::InMemoryRegistryStore;
pub use store::RegistryStore;
