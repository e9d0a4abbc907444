//! # deed-escrow-registry
//!
//! The **Asset Registry** collaborator: owns deeds, records delegated
//! transfer authority, and moves ownership. The escrow ledger consumes it
//! only through the [`AssetRegistry`] trait.
//!
//! [`InMemoryRegistry`] is a complete single-process registry used by
//! tests and embedders that have no external registry.

pub mod memory;
pub mod registry;

pub use memory::InMemoryRegistry;
pub use registry::AssetRegistry;
