//! Physical device models for the microgrid.

/// Battery storage model with a pure SOC transition.
pub mod storage;

// Re-export the main types for convenience
pub use storage::StorageDevice;
pub use storage::StorageTransition;
