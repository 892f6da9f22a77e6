//! Resolved descriptor model.
//!
//! # Responsibility
//! - Define the canonical resolved shape consumed by packaging tools.
//! - Own the invariant checks applied after load and after mutation.
//!
//! # Invariants
//! - A value of these types is produced only by a successful load or by
//!   tooling that calls `PackageDescriptor::validate()` afterwards.

pub mod descriptor;
pub mod requirement;
