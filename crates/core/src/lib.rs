//! backbind core library.
//!
//! This crate models a backup configuration: source directories bound to
//! destination directories, a sync frequency, and the reconciliation that
//! narrows a configuration down to the bindings usable right now. It also
//! provides the TOML profile format used to persist configurations.
//!
//! Copying files and scheduling syncs are left to the caller.

pub mod configuration;
pub mod errors;
pub mod location;
pub mod probe;
pub mod profile;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience.
pub use configuration::Configuration;
pub use location::{Location, LocationKind};
pub use probe::{AccessProbe, FsProbe};
pub use profile::Profile;
pub use reconcile::{Exclusion, ExclusionReason, Reconciliation};
