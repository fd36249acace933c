//! Error types for the backbind core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Reachability problems found while reconciling a configuration are not
//! errors: they are reported as data in [`crate::reconcile::Reconciliation`].

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

// ---------------------------------------------------------------------------
// Location errors
// ---------------------------------------------------------------------------

/// Errors from constructing a [`crate::location::Location`].
#[derive(Debug, Error)]
pub enum LocationError {
    /// A concrete location was requested for a path that is missing or is
    /// not a directory.
    #[error("location not found or not a directory: '{}'", .0.display())]
    NotFound(PathBuf),

    /// A relative path could not be resolved because the working directory
    /// is unavailable.
    #[error("cannot resolve relative path: current directory unavailable: {0}")]
    CurrentDir(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from mutating a [`crate::configuration::Configuration`].
///
/// These indicate API misuse and are always surfaced to the caller.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A name or frequency value was rejected.
    #[error("invalid argument for '{field}': {detail}")]
    InvalidArgument { field: String, detail: String },

    /// The source path is already part of the configuration.
    #[error("source already configured: '{}'", .0.display())]
    DuplicateSource(PathBuf),

    /// The source path is not part of the configuration.
    #[error("unknown source: '{}'", .0.display())]
    UnknownSource(PathBuf),

    /// The destination path is not part of the configuration.
    #[error("unknown destination: '{}'", .0.display())]
    UnknownDestination(PathBuf),

    /// The destination is still bound to one or more sources.
    #[error("destination '{}' is still bound to {sources} source(s)", .destination.display())]
    DestinationInUse { destination: PathBuf, sources: usize },

    /// Building a location for the operation failed.
    #[error(transparent)]
    Location(#[from] LocationError),
}

// ---------------------------------------------------------------------------
// Profile errors
// ---------------------------------------------------------------------------

/// Errors from loading, validating and saving profile files.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Profile file not found.
    #[error("profile file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("profile parse error: {0}")]
    ParseError(String),

    /// TOML serialization error.
    #[error("profile serialize error: {0}")]
    SerializeError(String),

    /// A profile value is invalid.
    #[error("invalid profile value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Building the configuration described by the profile failed.
    #[error("profile describes an invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Generic I/O error reading or writing the profile file.
    #[error("profile I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
