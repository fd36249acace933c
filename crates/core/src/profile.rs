//! TOML profile files.
//!
//! A profile is the on-disk form of a [`Configuration`]: a `[backup]` section
//! with the name and sync frequency, followed by one
//! `[[bindings]]` table per source.
//!
//! ```toml
//! [backup]
//! name = "workstation"
//! frequency_secs = 259200
//!
//! [[bindings]]
//! source = "/home/user/documents"
//! destination = "/mnt/backup/documents"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::configuration::{default_frequency, Configuration};
use crate::errors::ProfileError;
use crate::location::normalize_path;
use crate::probe::{AccessProbe, FsProbe};

// ---------------------------------------------------------------------------
// Top-level profile
// ---------------------------------------------------------------------------

/// A backup configuration as stored in a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub backup: BackupSection,

    /// Source/destination pairs, in source order.
    #[serde(default)]
    pub bindings: Vec<BindingEntry>,
}

/// The `[backup]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSection {
    /// Configuration name.
    pub name: String,

    /// Seconds between syncs (default 3 days).
    #[serde(default = "default_frequency_secs")]
    pub frequency_secs: i64,
}

fn default_frequency_secs() -> i64 {
    default_frequency().num_seconds()
}

/// One `[[bindings]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

// ---------------------------------------------------------------------------
// Loading, validating, saving
// ---------------------------------------------------------------------------

impl Profile {
    /// Load a [`Profile`] from a TOML file. Does not validate it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading profile");

        if !path.exists() {
            return Err(ProfileError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let profile: Profile =
            toml::from_str(&contents).map_err(|e| ProfileError::ParseError(e.to_string()))?;

        debug!(bindings = profile.bindings.len(), "profile parsed successfully");
        Ok(profile)
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.backup.name.trim().is_empty() {
            return Err(invalid("backup.name", "name must not be empty"));
        }
        self.frequency()?;

        let mut seen = HashSet::new();
        for (i, entry) in self.bindings.iter().enumerate() {
            if entry.source.as_os_str().is_empty() {
                return Err(invalid(&format!("bindings[{i}].source"), "source must not be empty"));
            }
            if entry.destination.as_os_str().is_empty() {
                return Err(invalid(
                    &format!("bindings[{i}].destination"),
                    "destination must not be empty",
                ));
            }
            let source = normalize_path(&entry.source).map_err(|e| {
                invalid(&format!("bindings[{i}].source"), &e.to_string())
            })?;
            if !seen.insert(source) {
                return Err(invalid(
                    &format!("bindings[{i}].source"),
                    &format!("duplicate source '{}'", entry.source.display()),
                ));
            }
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let profile = Self::load_from_file(path)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Write the profile as TOML, creating parent directories as needed.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProfileError> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).map_err(|e| ProfileError::SerializeError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        info!(path = %path.display(), bindings = self.bindings.len(), "saved profile");
        Ok(())
    }

    /// The sync interval, which must be positive and representable.
    pub fn frequency(&self) -> Result<Duration, ProfileError> {
        let secs = self.backup.frequency_secs;
        if secs <= 0 {
            return Err(invalid("backup.frequency_secs", "frequency must be > 0"));
        }
        Duration::try_seconds(secs).ok_or_else(|| {
            invalid(
                "backup.frequency_secs",
                &format!("frequency of {secs}s is out of range"),
            )
        })
    }

    /// Build the configuration this profile describes, probing the real
    /// filesystem.
    pub fn into_configuration(self) -> Result<Configuration, ProfileError> {
        self.into_configuration_with(FsProbe)
    }

    /// Build the configuration this profile describes, adding bindings in
    /// file order.
    pub fn into_configuration_with<A: AccessProbe>(
        self,
        probe: A,
    ) -> Result<Configuration<A>, ProfileError> {
        let frequency = self.frequency()?;
        let mut config = Configuration::with_probe(self.backup.name, frequency, probe)?;
        for entry in self.bindings {
            config.add_source(&entry.source, &entry.destination)?;
        }
        Ok(config)
    }

    /// Capture a configuration as a profile, in source order.
    pub fn from_configuration<A>(config: &Configuration<A>) -> Self {
        let bindings = config
            .bindings()
            .map(|(source, dest)| BindingEntry {
                source: source.path().to_path_buf(),
                destination: dest.path().to_path_buf(),
            })
            .collect();

        Self {
            backup: BackupSection {
                name: config.name().to_string(),
                frequency_secs: config.frequency().num_seconds(),
            },
            bindings,
        }
    }

    /// Commented starter profile.
    pub fn default_template() -> &'static str {
        r#"# backbind profile
# Each [[bindings]] entry backs one source directory up into one destination.
# Several sources may share a destination.

[backup]
name = "workstation"
# Seconds between syncs (259200 = 3 days).
frequency_secs = 259200

[[bindings]]
source = "/home/user/documents"
destination = "/mnt/backup/documents"

[[bindings]]
source = "/home/user/photos"
destination = "/mnt/backup/media"
"#
    }
}

fn invalid(field: &str, detail: &str) -> ProfileError {
    ProfileError::InvalidValue {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}
