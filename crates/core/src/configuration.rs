//! The backup configuration model.
//!
//! A [`Configuration`] owns an ordered list of source locations, an ordered
//! list of destination locations, and a binding from every source path to
//! exactly one destination path. Public operations keep three invariants:
//!
//! 1. every bound source is present in `sources`;
//! 2. every bound destination is present in `destinations`;
//! 3. no destination is left unbound once an operation returns.
//!
//! Paths passed in are normalised (see [`normalize_path`]) before they are
//! compared, so `/mnt/usb/` and `/mnt/./usb` name the same location.
//!
//! The model has no internal locking. Callers that share a configuration
//! across threads must synchronise access themselves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::errors::ConfigurationError;
use crate::location::{normalize_path, Location};
use crate::probe::{AccessProbe, FsProbe};

/// Sync interval used when none is configured.
pub fn default_frequency() -> Duration {
    Duration::days(3)
}

/// A named set of source directories bound to destination directories.
///
/// `P` is the probe used to build locations; it defaults to the real
/// filesystem.
#[derive(Debug, Clone)]
pub struct Configuration<P = FsProbe> {
    name: String,
    frequency: Duration,
    sources: Vec<Location>,
    destinations: Vec<Location>,
    binding: HashMap<PathBuf, PathBuf>,
    all_sources_readable: bool,
    all_destinations_writable: bool,
    probe: P,
}

impl Configuration<FsProbe> {
    /// Create an empty configuration probing the real filesystem.
    pub fn new<S: Into<String>>(name: S, frequency: Duration) -> Result<Self, ConfigurationError> {
        Self::with_probe(name, frequency, FsProbe)
    }
}

impl<P: AccessProbe> Configuration<P> {
    /// Create an empty configuration that builds its locations with `probe`.
    pub fn with_probe<S: Into<String>>(
        name: S,
        frequency: Duration,
        probe: P,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate_name(&name)?;
        validate_frequency(frequency)?;
        Ok(Self::unchecked(name, frequency, probe))
    }

    pub(crate) fn unchecked(name: String, frequency: Duration, probe: P) -> Self {
        Self {
            name,
            frequency,
            sources: Vec::new(),
            destinations: Vec::new(),
            binding: HashMap::new(),
            all_sources_readable: true,
            all_destinations_writable: true,
            probe,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Add `source` and bind it to `dest`, adding `dest` first if it is not
    /// yet a destination.
    ///
    /// Fails with [`ConfigurationError::DuplicateSource`] if the source is
    /// already present; the configuration is left untouched in that case.
    pub fn add_source<S, D>(&mut self, source: S, dest: D) -> Result<(), ConfigurationError>
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        let source_path = normalize_path(source.as_ref())?;
        if self.has_source_path(&source_path) {
            return Err(ConfigurationError::DuplicateSource(source_path));
        }
        let dest_path = normalize_path(dest.as_ref())?;

        let source = Location::new_virtual_with(&source_path, &self.probe)?;
        let new_dest = if self.has_destination_path(&dest_path) {
            None
        } else {
            Some(Location::new_virtual_with(&dest_path, &self.probe)?)
        };

        self.push_source(source);
        if let Some(dest) = new_dest {
            self.push_destination(dest);
        }
        info!(
            config = %self.name,
            source = %source_path.display(),
            destination = %dest_path.display(),
            "bound source"
        );
        self.binding.insert(source_path, dest_path);
        Ok(())
    }

    /// Add a destination. Returns `false` if a destination with the same
    /// path already exists, in which case nothing changes.
    pub fn add_dest<D: AsRef<Path>>(&mut self, dest: D) -> Result<bool, ConfigurationError> {
        let dest_path = normalize_path(dest.as_ref())?;
        if self.has_destination_path(&dest_path) {
            debug!(destination = %dest_path.display(), "destination already present");
            return Ok(false);
        }
        let dest = Location::new_virtual_with(&dest_path, &self.probe)?;
        self.push_destination(dest);
        Ok(true)
    }

    /// Bind `source` to `new_dest`, adding the destination if needed, and
    /// drop the previous destination if nothing else is bound to it.
    pub fn rebind<S, D>(&mut self, source: S, new_dest: D) -> Result<(), ConfigurationError>
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        let source_path = normalize_path(source.as_ref())?;
        let Some(old_dest) = self.binding.get(&source_path).cloned() else {
            return Err(ConfigurationError::UnknownSource(source_path));
        };
        let new_dest = normalize_path(new_dest.as_ref())?;

        self.add_dest(&new_dest)?;
        info!(
            config = %self.name,
            source = %source_path.display(),
            from = %old_dest.display(),
            to = %new_dest.display(),
            "rebound source"
        );
        self.binding.insert(source_path, new_dest);
        self.cleanup_normalized(&old_dest);
        Ok(())
    }

    /// Remove `dest` from the destinations if no source is bound to it.
    /// Returns whether it was removed.
    pub fn cleanup_dest<D: AsRef<Path>>(&mut self, dest: D) -> Result<bool, ConfigurationError> {
        let dest_path = normalize_path(dest.as_ref())?;
        Ok(self.cleanup_normalized(&dest_path))
    }

    fn cleanup_normalized(&mut self, dest: &Path) -> bool {
        if self.binding.values().any(|bound| bound == dest) {
            return false;
        }
        let before = self.destinations.len();
        self.destinations.retain(|loc| loc.path() != dest);
        let removed = self.destinations.len() != before;
        if removed {
            info!(config = %self.name, destination = %dest.display(), "dropped unbound destination");
        }
        removed
    }

    /// Remove a source and its binding, dropping its destination if it is
    /// no longer bound.
    pub fn remove_source<S: AsRef<Path>>(&mut self, source: S) -> Result<Location, ConfigurationError> {
        let source_path = normalize_path(source.as_ref())?;
        let Some(index) = self.sources.iter().position(|loc| loc.path() == source_path) else {
            return Err(ConfigurationError::UnknownSource(source_path));
        };

        let removed = self.sources.remove(index);
        info!(config = %self.name, source = %source_path.display(), "removed source");
        if let Some(dest) = self.binding.remove(&source_path) {
            self.cleanup_normalized(&dest);
        }
        Ok(removed)
    }

    /// Remove a destination that no source is bound to.
    pub fn remove_dest<D: AsRef<Path>>(&mut self, dest: D) -> Result<Location, ConfigurationError> {
        let dest_path = normalize_path(dest.as_ref())?;
        let Some(index) = self.destinations.iter().position(|loc| loc.path() == dest_path) else {
            return Err(ConfigurationError::UnknownDestination(dest_path));
        };

        let bound = self.binding.values().filter(|d| **d == dest_path).count();
        if bound > 0 {
            return Err(ConfigurationError::DestinationInUse {
                destination: dest_path,
                sources: bound,
            });
        }

        info!(config = %self.name, destination = %dest_path.display(), "removed destination");
        Ok(self.destinations.remove(index))
    }

    /// Record a successful backup of `source` now, on both the source and
    /// its destination. Returns the recorded instant.
    ///
    /// The timestamp lives in memory only; [`crate::Profile`] does not
    /// store it.
    pub fn record_sync<S: AsRef<Path>>(&mut self, source: S) -> Result<DateTime<Utc>, ConfigurationError> {
        let source_path = normalize_path(source.as_ref())?;
        let Some(dest_path) = self.binding.get(&source_path).cloned() else {
            return Err(ConfigurationError::UnknownSource(source_path));
        };

        let now = Utc::now();
        for loc in self.sources.iter_mut().filter(|l| l.path() == source_path) {
            loc.touch_at(now);
        }
        for loc in self.destinations.iter_mut().filter(|l| l.path() == dest_path) {
            loc.touch_at(now);
        }
        debug!(source = %source_path.display(), at = %now, "recorded sync");
        Ok(now)
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) -> Result<(), ConfigurationError> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    /// Change the sync interval. Must be a positive whole number of seconds.
    pub fn set_frequency(&mut self, frequency: Duration) -> Result<(), ConfigurationError> {
        validate_frequency(frequency)?;
        self.frequency = frequency;
        Ok(())
    }

    pub(crate) fn push_binding(&mut self, source: Location, dest: Location) {
        let source_path = source.path().to_path_buf();
        let dest_path = dest.path().to_path_buf();
        self.push_source(source);
        if !self.has_destination_path(&dest_path) {
            self.push_destination(dest);
        }
        self.binding.insert(source_path, dest_path);
    }

    fn push_source(&mut self, source: Location) {
        self.all_sources_readable &= source.check_read();
        self.sources.push(source);
    }

    fn push_destination(&mut self, dest: Location) {
        self.all_destinations_writable &= dest.check_write();
        debug!(config = %self.name, destination = %dest.path().display(), "added destination");
        self.destinations.push(dest);
    }
}

impl<P> Configuration<P> {
    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn sources(&self) -> &[Location] {
        &self.sources
    }

    pub fn destinations(&self) -> &[Location] {
        &self.destinations
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn has_source<S: AsRef<Path>>(&self, source: S) -> bool {
        normalize_path(source.as_ref())
            .map(|p| self.has_source_path(&p))
            .unwrap_or(false)
    }

    pub fn has_destination<D: AsRef<Path>>(&self, dest: D) -> bool {
        normalize_path(dest.as_ref())
            .map(|p| self.has_destination_path(&p))
            .unwrap_or(false)
    }

    fn has_source_path(&self, path: &Path) -> bool {
        self.sources.iter().any(|loc| loc.path() == path)
    }

    fn has_destination_path(&self, path: &Path) -> bool {
        self.destinations.iter().any(|loc| loc.path() == path)
    }

    /// Destination path bound to `source`, if the source is known.
    pub fn destination_of<S: AsRef<Path>>(&self, source: S) -> Option<&Path> {
        let source_path = normalize_path(source.as_ref()).ok()?;
        self.binding.get(&source_path).map(PathBuf::as_path)
    }

    /// Sources currently bound to `dest`, in source order.
    pub fn sources_bound_to<D: AsRef<Path>>(&self, dest: D) -> Vec<&Location> {
        let Ok(dest_path) = normalize_path(dest.as_ref()) else {
            return Vec::new();
        };
        self.sources
            .iter()
            .filter(|src| self.binding.get(src.path()).is_some_and(|d| *d == dest_path))
            .collect()
    }

    pub(crate) fn bound_path(&self, source: &Path) -> Option<&Path> {
        self.binding.get(source).map(PathBuf::as_path)
    }

    /// `(source, destination)` pairs in source order.
    pub fn bindings(&self) -> impl Iterator<Item = (&Location, &Location)> + '_ {
        self.sources.iter().filter_map(move |src| {
            let dest_path = self.binding.get(src.path())?;
            let dest = self.destinations.iter().find(|d| d.path() == dest_path)?;
            Some((src, dest))
        })
    }

    /// Cumulative flag: `false` once any source that was unreadable when
    /// added has been part of this configuration, even if it was removed
    /// since. See [`check_all_readable`](Self::check_all_readable) for an
    /// answer about the current sources.
    pub fn all_sources_readable(&self) -> bool {
        self.all_sources_readable
    }

    /// Cumulative flag for destinations; see
    /// [`all_sources_readable`](Self::all_sources_readable).
    pub fn all_destinations_writable(&self) -> bool {
        self.all_destinations_writable
    }

    /// `true` if every current source reported readable. Vacuously true
    /// when there are no sources.
    pub fn check_all_readable(&self) -> bool {
        self.sources.iter().all(Location::check_read)
    }

    /// `true` if every current destination reported writable. Vacuously
    /// true when there are no destinations.
    pub fn check_all_writable(&self) -> bool {
        self.destinations.iter().all(Location::check_write)
    }
}

impl<P> PartialEq for Configuration<P> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.frequency == other.frequency
            && self.sources == other.sources
            && self.destinations == other.destinations
            && self.binding == other.binding
    }
}

impl<P> std::fmt::Display for Configuration<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Configuration '{}'", self.name)?;
        writeln!(f, "  Frequency: {}", format_frequency(self.frequency))?;
        writeln!(f, "  Sources:")?;
        for src in &self.sources {
            match self.binding.get(src.path()) {
                Some(dest) => writeln!(f, "    {src} -> {}", dest.display())?,
                None => writeln!(f, "    {src}")?,
            }
        }
        writeln!(f, "  Destinations:")?;
        for dest in &self.destinations {
            writeln!(f, "    {dest}")?;
        }
        if self.all_sources_readable {
            writeln!(f, "  All sources readable")?;
        } else {
            writeln!(f, "  SOME SOURCES UNREADABLE")?;
        }
        if self.all_destinations_writable {
            write!(f, "  All destinations writable")
        } else {
            write!(f, "  SOME DESTINATIONS NOT WRITABLE")
        }
    }
}

/// Render a sync interval compactly, e.g. `3d`, `1h 30m`, `45s`.
pub fn format_frequency(frequency: Duration) -> String {
    let total = frequency.num_seconds();
    if total <= 0 {
        return format!("{total}s");
    }
    let units = [
        (total / 86_400, "d"),
        ((total % 86_400) / 3_600, "h"),
        ((total % 3_600) / 60, "m"),
        (total % 60, "s"),
    ];
    units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_name(name: &str) -> Result<(), ConfigurationError> {
    if name.trim().is_empty() {
        return Err(ConfigurationError::InvalidArgument {
            field: "name".into(),
            detail: "configuration name must not be empty".into(),
        });
    }
    Ok(())
}

fn validate_frequency(frequency: Duration) -> Result<(), ConfigurationError> {
    if frequency <= Duration::zero() {
        return Err(ConfigurationError::InvalidArgument {
            field: "frequency".into(),
            detail: format!("frequency must be positive, got {}s", frequency.num_seconds()),
        });
    }
    if frequency.subsec_nanos() != 0 {
        return Err(ConfigurationError::InvalidArgument {
            field: "frequency".into(),
            detail: format!(
                "frequency must be a whole number of seconds, got {}ms",
                frequency.num_milliseconds()
            ),
        });
    }
    Ok(())
}
