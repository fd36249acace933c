//! Source and destination locations.
//!
//! A [`Location`] is a normalised absolute path plus the read/write verdicts
//! obtained from an [`AccessProbe`] when it was built. The verdicts are a
//! snapshot: they are never re-queried, so a location built while a drive was
//! mounted keeps reporting it readable after the drive is gone. Build a fresh
//! location to get a fresh answer.
//!
//! Two kinds exist:
//!
//! | Kind | Construction requirement |
//! |------|--------------------------|
//! | [`LocationKind::Virtual`] | none, the path may be absent |
//! | [`LocationKind::Concrete`] | path exists and is a directory |

use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::errors::LocationError;
use crate::probe::{AccessProbe, FsProbe};

/// Whether a location was verified to exist when it was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// May reference a path that is currently unreachable.
    Virtual,
    /// Verified to be an existing directory at construction.
    Concrete,
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Virtual => write!(f, "virtual"),
            Self::Concrete => write!(f, "concrete"),
        }
    }
}

/// A directory used as a backup source or destination.
///
/// Equality and hashing consider only the normalised path.
#[derive(Debug, Clone, Serialize)]
pub struct Location {
    path: PathBuf,
    kind: LocationKind,
    readable: bool,
    writable: bool,
    last_sync: Option<DateTime<Utc>>,
}

impl Location {
    /// Build a virtual location using the real filesystem.
    pub fn new_virtual<P: AsRef<Path>>(path: P) -> Result<Self, LocationError> {
        Self::new_virtual_with(path, &FsProbe)
    }

    /// Build a concrete location using the real filesystem.
    pub fn new_concrete<P: AsRef<Path>>(path: P) -> Result<Self, LocationError> {
        Self::new_concrete_with(path, &FsProbe)
    }

    /// Build a virtual location, asking `probe` for its access flags.
    ///
    /// Fails only when a relative path cannot be resolved.
    pub fn new_virtual_with<P, A>(path: P, probe: &A) -> Result<Self, LocationError>
    where
        P: AsRef<Path>,
        A: AccessProbe + ?Sized,
    {
        let path = normalize_path(path.as_ref())?;
        Ok(Self::probed(path, LocationKind::Virtual, probe))
    }

    /// Build a concrete location, asking `probe` for existence and access.
    ///
    /// Fails with [`LocationError::NotFound`] unless the path is an existing
    /// directory.
    pub fn new_concrete_with<P, A>(path: P, probe: &A) -> Result<Self, LocationError>
    where
        P: AsRef<Path>,
        A: AccessProbe + ?Sized,
    {
        let path = normalize_path(path.as_ref())?;
        if !probe.is_dir(&path) {
            debug!(path = %path.display(), "location is missing or not a directory");
            return Err(LocationError::NotFound(path));
        }
        Ok(Self::probed(path, LocationKind::Concrete, probe))
    }

    fn probed<A: AccessProbe + ?Sized>(path: PathBuf, kind: LocationKind, probe: &A) -> Self {
        let readable = probe.can_read(&path);
        let writable = probe.can_write(&path);
        debug!(
            path = %path.display(),
            %kind,
            readable,
            writable,
            "probed location"
        );
        Self {
            path,
            kind,
            readable,
            writable,
            last_sync: None,
        }
    }

    /// Normalised absolute path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Read permission as probed at construction.
    pub fn check_read(&self) -> bool {
        self.readable
    }

    /// Write permission as probed at construction.
    pub fn check_write(&self) -> bool {
        self.writable
    }

    /// `true` if the location was both readable and writable.
    pub fn check_all(&self) -> bool {
        self.readable && self.writable
    }

    /// When this location was last used by a successful backup.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Record a successful use right now.
    pub fn touch(&mut self) {
        self.last_sync = Some(Utc::now());
    }

    /// Record a successful use at `at`.
    pub fn touch_at(&mut self, at: DateTime<Utc>) {
        self.last_sync = Some(at);
    }

    /// `true` if both locations refer to the same normalised path.
    pub fn same_location(&self, other: &Location) -> bool {
        self.path == other.path
    }

    /// `true` if `path`, once normalised, is this location's path.
    pub fn is_path<P: AsRef<Path>>(&self, path: P) -> bool {
        normalize_path(path.as_ref())
            .map(|p| p == self.path)
            .unwrap_or(false)
    }

    /// Demote to a virtual location, keeping the probed flags and timestamp.
    pub fn into_virtual(self) -> Self {
        Self {
            kind: LocationKind::Virtual,
            ..self
        }
    }

    pub(crate) fn inherit_last_sync(&mut self, from: &Location) {
        self.last_sync = from.last_sync;
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.same_location(other)
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let read = if self.readable { 'r' } else { '-' };
        let write = if self.writable { 'w' } else { '-' };
        write!(f, "{} [{read}{write}]", self.path.display())
    }
}

/// Make `path` absolute against the current directory and collapse `.` and
/// `..` components lexically. Symlinks are not resolved and the path need not
/// exist.
pub fn normalize_path(path: &Path) -> Result<PathBuf, LocationError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(LocationError::CurrentDir)?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedProbe;

    #[test]
    fn test_virtual_accepts_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("unplugged");

        let loc = Location::new_virtual(&missing).unwrap();
        assert_eq!(loc.path(), missing.as_path());
        assert_eq!(loc.kind(), LocationKind::Virtual);
        assert!(!loc.check_read());
        assert!(!loc.check_write());
        assert!(loc.last_sync().is_none());
    }

    #[test]
    fn test_concrete_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("unplugged");
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(
            Location::new_concrete(&missing),
            Err(LocationError::NotFound(ref p)) if p == &missing
        ));
        assert!(matches!(
            Location::new_concrete(&file),
            Err(LocationError::NotFound(_))
        ));

        let loc = Location::new_concrete(dir.path()).unwrap();
        assert_eq!(loc.kind(), LocationKind::Concrete);
        assert!(loc.check_read());
    }

    #[test]
    fn test_flags_come_from_probe() {
        let probe = FixedProbe::new()
            .with_dir("/media/ro", true, false)
            .with_dir("/media/rw", true, true);

        let ro = Location::new_concrete_with("/media/ro", &probe).unwrap();
        assert!(ro.check_read());
        assert!(!ro.check_write());
        assert!(!ro.check_all());

        let rw = Location::new_virtual_with("/media/rw", &probe).unwrap();
        assert!(rw.check_all());
    }

    #[test]
    fn test_flags_are_snapshotted() {
        let probe = FixedProbe::new().with_dir("/media/usb", true, true);
        let loc = Location::new_virtual_with("/media/usb", &probe).unwrap();

        probe.unplug("/media/usb");
        assert!(loc.check_read());
        assert!(Location::new_concrete_with("/media/usb", &probe).is_err());
    }

    #[test]
    fn test_normalize_collapses_dots() {
        let normalized = normalize_path(Path::new("/a/b/../c/./d/")).unwrap();
        assert_eq!(normalized, PathBuf::from("/a/c/d"));

        let root = normalize_path(Path::new("/../..")).unwrap();
        assert_eq!(root, PathBuf::from("/"));
    }

    #[test]
    fn test_relative_path_resolves_against_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let loc = Location::new_virtual("backups/./daily").unwrap();
        assert_eq!(loc.path(), cwd.join("backups").join("daily").as_path());
        assert!(loc.is_path(cwd.join("backups/daily")));
    }

    #[test]
    fn test_equality_is_by_path() {
        let probe = FixedProbe::new().with_dir("/data", true, true);
        let a = Location::new_concrete_with("/data", &probe).unwrap();
        let b = Location::new_virtual_with("/data/sub/..", &probe).unwrap();
        assert_eq!(a, b);
        assert!(a.same_location(&b));
        assert!(a.is_path("/data/"));
        assert!(!a.is_path("/data2"));
    }

    #[test]
    fn test_touch_captures_call_time() {
        let mut first = Location::new_virtual("/nowhere/a").unwrap();
        let mut second = Location::new_virtual("/nowhere/b").unwrap();

        first.touch();
        std::thread::sleep(std::time::Duration::from_millis(5));
        second.touch();

        assert!(second.last_sync().unwrap() > first.last_sync().unwrap());
    }

    #[test]
    fn test_touch_at_records_given_time() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut loc = Location::new_virtual("/nowhere").unwrap();
        loc.touch_at(at);
        assert_eq!(loc.last_sync(), Some(at));
    }

    #[test]
    fn test_into_virtual_keeps_flags() {
        let probe = FixedProbe::new().with_dir("/data", true, false);
        let mut loc = Location::new_concrete_with("/data", &probe).unwrap();
        loc.touch();
        let stamp = loc.last_sync();

        let demoted = loc.into_virtual();
        assert_eq!(demoted.kind(), LocationKind::Virtual);
        assert!(demoted.check_read());
        assert!(!demoted.check_write());
        assert_eq!(demoted.last_sync(), stamp);
    }

    #[test]
    fn test_display_shows_flags() {
        let probe = FixedProbe::new().with_dir("/data", true, false);
        let loc = Location::new_virtual_with("/data", &probe).unwrap();
        assert_eq!(loc.to_string(), "/data [r-]");
    }
}
