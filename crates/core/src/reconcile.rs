//! Working-subset reconciliation.
//!
//! Backup media come and go between runs. Instead of failing a whole job
//! because one drive is unplugged, [`Configuration::reconcile`] re-probes
//! every location and builds a new configuration holding only the bindings
//! whose source is readable *and* whose destination is writable right now.
//!
//! # Decision model
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | Source missing or not a directory | excluded, `Missing` |
//! | Source not readable | excluded, `Unreadable` |
//! | Destination missing or not a directory | excluded, `Missing` |
//! | Destination not writable | excluded, `Unwritable` |
//! | Good source bound to an excluded destination | excluded, `DestinationUnavailable` |
//! | Otherwise | kept |
//!
//! Reconciliation never fails and never mutates the original configuration.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::configuration::Configuration;
use crate::location::Location;
use crate::probe::{AccessProbe, FsProbe};

/// Suffix appended to the name of a working configuration.
pub const WORKING_SUFFIX: &str = "-working";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Why a location was left out of the working subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The path does not exist or is not a directory.
    Missing,
    /// The source exists but cannot be read.
    Unreadable,
    /// The destination exists but cannot be written.
    Unwritable,
    /// The source is usable but its destination is not.
    DestinationUnavailable { destination: PathBuf },
}

impl ExclusionReason {
    /// Short human-readable label for logs and tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Unreadable => "unreadable",
            Self::Unwritable => "unwritable",
            Self::DestinationUnavailable { .. } => "destination unavailable",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DestinationUnavailable { destination } => {
                write!(f, "{} ({})", self.label(), destination.display())
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// A location left out of the working subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub path: PathBuf,
    pub reason: ExclusionReason,
}

/// Locations split by whether they are usable right now.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Freshly probed concrete locations.
    pub good: Vec<Location>,
    pub bad: Vec<Exclusion>,
}

/// Outcome of [`Configuration::reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciliation<P = FsProbe> {
    /// The configuration restricted to currently working bindings.
    pub working: Configuration<P>,
    /// Sources left out, in source order.
    pub excluded_sources: Vec<Exclusion>,
    /// Destinations that are not usable, in destination order.
    pub excluded_destinations: Vec<Exclusion>,
}

impl<P> Reconciliation<P> {
    /// `true` if nothing was excluded.
    pub fn is_complete(&self) -> bool {
        self.excluded_sources.is_empty() && self.excluded_destinations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Need {
    Read,
    Write,
}

/// Build a concrete location for `loc` and check the access it needs.
fn classify<A: AccessProbe>(loc: &Location, probe: &A, need: Need) -> Result<Location, Exclusion> {
    let exclude = |reason| Exclusion {
        path: loc.path().to_path_buf(),
        reason,
    };

    let mut concrete = match Location::new_concrete_with(loc.path(), probe) {
        Ok(concrete) => concrete,
        Err(e) => {
            debug!(path = %loc.path().display(), error = %e, "location unreachable");
            return Err(exclude(ExclusionReason::Missing));
        }
    };

    match need {
        Need::Read if !concrete.check_read() => Err(exclude(ExclusionReason::Unreadable)),
        Need::Write if !concrete.check_write() => Err(exclude(ExclusionReason::Unwritable)),
        _ => {
            concrete.inherit_last_sync(loc);
            Ok(concrete)
        }
    }
}

fn partition<A: AccessProbe>(locations: &[Location], probe: &A, need: Need) -> Partition {
    let mut partition = Partition::default();
    for loc in locations {
        match classify(loc, probe, need) {
            Ok(good) => partition.good.push(good),
            Err(bad) => partition.bad.push(bad),
        }
    }
    partition
}

fn working_name(name: &str) -> String {
    if name.ends_with(WORKING_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{WORKING_SUFFIX}")
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

impl<P: AccessProbe + Clone> Configuration<P> {
    /// Split the sources into readable directories and the rest.
    pub fn partition_sources(&self) -> Partition {
        partition(self.sources(), self.probe(), Need::Read)
    }

    /// Split the destinations into writable directories and the rest.
    pub fn partition_destinations(&self) -> Partition {
        partition(self.destinations(), self.probe(), Need::Write)
    }

    /// Re-probe every location and build the working subset together with
    /// the list of what was left out and why.
    pub fn reconcile(&self) -> Reconciliation<P> {
        let destinations = self.partition_destinations();
        let mut working = Configuration::unchecked(
            working_name(self.name()),
            self.frequency(),
            self.probe().clone(),
        );
        let mut excluded_sources = Vec::new();

        for source in self.sources() {
            let good_source = match classify(source, self.probe(), Need::Read) {
                Ok(good) => good,
                Err(bad) => {
                    warn!(path = %bad.path.display(), reason = %bad.reason, "excluding source");
                    excluded_sources.push(bad);
                    continue;
                }
            };
            let Some(dest_path) = self.bound_path(source.path()) else {
                continue;
            };

            match destinations.good.iter().find(|d| d.path() == dest_path) {
                Some(dest) => {
                    working.push_binding(good_source.into_virtual(), dest.clone().into_virtual());
                }
                None => {
                    let reason = ExclusionReason::DestinationUnavailable {
                        destination: dest_path.to_path_buf(),
                    };
                    warn!(path = %source.path().display(), %reason, "excluding source");
                    excluded_sources.push(Exclusion {
                        path: source.path().to_path_buf(),
                        reason,
                    });
                }
            }
        }

        for bad in &destinations.bad {
            warn!(path = %bad.path.display(), reason = %bad.reason, "excluding destination");
        }

        info!(
            config = %self.name(),
            working = working.sources().len(),
            excluded_sources = excluded_sources.len(),
            excluded_destinations = destinations.bad.len(),
            "reconciled configuration"
        );

        Reconciliation {
            working,
            excluded_sources,
            excluded_destinations: destinations.bad,
        }
    }

    /// The configuration restricted to bindings that work right now.
    pub fn derive_working_subset(&self) -> Configuration<P> {
        self.reconcile().working
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::configuration::default_frequency;
    use crate::testing::FixedProbe;

    fn config(probe: &FixedProbe) -> Configuration<FixedProbe> {
        Configuration::with_probe("laptop", default_frequency(), probe.clone()).unwrap()
    }

    #[test]
    fn test_unreadable_source_is_dropped_with_its_destination() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/b", false, true)
            .with_dir("/x", true, true)
            .with_dir("/y", true, true);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        cfg.add_source("/b", "/y").unwrap();

        let outcome = cfg.reconcile();
        let working = &outcome.working;
        assert_eq!(working.sources().len(), 1);
        assert_eq!(working.destination_of("/a"), Some(Path::new("/x")));
        assert!(!working.has_source("/b"));
        assert!(!working.has_destination("/y"));
        assert_eq!(
            outcome.excluded_sources,
            vec![Exclusion {
                path: PathBuf::from("/b"),
                reason: ExclusionReason::Unreadable,
            }]
        );
        assert!(outcome.excluded_destinations.is_empty());
    }

    #[test]
    fn test_good_source_with_unwritable_destination_is_dropped() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/z", true, false);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/z").unwrap();

        let outcome = cfg.reconcile();
        assert!(outcome.working.is_empty());
        assert!(outcome.working.destinations().is_empty());
        assert_eq!(
            outcome.excluded_sources[0].reason,
            ExclusionReason::DestinationUnavailable {
                destination: PathBuf::from("/z")
            }
        );
        assert_eq!(outcome.excluded_destinations[0].reason, ExclusionReason::Unwritable);
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_unplugged_locations_are_missing() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/c", true, true)
            .with_dir("/x", true, true)
            .with_dir("/y", true, true);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        cfg.add_source("/c", "/y").unwrap();

        probe.unplug("/a");
        probe.unplug("/y");

        let outcome = cfg.reconcile();
        assert!(outcome.working.sources().is_empty());
        let reasons: Vec<_> = outcome
            .excluded_sources
            .iter()
            .map(|e| (e.path.clone(), e.reason.label()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (PathBuf::from("/a"), "missing"),
                (PathBuf::from("/c"), "destination unavailable"),
            ]
        );
        assert_eq!(outcome.excluded_destinations.len(), 1);
        assert_eq!(outcome.excluded_destinations[0].path, PathBuf::from("/y"));
    }

    #[test]
    fn test_reprobes_instead_of_trusting_snapshot() {
        let probe = FixedProbe::new().with_dir("/x", true, true);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        assert!(!cfg.all_sources_readable());

        probe.set_dir("/a", true, false);
        let working = cfg.derive_working_subset();
        assert!(working.has_source("/a"));
        assert!(working.all_sources_readable());
        assert!(working.all_destinations_writable());
    }

    #[test]
    fn test_working_subset_is_idempotent() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/b", false, true)
            .with_dir("/c", true, true)
            .with_dir("/x", true, true)
            .with_dir("/y", true, false);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        cfg.add_source("/b", "/x").unwrap();
        cfg.add_source("/c", "/y").unwrap();

        let once = cfg.derive_working_subset();
        let twice = once.derive_working_subset();
        assert_eq!(once, twice);
        assert_eq!(once.name(), "laptop-working");
        assert_eq!(once.frequency(), cfg.frequency());
    }

    #[test]
    fn test_original_is_untouched() {
        let probe = FixedProbe::new().with_dir("/a", true, true);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        let before = cfg.clone();

        let working = cfg.derive_working_subset();
        assert!(working.is_empty());
        assert_eq!(cfg, before);
    }

    #[test]
    fn test_shared_destination_is_deduplicated() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/c", true, true)
            .with_dir("/x", true, true);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        cfg.add_source("/c", "/x").unwrap();

        let working = cfg.derive_working_subset();
        assert_eq!(working.sources().len(), 2);
        assert_eq!(working.destinations().len(), 1);
        assert!(working.sources().iter().all(|s| s.kind() == crate::location::LocationKind::Virtual));
    }

    #[test]
    fn test_last_sync_carries_over() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/x", true, true);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        let at = cfg.record_sync("/a").unwrap();

        let working = cfg.derive_working_subset();
        assert_eq!(working.sources()[0].last_sync(), Some(at));
        assert_eq!(working.destinations()[0].last_sync(), Some(at));
    }

    #[test]
    fn test_partitions() {
        let probe = FixedProbe::new()
            .with_dir("/a", true, true)
            .with_dir("/x", true, false);
        let mut cfg = config(&probe);
        cfg.add_source("/a", "/x").unwrap();
        cfg.add_source("/gone", "/x").unwrap();

        let sources = cfg.partition_sources();
        assert_eq!(sources.good.len(), 1);
        assert_eq!(sources.bad[0].reason, ExclusionReason::Missing);

        let dests = cfg.partition_destinations();
        assert!(dests.good.is_empty());
        assert_eq!(dests.bad[0].reason, ExclusionReason::Unwritable);
    }

    #[test]
    fn test_exclusion_serializes_with_kind_tag() {
        let exclusion = Exclusion {
            path: PathBuf::from("/a"),
            reason: ExclusionReason::DestinationUnavailable {
                destination: PathBuf::from("/z"),
            },
        };
        let json = serde_json::to_value(&exclusion).unwrap();
        assert_eq!(json["reason"]["kind"], "destination_unavailable");
        assert_eq!(json["reason"]["destination"], "/z");
    }
}
