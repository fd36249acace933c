//! Rendering of configurations and reconciliation outcomes.

use std::path::Path;

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use backbind_core::configuration::format_frequency;
use backbind_core::{Configuration, Exclusion, Location, Reconciliation};

use crate::style;

// ---------------------------------------------------------------------------
// JSON views
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct BindingView<'a> {
    source: &'a Path,
    destination: &'a Path,
}

#[derive(Debug, Serialize)]
struct ConfigurationView<'a> {
    name: &'a str,
    frequency_secs: i64,
    sources: &'a [Location],
    destinations: &'a [Location],
    bindings: Vec<BindingView<'a>>,
    all_sources_readable: bool,
    all_destinations_writable: bool,
    check_all_readable: bool,
    check_all_writable: bool,
}

impl<'a> ConfigurationView<'a> {
    fn new(config: &'a Configuration) -> Self {
        Self {
            name: config.name(),
            frequency_secs: config.frequency().num_seconds(),
            sources: config.sources(),
            destinations: config.destinations(),
            bindings: config
                .bindings()
                .map(|(s, d)| BindingView {
                    source: s.path(),
                    destination: d.path(),
                })
                .collect(),
            all_sources_readable: config.all_sources_readable(),
            all_destinations_writable: config.all_destinations_writable(),
            check_all_readable: config.check_all_readable(),
            check_all_writable: config.check_all_writable(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReconciliationView<'a> {
    working: ConfigurationView<'a>,
    excluded_sources: &'a [Exclusion],
    excluded_destinations: &'a [Exclusion],
}

pub fn configuration_json(config: &Configuration) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ConfigurationView::new(config))
}

pub fn reconciliation_json(outcome: &Reconciliation) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ReconciliationView {
        working: ConfigurationView::new(&outcome.working),
        excluded_sources: &outcome.excluded_sources,
        excluded_destinations: &outcome.excluded_destinations,
    })
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

fn access_cell(ok: bool) -> Cell {
    if ok {
        Cell::new("✓").fg(Color::Green)
    } else {
        Cell::new("✗").fg(Color::Red)
    }
}

fn last_sync_cell(loc: &Location) -> Cell {
    match loc.last_sync() {
        Some(at) => Cell::new(at.format("%Y-%m-%d %H:%M").to_string()),
        None => Cell::new("—"),
    }
}

fn bindings_table(config: &Configuration) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Source", "R", "Destination", "W", "Last sync"]);

    for (source, dest) in config.bindings() {
        table.add_row(vec![
            Cell::new(source.path().display()),
            access_cell(source.check_read()),
            Cell::new(dest.path().display()),
            access_cell(dest.check_write()),
            last_sync_cell(source),
        ]);
    }
    table
}

fn exclusions_table(kind: &str, exclusions: &[Exclusion]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![kind, "Reason"]);

    for exclusion in exclusions {
        table.add_row(vec![
            Cell::new(exclusion.path.display()),
            Cell::new(exclusion.reason.to_string()).fg(Color::Yellow),
        ]);
    }
    table
}

/// Print the configuration dump.
pub fn print_configuration(config: &Configuration) {
    println!();
    println!("{}", style::header(&format!("Configuration '{}'", config.name())));
    println!("  Frequency  {}", format_frequency(config.frequency()));
    println!();

    if config.is_empty() {
        println!("  {}", style::dim("No sources configured."));
    } else {
        println!("{}", bindings_table(config));
    }

    println!();
    println!(
        "  {}",
        style::verdict(
            config.all_sources_readable(),
            "All sources readable",
            "Some sources unreadable"
        )
    );
    println!(
        "  {}",
        style::verdict(
            config.all_destinations_writable(),
            "All destinations writable",
            "Some destinations not writable"
        )
    );
    println!();
}

/// Print the working subset and what was left out.
pub fn print_reconciliation(outcome: &Reconciliation) {
    let working = &outcome.working;

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Working subset '{}' ({} binding(s))",
            working.name(),
            working.sources().len()
        ))
    );
    println!();

    if working.is_empty() {
        println!("  {}", style::error("No binding is usable right now."));
    } else {
        println!("{}", bindings_table(working));
    }

    if !outcome.excluded_sources.is_empty() {
        println!();
        println!("{}", style::header("Excluded sources"));
        println!("{}", exclusions_table("Source", &outcome.excluded_sources));
    }
    if !outcome.excluded_destinations.is_empty() {
        println!();
        println!("{}", style::header("Excluded destinations"));
        println!(
            "{}",
            exclusions_table("Destination", &outcome.excluded_destinations)
        );
    }
    if outcome.is_complete() {
        println!();
        println!("{}", style::success("Every binding is usable."));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_json_lists_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dst).unwrap();

        let mut config = Configuration::new("home", chrono::Duration::hours(1)).unwrap();
        config.add_source(&src, &dst).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&configuration_json(&config).unwrap()).unwrap();
        assert_eq!(json["name"], "home");
        assert_eq!(json["frequency_secs"], 3600);
        assert_eq!(json["bindings"][0]["source"], src.display().to_string());
        assert_eq!(json["sources"][0]["kind"], "virtual");
        assert_eq!(json["sources"][0]["readable"], true);
    }

    #[test]
    fn test_reconciliation_json_reports_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();

        let mut config = Configuration::new("home", chrono::Duration::hours(1)).unwrap();
        config.add_source(&src, dir.path().join("unplugged")).unwrap();

        let outcome = config.reconcile();
        let json: serde_json::Value =
            serde_json::from_str(&reconciliation_json(&outcome).unwrap()).unwrap();
        assert_eq!(json["working"]["name"], "home-working");
        assert_eq!(json["working"]["bindings"].as_array().unwrap().len(), 0);
        assert_eq!(
            json["excluded_sources"][0]["reason"]["kind"],
            "destination_unavailable"
        );
        assert_eq!(json["excluded_destinations"][0]["reason"]["kind"], "missing");
    }
}
