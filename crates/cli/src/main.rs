//! backbind command-line management tool.
//!
//! Loads a TOML profile describing which source directories are backed up
//! into which destination directories, edits its bindings, and reports which
//! of them are usable right now.

mod report;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use backbind_core::configuration::format_frequency;
use backbind_core::{Configuration, Profile};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// backbind command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "backbind",
    version,
    about = "Manage backup source/destination bindings and check which are usable"
)]
struct Cli {
    /// Path to the TOML profile [default: <config dir>/backbind/profile.toml].
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). Without it RUST_LOG applies.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter profile.
    Init {
        /// Output path (defaults to the profile path).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the profile.
    Validate,

    /// Show the configuration with its bindings and access flags.
    Show {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Probe every location and show the bindings usable right now.
    Check {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Bind a new source to a destination.
    Add {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Bind an existing source to another destination.
    Rebind {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Remove a source and its binding.
    Remove { source: PathBuf },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Returns `Ok(false)` when the command ran but the outcome should be
/// reported as a failure exit status.
fn run(cli: Cli) -> Result<bool> {
    let profile_path = match cli.profile {
        Some(path) => path,
        None => default_profile_path()?,
    };
    debug!(profile = %profile_path.display(), "using profile");

    match cli.command {
        Commands::Init { output } => cmd_init(output.as_deref().unwrap_or(&profile_path)),
        Commands::Validate => cmd_validate(&profile_path),
        Commands::Show { json } => cmd_show(&profile_path, json),
        Commands::Check { json } => cmd_check(&profile_path, json),
        Commands::Add {
            source,
            destination,
        } => cmd_add(&profile_path, &source, &destination),
        Commands::Rebind {
            source,
            destination,
        } => cmd_rebind(&profile_path, &source, &destination),
        Commands::Remove { source } => cmd_remove(&profile_path, &source),
    }
}

// ---------------------------------------------------------------------------
// Profile helpers
// ---------------------------------------------------------------------------

fn default_profile_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .context("cannot determine the user configuration directory; pass --profile")?;
    Ok(base.join("backbind").join("profile.toml"))
}

fn load_configuration(path: &Path) -> Result<Configuration> {
    let profile = Profile::load_and_validate(path).context("failed to load profile")?;
    profile
        .into_configuration()
        .context("failed to build configuration from profile")
}

fn save_configuration(config: &Configuration, path: &Path) -> Result<()> {
    Profile::from_configuration(config)
        .save_to_file(path)
        .context("failed to save profile")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<bool> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("failed to create profile directory")?;
        }
    }
    std::fs::write(output, Profile::default_template()).context("failed to write profile")?;

    println!("{}", style::success(&format!("Starter profile written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Edit the [[bindings]] entries with your source and destination directories");
    println!("  2. Validate with: backbind --profile {} validate", output.display());
    println!("  3. See what is usable now: backbind --profile {} check", output.display());

    Ok(true)
}

fn cmd_validate(path: &Path) -> Result<bool> {
    println!("Validating profile: {}", path.display());
    println!();

    let profile = Profile::load_from_file(path).context("failed to parse profile")?;
    println!("  [OK] TOML structure is valid");

    if let Err(e) = profile.validate() {
        println!("  [FAIL] Validation error: {}", e);
        anyhow::bail!("profile validation failed");
    }
    println!("  [OK] All fields are valid");

    let config = profile
        .into_configuration()
        .context("failed to build configuration from profile")?;
    println!("  [OK] Bindings are consistent");

    println!();
    println!("Profile summary:");
    println!("  Name        : {}", config.name());
    println!("  Frequency   : {}", format_frequency(config.frequency()));
    println!("  Sources     : {}", config.sources().len());
    println!("  Destinations: {}", config.destinations().len());
    println!(
        "  Readable    : {}",
        if config.check_all_readable() { "all" } else { "NOT ALL" }
    );
    println!(
        "  Writable    : {}",
        if config.check_all_writable() { "all" } else { "NOT ALL" }
    );
    println!();
    println!("Profile is valid.");

    Ok(true)
}

fn cmd_show(path: &Path, json: bool) -> Result<bool> {
    let config = load_configuration(path)?;
    if json {
        println!("{}", report::configuration_json(&config)?);
    } else {
        report::print_configuration(&config);
    }
    Ok(true)
}

/// Fails the exit status when the profile has bindings but none is usable.
fn cmd_check(path: &Path, json: bool) -> Result<bool> {
    let config = load_configuration(path)?;
    let outcome = config.reconcile();

    if json {
        println!("{}", report::reconciliation_json(&outcome)?);
    } else {
        report::print_reconciliation(&outcome);
    }

    Ok(config.is_empty() || !outcome.working.is_empty())
}

fn cmd_add(path: &Path, source: &Path, destination: &Path) -> Result<bool> {
    let mut config = load_configuration(path)?;
    config
        .add_source(source, destination)
        .with_context(|| format!("cannot add source {}", source.display()))?;
    save_configuration(&config, path)?;

    println!(
        "{}",
        style::success(&format!("Bound {} -> {}", source.display(), destination.display()))
    );
    if !writable(&config, destination) {
        println!("{}", style::warn("Destination is not writable right now"));
    }
    Ok(true)
}

fn cmd_rebind(path: &Path, source: &Path, destination: &Path) -> Result<bool> {
    let mut config = load_configuration(path)?;
    let previous = config.destination_of(source).map(Path::to_path_buf);
    config
        .rebind(source, destination)
        .with_context(|| format!("cannot rebind source {}", source.display()))?;
    save_configuration(&config, path)?;

    println!(
        "{}",
        style::success(&format!("Rebound {} -> {}", source.display(), destination.display()))
    );
    if let Some(previous) = previous {
        if !config.has_destination(&previous) {
            println!(
                "{}",
                style::dim(&format!("Dropped unbound destination {}", previous.display()))
            );
        }
    }
    Ok(true)
}

fn cmd_remove(path: &Path, source: &Path) -> Result<bool> {
    let mut config = load_configuration(path)?;
    let removed = config
        .remove_source(source)
        .with_context(|| format!("cannot remove source {}", source.display()))?;
    save_configuration(&config, path)?;

    println!(
        "{}",
        style::success(&format!("Removed {}", removed.path().display()))
    );
    Ok(true)
}

fn writable(config: &Configuration, destination: &Path) -> bool {
    config
        .destinations()
        .iter()
        .any(|d| d.is_path(destination) && d.check_write())
}
