//! Terminal styling for backbind output.

use console::Style;

/// Line for an operation that went through, prefixed with a green tick.
pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

/// Line for a binding or check that failed, prefixed with a red cross.
pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

/// Line for a degraded but usable state, such as an unwritable destination.
pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

/// Section title above a bindings or exclusions table.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Secondary detail, e.g. a destination dropped after a rebind.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Readability/writability verdict: a tick when `ok`, a warning otherwise.
pub fn verdict(ok: bool, ok_msg: &str, bad_msg: &str) -> String {
    if ok {
        success(ok_msg)
    } else {
        warn(bad_msg)
    }
}
