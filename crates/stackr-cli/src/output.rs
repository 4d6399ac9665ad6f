//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print essential machine-readable output (always prints).
///
/// Use for results that should be available for piping, like PR URLs.
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Warn about local branches that were left alone because they no longer
/// match GitHub.
pub fn branches_not_updated(branches: &[String]) {
    if branches.is_empty() {
        return;
    }
    warn("These local branches differ from GitHub and were not updated:");
    for branch in branches {
        eprintln!("    {}", branch.bold());
    }
    eprintln!("  Reset them with `git reset --hard <remote>/<branch>` if their changes are not needed.");
}

/// Format a PR reference.
#[must_use]
pub fn pr_ref(number: u64) -> String {
    format!("#{number}").cyan().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_ref() {
        colored::control::set_override(false);
        assert_eq!(pr_ref(42), "#42");
        colored::control::unset_override();
    }

    #[test]
    fn test_quiet_mode() {
        set_quiet(true);
        assert!(is_quiet());
        set_quiet(false);
        assert!(!is_quiet());
    }
}
