//! Terminal color policy.
//!
//! Follows the NO_COLOR standard (https://no-color.org/) and the CLICOLOR
//! conventions, in this order of precedence:
//!
//! 1. `NO_COLOR` set to anything disables colors
//! 2. `CLICOLOR_FORCE` set to a non-zero value forces colors
//! 3. `CLICOLOR=0` disables colors
//! 4. otherwise colors are used when stdout is a terminal

use colored::control;
use std::io::IsTerminal;

/// Decide whether to color output, given an environment lookup and TTY state.
pub fn colors_enabled(var: impl Fn(&str) -> Option<String>, is_tty: bool) -> bool {
    if var("NO_COLOR").is_some() {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
        return true;
    }
    if var("CLICOLOR").is_some_and(|v| v == "0") {
        return false;
    }
    is_tty
}

/// Apply the color policy for this process. Call early in `main`.
pub fn init_colors() {
    let enabled = colors_enabled(
        |key| std::env::var(key).ok(),
        std::io::stdout().is_terminal(),
    );
    control::set_override(enabled);
}
