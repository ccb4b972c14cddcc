//! Signal name and number resolution for the `kill` operation.

use std::str::FromStr;

use nix::sys::signal::Signal;

/// Resolves a signal from a name or a decimal number.
///
/// Accepts `"SIGTERM"`, `"term"`, and `"15"` alike. Returns `None` for
/// anything the platform does not know.
pub fn lookup(name_or_number: &str) -> Option<Signal> {
    let token = name_or_number.trim();
    if token.is_empty() {
        return None;
    }
    if let Ok(number) = token.parse::<i32>() {
        return Signal::try_from(number).ok();
    }
    let mut name = token.to_uppercase();
    if !name.starts_with("SIG") {
        name.insert_str(0, "SIG");
    }
    Signal::from_str(&name).ok()
}
