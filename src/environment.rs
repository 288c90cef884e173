//! Session environment
//!
//! Builds the `KEY=VALUE` list sent once when the session opens. It always
//! starts with the terminal type, optionally carries a small allow-list of
//! host locale variables, then any configured extras.

/// Terminal type the surface emulates
pub const TERM: &str = "TERM=xterm-256color";

/// Whether a host variable is safe to forward to the session
pub fn is_safe(key: &str) -> bool {
    matches!(key, "LANG" | "TZ" | "COLORTERM") || key.starts_with("LC_")
}

/// Host variables that pass [`is_safe`], sorted by key
pub fn filter_safe<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut safe: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| is_safe(key))
        .collect();
    safe.sort();
    safe.into_iter().map(|(key, value)| format!("{}={}", key, value)).collect()
}

fn key_of(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(key, _)| key)
}

/// Assemble the session environment.
///
/// A later entry replaces an earlier one with the same key, keeping the
/// earlier position.
pub fn build<I>(host: I, inherit_safe: bool, extra: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let inherited = if inherit_safe { filter_safe(host) } else { Vec::new() };

    let mut env: Vec<String> = Vec::with_capacity(1 + inherited.len() + extra.len());
    let entries = std::iter::once(TERM.to_string()).chain(inherited).chain(extra.iter().cloned());
    for entry in entries {
        match env.iter_mut().find(|existing| key_of(existing) == key_of(&entry)) {
            Some(existing) => *existing = entry,
            None => env.push(entry),
        }
    }
    env
}
