//! Warranty code and item serial generation.
//!
//! Codes look like `WR001`: a short prefix plus a zero-padded sequence
//! number derived from the store's existing rows. Serials look like
//! `SN001` and are only synthesized when a creation request leaves one
//! blank or repeats one within the same request.
//!
//! Everything here is pure; the optimistic retry loop that makes code
//! proposals safe under concurrency lives in [`crate::warranties`].

/// Default code prefix for warranty headers.
pub const DEFAULT_CODE_PREFIX: &str = "WR";

/// Prefix for synthesized item serials.
pub const SERIAL_PREFIX: &str = "SN";

/// Minimum digits in a formatted sequence; longer sequences grow past it.
pub const MIN_SEQUENCE_WIDTH: usize = 3;

/// Format `prefix + zero-padded sequence` (`WR` + 7 -> `WR007`,
/// `WR` + 1234 -> `WR1234`).
#[must_use]
pub fn format_code(prefix: &str, sequence: u64) -> String {
    format!("{prefix}{sequence:0MIN_SEQUENCE_WIDTH$}")
}

/// Parse the trailing decimal suffix of a code, defaulting to 0.
///
/// `WR042` -> 42, `WR` -> 0, `legacy-7a` -> 0. A suffix too long for
/// `u64` also falls back to 0 rather than failing the request.
#[must_use]
pub fn trailing_sequence(code: &str) -> u64 {
    let digits = code
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .count();
    code.get(code.len() - digits..)
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(0)
}

/// Propose the next code after the store's last known one.
#[must_use]
pub fn next_code(prefix: &str, last: Option<&str>) -> String {
    let last_sequence = last.map(trailing_sequence).unwrap_or(0);
    format_code(prefix, last_sequence + 1)
}

/// Resolve one serial per supplied item, unique within the request.
///
/// A supplied, non-blank serial is kept as-is unless an earlier item in
/// the same request already claimed it. Blank or duplicated entries get
/// the lowest free `SN<seq>` slot, scanning upward from 1. Uniqueness is
/// only per-header, so no storage round-trip is needed; two independent
/// headers may both end up with `SN001`.
#[must_use]
pub fn resolve_serials<'a, I>(supplied: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut used: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut sequence: u64 = 1;

    supplied
        .into_iter()
        .map(|raw| {
            let trimmed = raw.map(str::trim).unwrap_or("");
            let serial = if trimmed.is_empty() || used.contains(trimmed) {
                while used.contains(&format_code(SERIAL_PREFIX, sequence)) {
                    sequence += 1;
                }
                let synthesized = format_code(SERIAL_PREFIX, sequence);
                sequence += 1;
                synthesized
            } else {
                trimmed.to_owned()
            };
            used.insert(serial.clone());
            serial
        })
        .collect()
}
