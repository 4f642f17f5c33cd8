//! Framing for cookie values that exceed the browser's single-cookie budget.
//!
//! - fits: `<base>=<value>`
//! - too large: `<base>=split.<n>` followed by `<base>_1 .. <base>_n`, each carrying a slice
//!
//! Sealed values are codec text and never contain `.`, so the marker cannot be
//! mistaken for a value.

use super::DecodeError;

pub const SPLIT_MARKER: &str = "split.";

/// Upper bound on the number of chunks accepted when reading.
pub const MAX_CHUNKS: usize = 16;

pub fn chunk_name(base: &str, index: usize) -> String {
    format!("{base}_{index}")
}

/// Split `value` into the named cookie values to emit. `max_value_len` is the
/// largest value a single cookie named like a chunk can carry.
pub fn split(base: &str, value: &str, max_value_len: usize) -> Vec<(String, String)> {
    if value.len() <= max_value_len {
        return vec![(base.to_string(), value.to_string())];
    }

    // Values are ASCII codec text, so byte slicing never lands inside a character.
    let parts: Vec<&str> = value
        .as_bytes()
        .chunks(max_value_len.max(1))
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect();

    let mut out = Vec::with_capacity(parts.len() + 1);
    out.push((base.to_string(), format!("{SPLIT_MARKER}{}", parts.len())));
    for (i, part) in parts.into_iter().enumerate() {
        out.push((chunk_name(base, i + 1), part.to_string()));
    }
    out
}

/// Reassemble the value stored under `base`, looking cookies up by name.
pub fn join<'a, F>(base: &str, lookup: F) -> Result<String, DecodeError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let head = lookup(base).ok_or_else(|| DecodeError::Missing(base.to_string()))?;

    let Some(count) = head.strip_prefix(SPLIT_MARKER) else {
        return Ok(head.to_string());
    };

    let count: usize = count
        .parse()
        .map_err(|_| DecodeError::InvalidFraming(base.to_string()))?;
    if count == 0 || count > MAX_CHUNKS {
        return Err(DecodeError::InvalidFraming(base.to_string()));
    }

    let mut value = String::new();
    for i in 1..=count {
        let name = chunk_name(base, i);
        let part = lookup(&name).ok_or(DecodeError::Missing(name))?;
        value.push_str(part);
    }
    Ok(value)
}
