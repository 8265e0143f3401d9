//! Locale-invariant numeric parsing with the lenient semantics legacy routes
//! rely on: surrounding and embedded blanks are ignored, a leading `+` is
//! accepted, and text with trailing garbage yields its longest numeric prefix.
//!
//! Every function returns `None` when nothing usable is found; the caller
//! decides whether that is an error and what default to substitute.

/// Parse a floating point number.
pub fn parse_double_legacy(text: &str) -> Option<f64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    if let Some(v) = parse_finite(&compact) {
        return Some(v);
    }
    // Longest prefix that still parses, e.g. "12.5m" -> 12.5.
    let boundaries: Vec<usize> = compact.char_indices().map(|(i, _)| i).skip(1).collect();
    boundaries
        .into_iter()
        .rev()
        .find_map(|end| compact.get(..end).and_then(parse_finite))
}

fn parse_finite(text: &str) -> Option<f64> {
    // Rust accepts "inf" and "nan"; route files never mean those.
    if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer. Fractional input is rounded half-to-even.
pub fn parse_int_legacy(text: &str) -> Option<i32> {
    let value = parse_double_legacy(text)?.round_ties_even();
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value as i32)
}

/// Parse a value in `0..=255`.
pub fn parse_byte_legacy(text: &str) -> Option<u8> {
    let value = parse_int_legacy(text)?;
    u8::try_from(value).ok()
}

/// Parse a length, applying the unit-of-length factors.
///
/// A plain value is multiplied by the first factor. Colon-compound values
/// `a:b:c` are `a*u0 + b*u1 + c*u2`; parts beyond the declared factors reuse
/// the last one.
pub fn parse_length(text: &str, units: &[f64]) -> Option<f64> {
    let mut total = 0.0;
    for (i, part) in text.split(':').enumerate() {
        let value = parse_double_legacy(part)?;
        let factor = units.get(i).or(units.last()).copied().unwrap_or(1.0);
        total += value * factor;
    }
    Some(total)
}

/// Parse a time of day in `HH.MMSS` or `HH:MM:SS` notation into seconds.
pub fn parse_time(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(':') {
        let mut seconds = 0.0;
        let mut parts = 0;
        for (i, part) in text.split(':').enumerate() {
            let value = parse_double_legacy(part)?;
            let scale = match i {
                0 => 3600.0,
                1 => 60.0,
                2 => 1.0,
                _ => return None,
            };
            seconds += value * scale;
            parts += 1;
        }
        return (parts >= 2).then_some(seconds);
    }
    let (hours_text, fraction) = match text.split_once('.') {
        Some((h, f)) => (h, f),
        None => (text, ""),
    };
    let hours = parse_int_legacy(hours_text)?;
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits: Vec<u32> = fraction.chars().filter_map(|c| c.to_digit(10)).collect();
    let pair = |i: usize| -> u32 {
        let tens = digits.get(i).copied().unwrap_or(0);
        let ones = digits.get(i + 1).copied().unwrap_or(0);
        tens * 10 + ones
    };
    let minutes = pair(0);
    let seconds = pair(2);
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + f64::from(seconds))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_double_legacy("25"), Some(25.0));
        assert_eq!(parse_double_legacy("-3.5"), Some(-3.5));
        assert_eq!(parse_double_legacy("+7"), Some(7.0));
        assert_eq!(parse_double_legacy(" 1 000 "), Some(1000.0));
    }

    #[test]
    fn empty_keeps_default() {
        assert_eq!(parse_double_legacy(""), None);
        assert_eq!(parse_double_legacy("   "), None);
        assert_eq!(parse_int_legacy(""), None);
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(parse_double_legacy("12.5m"), Some(12.5));
        assert_eq!(parse_double_legacy("3e"), Some(3.0));
        assert_eq!(parse_double_legacy("abc"), None);
        assert_eq!(parse_double_legacy("inf"), None);
    }

    #[test]
    fn integers_round_half_even() {
        assert_eq!(parse_int_legacy("2.5"), Some(2));
        assert_eq!(parse_int_legacy("3.5"), Some(4));
        assert_eq!(parse_int_legacy("1e12"), None);
    }

    #[test]
    fn bytes_reject_out_of_range() {
        assert_eq!(parse_byte_legacy("255"), Some(255));
        assert_eq!(parse_byte_legacy("256"), None);
        assert_eq!(parse_byte_legacy("-1"), None);
    }

    #[test]
    fn lengths_apply_units() {
        assert_eq!(parse_length("100", &[1.0]), Some(100.0));
        assert_eq!(parse_length("2", &[1000.0, 1.0]), Some(2000.0));
        assert_eq!(parse_length("1:500", &[1000.0, 1.0]), Some(1500.0));
        assert_eq!(parse_length("1:2:3", &[10.0]), Some(60.0));
        assert_eq!(parse_length("x", &[1.0]), None);
    }

    #[test]
    fn times() {
        assert_eq!(parse_time("10.3015"), Some(10.0 * 3600.0 + 30.0 * 60.0 + 15.0));
        assert_eq!(parse_time("8.3"), Some(8.0 * 3600.0 + 30.0 * 60.0));
        assert_eq!(parse_time("7"), Some(7.0 * 3600.0));
        assert_eq!(parse_time("12:05:30"), Some(12.0 * 3600.0 + 5.0 * 60.0 + 30.0));
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("ab"), None);
    }
}
