//! Time formatting for console output

/// Compact duration like `1h 5m` or `45s`, dropping zero components
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let parts: Vec<String> = [(h, "h"), (m, "m"), (s, "s")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// Age of the last rotation for status lines
pub fn format_age(secs: Option<u64>) -> String {
    match secs {
        Some(secs) => format!("{} ago", format_duration(secs)),
        None => "never".to_string(),
    }
}
