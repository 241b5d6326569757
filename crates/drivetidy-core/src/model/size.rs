/// Human-readable byte counts for reports and issue details.
///
/// Sizes stay `u64` bytes everywhere; floating point only appears here at
/// the formatting boundary.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with binary (1024) steps and short unit labels.
///
/// Whole bytes print without decimals, everything else with one.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Format an age or remaining lifetime given in hours.
///
/// Negative values (an already-expired entry) print as "expired".
pub fn format_hours(hours: f64) -> String {
    if !hours.is_finite() || hours < 0.0 {
        "expired".to_string()
    } else if hours < 1.0 {
        format!("{:.0} min", hours * 60.0)
    } else {
        format!("{hours:.1} h")
    }
}
