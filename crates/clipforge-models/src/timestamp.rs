//! Timestamp parsing and formatting utilities.
//!
//! Supports `HH:MM:SS`, `MM:SS` and plain seconds, each with optional
//! fractional seconds.

use thiserror::Error;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,
    #[error("Timestamp cannot be negative")]
    Negative,
    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, MM:SS, or SS")]
    InvalidFormat(String),
}

/// Parse a timestamp string to total seconds.
///
/// # Examples
/// ```
/// use clipforge_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let labels: &[&'static str] = match parts.len() {
        1 => &["seconds"],
        2 => &["minutes", "seconds"],
        3 => &["hours", "minutes", "seconds"],
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    let mut total = 0.0;
    for (part, label) in parts.iter().zip(labels) {
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| TimestampError::InvalidValue(label, part.to_string()))?;
        if !value.is_finite() {
            return Err(TimestampError::InvalidValue(label, part.to_string()));
        }
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }
    Ok(total)
}

/// Format seconds as `HH:MM:SS` (fractions truncated).
pub fn format_seconds(total_secs: f64) -> String {
    let total = total_secs.max(0.0).floor() as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Format a time range label such as `[00:10:00 - 00:20:00]`.
pub fn format_range_label(start_secs: f64, end_secs: f64) -> String {
    format!("[{} - {}]", format_seconds(start_secs), format_seconds(end_secs))
}
