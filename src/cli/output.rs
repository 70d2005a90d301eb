//! Text and JSON output

use serde::Serialize;
use tracing::warn;

use crate::domain::Date;
use crate::storage;

/// `--format` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Writes command results to stdout in the selected format
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// One-line outcome of a command, `{"success":true,"message":..}` in JSON mode
    pub fn success(&self, message: &str) {
        if self.is_json() {
            self.data(&serde_json::json!({ "success": true, "message": message }));
        } else {
            println!("{}", message);
        }
    }

    /// Serialises `data`, pretty-printed in text mode
    pub fn data<T: Serialize>(&self, data: &T) {
        let rendered = if self.is_json() {
            serde_json::to_string(data)
        } else {
            serde_json::to_string_pretty(data)
        };
        match rendered {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("cannot render output: {}", e),
        }
    }
}

/// Short form for midnight dates, RFC 3339 otherwise
pub fn format_date(date: &Date) -> String {
    if date.time() == chrono::NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn midnight_dates_are_short() {
        let date = Utc.with_ymd_and_hms(2020, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(format_date(&date), "2020-01-05");

        let date = Utc.with_ymd_and_hms(2020, 1, 5, 9, 30, 0).unwrap();
        assert_eq!(format_date(&date), "2020-01-05T09:30:00+00:00");
    }
}
