//! Date and timestamp value types
//!
//! Dates use the `YYYY-MM-DD` text form, timestamps `YYYY-MM-DD HH:MM:SS`.
//! Both carry calendar fields directly so the derived ordering is
//! chronological and serialization stays self-describing.

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar date
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl Date {
    /// Build a validated date
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self> {
        if month < 1 || month > 12 {
            return Err(DbError::Type(format!("Invalid month in date: {}", month)));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(DbError::Type(format!(
                "Invalid day in date: {:04}-{:02}-{:02}",
                year, month, day
            )));
        }
        Ok(Self { year, month, day })
    }

    /// Parse `YYYY-MM-DD`
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(DbError::Type(format!(
                "Cannot parse '{}' as DATE (expected YYYY-MM-DD)",
                s
            )));
        }
        let year = parse_field(parts[0], s, "DATE")?;
        let month = parse_field(parts[1], s, "DATE")? as u8;
        let day = parse_field(parts[2], s, "DATE")? as u8;
        Self::new(year, month, day)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Calendar timestamp with second resolution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub date: Date,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Build a validated timestamp
    pub fn new(date: Date, hour: u8, minute: u8, second: u8) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(DbError::Type(format!(
                "Invalid time of day: {:02}:{:02}:{:02}",
                hour, minute, second
            )));
        }
        Ok(Self {
            date,
            hour,
            minute,
            second,
        })
    }

    /// Parse `YYYY-MM-DD HH:MM:SS`; a bare `YYYY-MM-DD` is midnight
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, ' ');
        let date_part = parts.next().unwrap_or("");
        let date = Date::parse(date_part)
            .map_err(|_| DbError::Type(format!("Cannot parse '{}' as TIMESTAMP", s)))?;

        let time_part = match parts.next() {
            Some(t) => t,
            None => return Self::new(date, 0, 0, 0),
        };

        let fields: Vec<&str> = time_part.split(':').collect();
        if fields.len() != 3 {
            return Err(DbError::Type(format!(
                "Cannot parse '{}' as TIMESTAMP (expected YYYY-MM-DD HH:MM:SS)",
                s
            )));
        }
        let hour = parse_field(fields[0], s, "TIMESTAMP")? as u8;
        let minute = parse_field(fields[1], s, "TIMESTAMP")? as u8;
        let second = parse_field(fields[2], s, "TIMESTAMP")? as u8;
        Self::new(date, hour, minute, second)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02}:{:02}",
            self.date, self.hour, self.minute, self.second
        )
    }
}

fn parse_field(field: &str, source: &str, kind: &str) -> Result<i32> {
    field
        .trim()
        .parse::<i32>()
        .map_err(|_| DbError::Type(format!("Cannot parse '{}' as {}", source, kind)))
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_parse_and_format() {
        let d = Date::parse("2024-02-29").unwrap();
        assert_eq!(d.year, 2024);
        assert_eq!(d.month, 2);
        assert_eq!(d.day, 29);
        assert_eq!(d.to_string(), "2024-02-29");
    }

    #[test]
    fn test_date_rejects_invalid() {
        assert!(Date::parse("2023-02-29").is_err()); // not a leap year
        assert!(Date::parse("2023-13-01").is_err());
        assert!(Date::parse("2023-01").is_err());
        assert!(Date::parse("garbage").is_err());
    }

    #[test]
    fn test_date_ordering() {
        let a = Date::parse("2023-01-31").unwrap();
        let b = Date::parse("2023-02-01").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_timestamp_parse() {
        let ts = Timestamp::parse("2023-06-15 10:30:00").unwrap();
        assert_eq!(ts.hour, 10);
        assert_eq!(ts.minute, 30);
        assert_eq!(ts.to_string(), "2023-06-15 10:30:00");
    }

    #[test]
    fn test_timestamp_bare_date_is_midnight() {
        let ts = Timestamp::parse("2023-06-15").unwrap();
        assert_eq!((ts.hour, ts.minute, ts.second), (0, 0, 0));
    }

    #[test]
    fn test_timestamp_ordering() {
        let a = Timestamp::parse("2023-06-15 10:00:00").unwrap();
        let b = Timestamp::parse("2023-06-15 10:00:01").unwrap();
        let c = Timestamp::parse("2023-06-16 00:00:00").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_timestamp_rejects_invalid_time() {
        assert!(Timestamp::parse("2023-06-15 24:00:00").is_err());
        assert!(Timestamp::parse("2023-06-15 10:61:00").is_err());
    }
}
