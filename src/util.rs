// Utility helpers for parsing and basic statistics.
//
// Date handling and number formatting live here so the builders can work
// with typed values only.
use crate::types::RECORD_DATE_FORMAT;
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a submission timestamp in `YYYY-MM-DD-HH-mm` form.
pub fn parse_record_date(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), RECORD_DATE_FORMAT)
}

pub fn format_record_date(dt: &NaiveDateTime) -> String {
    dt.format(RECORD_DATE_FORMAT).to_string()
}

/// `mm/dd` label used to bucket records and to label chart axes.
pub fn month_day_label(dt: &NaiveDateTime) -> String {
    dt.format("%m/%d").to_string()
}

/// Check that a target label is a real `mm/dd` calendar day. The year is
/// irrelevant, so a leap year is used to accept `02/29`.
pub fn is_valid_month_day(label: &str) -> bool {
    if label.len() != 5 {
        return false;
    }
    NaiveDate::parse_from_str(&format!("2024/{}", label), "%Y/%m/%d").is_ok()
}

pub fn average(v: &[f64]) -> f64 {
    // Arithmetic mean; 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn median(mut v: Vec<f64>) -> f64 {
    // Takes the vector by value so it can be sorted in place.
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with thousands separators, e.g. `1,234.50`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minute_precision_timestamps() {
        let dt = parse_record_date("2024-11-04-09-30").unwrap();
        assert_eq!(format_record_date(&dt), "2024-11-04-09-30");
        assert_eq!(month_day_label(&dt), "11/04");
    }

    #[test]
    fn rejects_other_layouts() {
        assert!(parse_record_date("2024/11/04 09:30").is_err());
        assert!(parse_record_date("2024-11-04").is_err());
        assert!(parse_record_date("").is_err());
    }

    #[test]
    fn month_day_validation() {
        assert!(is_valid_month_day("12/30"));
        assert!(is_valid_month_day("02/29"));
        assert!(!is_valid_month_day("13/01"));
        assert!(!is_valid_month_day("1/6"));
        assert!(!is_valid_month_day("11-04"));
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(Vec::new()), 0.0);
    }

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[60.0, 70.0]), 65.0);
    }

    #[test]
    fn formats_numbers_with_separators() {
        assert_eq!(format_number(1234.5, 2), "1,234.50");
        assert_eq!(format_number(-7.0, 1), "-7.0");
        assert_eq!(format_number(80.0, 0), "80");
        assert_eq!(format_int(9855usize), "9,855");
    }
}
