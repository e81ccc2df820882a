// Display formatting and small statistics helpers used by the reports.
//
// Everything here is presentation: the pipeline itself never formats.
use num_format::{Locale, ToFormattedString};

/// Placeholder shown for undefined values (no population, no revenue...).
pub const UNDEFINED: &str = "-";

/// Fixed decimals with `,` thousands separators: `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return UNDEFINED.to_string();
    }
    let fixed = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let grouped = int_part
        .parse::<u64>()
        .map(|v| v.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());
    let mut out = String::with_capacity(grouped.len() + decimals + 2);
    // "-0.00" reads badly; only keep the sign when something non-zero shows.
    if n < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_optional(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals))
        .unwrap_or_else(|| UNDEFINED.to_string())
}

/// Compact euro amount with a K / M / Md suffix: `€12.3M`.
pub fn format_euros_compact(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return UNDEFINED.to_string();
    }
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1_000_000_000.0 {
        (value / 1_000_000_000.0, "Md")
    } else if abs >= 1_000_000.0 {
        (value / 1_000_000.0, "M")
    } else if abs >= 1_000.0 {
        (value / 1_000.0, "K")
    } else {
        (value, "")
    };
    format!("€{}{}", format_number(scaled, decimals), suffix)
}

pub fn format_population(p: Option<f64>) -> String {
    format_optional(p, 0)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Arithmetic mean; `None` for an empty slice.
pub fn average(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum::<f64>() / v.len() as f64)
}

pub fn median(mut v: Vec<f64>) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 1), "-1,500.0");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(42.0, 0), "42");
        assert_eq!(format_number(f64::NAN, 2), "-");
    }

    #[test]
    fn compact() {
        assert_eq!(format_euros_compact(2_500_000_000.0, 1), "€2.5Md");
        assert_eq!(format_euros_compact(12_340_000.0, 1), "€12.3M");
        assert_eq!(format_euros_compact(-4_500.0, 1), "€-4.5K");
        assert_eq!(format_euros_compact(950.0, 0), "€950");
    }

    #[test]
    fn optional_and_population() {
        assert_eq!(format_optional(None, 2), "-");
        assert_eq!(format_population(Some(153_810.0)), "153,810");
    }

    #[test]
    fn stats() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }
}
