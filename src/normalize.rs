// Numeric cleanup for French-formatted exports.
//
// OFGL extracts write `1 234 567,89`: spaces (often non-breaking) group
// thousands and the comma is the decimal mark. A cell that cannot be read
// is `None`, never `0.0`.
use crate::table::Cell;

/// Normalize a cell to a number.
///
/// - Numbers pass through unchanged (NaN counts as missing).
/// - Text has every whitespace character removed, the decimal comma
///   replaced by a point, then goes through the standard float parser.
/// - Missing cells and anything unparseable return `None`.
pub fn normalize(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) => None,
        Cell::Missing => None,
        Cell::Text(s) => normalize_str(s),
    }
}

pub fn normalize_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    // `f64::from_str` accepts "inf" and "NaN"; those are not amounts.
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Read a fiscal year. Accepts `2017`, `"2017"` and `"2017,0"`; fractional
/// or out-of-range values are rejected.
pub fn parse_year(cell: &Cell) -> Option<i32> {
    let v = normalize(cell)?;
    if v.fract() != 0.0 || !(1000.0..=9999.0).contains(&v) {
        return None;
    }
    Some(v as i32)
}

/// Outcome of normalizing a cell, keeping "absent" apart from "present but
/// unreadable" for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalized {
    Value(f64),
    Absent,
    Unparseable,
}

pub fn classify(cell: &Cell) -> Normalized {
    if cell.is_missing() {
        return Normalized::Absent;
    }
    match normalize(cell) {
        Some(v) => Normalized::Value(v),
        None => Normalized::Unparseable,
    }
}
