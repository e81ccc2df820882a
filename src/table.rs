// In-memory representation of a loaded dataset.
//
// Column names are whatever the header says; nothing here assumes a schema.
// The schema module decides which column plays which role.
use serde::Serialize;
use std::fmt;

/// A single cell as handed over by the loader (or built directly by callers).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// Build a cell from raw CSV text. Blank fields become `Missing`.
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Missing
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
        }
    }

    /// Trimmed text view of the cell; numbers are rendered without a
    /// trailing `.0` when integral so `974` and `"974"` read the same.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_key() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, ""),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::from_text(s)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::from_text(&s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Number(n as f64)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Missing)
    }
}

/// One source row. Cells are positional and line up with `RawTable::headers`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub cells: Vec<Cell>,
}

impl RawRecord {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Cell at `index`; short rows read as missing rather than panicking.
    pub fn get(&self, index: usize) -> &Cell {
        static MISSING: Cell = Cell::Missing;
        self.cells.get(index).unwrap_or(&MISSING)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, C>(&mut self, cells: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        self.rows
            .push(RawRecord::new(cells.into_iter().map(Into::into).collect()));
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Look a cell up by header name.
    pub fn cell<'a>(&self, row: &'a RawRecord, name: &str) -> Option<&'a Cell> {
        self.column_index(name).map(|i| row.get(i))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
