//! The normalized row/column view every decoder exports

use std::fmt;
use std::io::Write;

use crate::error::Result;

/// A single decoded cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    /// A float printed in its shortest round-trip form
    Float(f32),
    /// A float printed with a fixed number of decimal places
    Fixed { value: f32, places: u8 },
    Text(String),
    Bool(bool),
}

impl Value {
    /// Integer view used by categorical value mappings
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Appends the textual form to `out`
    ///
    /// Integers go through `itoa` to keep large exports cheap.
    pub fn write_to(&self, out: &mut Vec<u8>, ibuf: &mut itoa::Buffer) {
        match self {
            Self::Int(v) => out.extend_from_slice(ibuf.format(*v).as_bytes()),
            Self::UInt(v) => out.extend_from_slice(ibuf.format(*v).as_bytes()),
            Self::Text(s) => out.extend_from_slice(s.as_bytes()),
            other => out.extend_from_slice(other.to_string().as_bytes()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Fixed { value, places } => write!(f, "{value:.prec$}", prec = *places as usize),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Ordered rows under named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    #[must_use]
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity<S: AsRef<str>>(columns: &[S], rows: usize) -> Self {
        let mut table = Self::new(columns);
        table.rows.reserve(rows);
        table
    }

    /// Appends a row; its length must match the column count
    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns the value at `row` in column `name`
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col)
    }

    /// Formats a single row as tab-separated text (no trailing newline)
    #[must_use]
    pub fn row_tsv(&self, row: usize) -> Option<String> {
        let mut out = Vec::new();
        let mut ibuf = itoa::Buffer::new();
        write_row(&mut out, self.rows.get(row)?, &mut ibuf);
        Some(String::from_utf8_lossy(&out).into_owned())
    }

    /// Writes the header line and every row as tab-separated text
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.columns.join("\t").as_bytes())?;
        writer.write_all(b"\n")?;

        let mut line = Vec::new();
        let mut ibuf = itoa::Buffer::new();
        for row in &self.rows {
            line.clear();
            write_row(&mut line, row, &mut ibuf);
            line.push(b'\n');
            writer.write_all(&line)?;
        }
        Ok(())
    }
}

fn write_row(out: &mut Vec<u8>, row: &[Value], ibuf: &mut itoa::Buffer) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            out.push(b'\t');
        }
        value.write_to(out, ibuf);
    }
}

/// Rounds `value` to `places` decimal places
pub(crate) fn round_to(value: f32, places: u8) -> f32 {
    let scale = 10f64.powi(i32::from(places));
    ((f64::from(value) * scale).round() / scale) as f32
}
