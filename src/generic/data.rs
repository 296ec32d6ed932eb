//! Data groups, data sets and their row tables

use std::collections::HashMap;
use std::io::{Read, Seek};

use byteorder::BigEndian;
use log::debug;

use super::column::{ColumnReader, DataColumn};
use super::header::{read_parameters, Parameter};
use crate::core::{ByteReader, Table, Value};
use crate::error::Result;

/// Column index to code to label
///
/// Columns without an entry, and codes without a label, pass their decoded
/// value through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMapping {
    columns: HashMap<usize, HashMap<i64, String>>,
}

impl ValueMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The MAS5 detection call labels
    #[must_use]
    pub fn mas5_detection() -> HashMap<i64, String> {
        [(0, "Present"), (1, "Marginal"), (2, "Absent"), (3, "NoCall")]
            .into_iter()
            .map(|(code, label)| (code, label.to_string()))
            .collect()
    }

    /// Adds or replaces the labels of `column`
    #[must_use]
    pub fn with_column(mut self, column: usize, labels: HashMap<i64, String>) -> Self {
        self.columns.insert(column, labels);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Applies the mapping of `column` to `value`
    #[must_use]
    pub fn apply(&self, column: usize, value: Value) -> Value {
        let label = self
            .columns
            .get(&column)
            .zip(value.as_i64())
            .and_then(|(labels, code)| labels.get(&code));
        match label {
            Some(label) => Value::Text(label.clone()),
            None => value,
        }
    }
}

/// One data set: its schema and its decoded rows
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub columns: Vec<DataColumn>,
    pub row_count: u32,
    pub first_element_pos: u32,
    pub next_set_pos: u32,
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Reads the set header at the reader's position, then its rows
    ///
    /// The reader is left at the end of the row table; callers follow
    /// [`DataSet::next_set_pos`] to reach the next set.
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R, BigEndian>) -> Result<Self> {
        let first_element_pos = reader.read_u32()?;
        let next_set_pos = reader.read_u32()?;
        let name = reader.read_wide_str()?;
        let parameters = read_parameters(reader)?;

        let num_columns = reader.read_count("column")?;
        let mut columns = Vec::with_capacity(num_columns.min(1 << 10));
        for _ in 0..num_columns {
            columns.push(DataColumn::read(reader)?);
        }
        let row_count = reader.read_count("row")? as u32;

        let row_width: u64 = columns.iter().map(|c| u64::from(c.width)).sum();
        reader.seek_to(first_element_pos.into())?;
        reader.ensure_remaining(row_width.saturating_mul(row_count.into()))?;

        let readers: Vec<ColumnReader<R>> = columns.iter().map(DataColumn::reader).collect();
        let mut rows = Vec::with_capacity((row_count as usize).min(1 << 16));
        for _ in 0..row_count {
            let mut row = Vec::with_capacity(columns.len());
            for (read, column) in readers.iter().zip(&columns) {
                row.push(read(reader, column)?);
            }
            rows.push(row);
        }
        debug!("data set '{name}': {row_count} rows of {num_columns} columns");

        Ok(Self {
            name,
            parameters,
            columns,
            row_count,
            first_element_pos,
            next_set_pos,
            rows,
        })
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Rows with `mapping` applied, tab-joined in column declaration order
    #[must_use]
    pub fn export_rows(&self, mapping: &ValueMapping) -> Vec<String> {
        let names: Vec<&str> = self.column_names().collect();
        let mut table = Table::with_capacity(&names, self.rows.len());
        for row in &self.rows {
            table.push_row(
                row.iter()
                    .enumerate()
                    .map(|(i, value)| mapping.apply(i, value.clone()))
                    .collect(),
            );
        }
        (0..table.num_rows()).filter_map(|i| table.row_tsv(i)).collect()
    }
}

/// A named group of data sets
#[derive(Debug, Clone, PartialEq)]
pub struct DataGroup {
    pub name: String,
    pub next_group_pos: u32,
    pub data_sets: Vec<DataSet>,
}

impl DataGroup {
    /// Reads the group header at the reader's position and all of its sets
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R, BigEndian>) -> Result<Self> {
        let next_group_pos = reader.read_u32()?;
        let first_set_pos = reader.read_u32()?;
        let num_sets = reader.read_count("data set")?;
        let name = reader.read_wide_str()?;

        let mut data_sets = Vec::with_capacity(num_sets.min(1 << 10));
        let mut pos = first_set_pos;
        for _ in 0..num_sets {
            reader.seek_to(pos.into())?;
            let set = DataSet::read(reader)?;
            pos = set.next_set_pos;
            data_sets.push(set);
        }
        Ok(Self {
            name,
            next_group_pos,
            data_sets,
        })
    }
}
