//! Generic (Command Console) data container
//!
//! A self-describing big-endian container: a file header, a data header
//! with parameters and parent headers, then a linked list of data groups,
//! each a linked list of data sets. Every data set carries its own column
//! schema, so rows are decoded by per-column readers chosen at runtime.
//!
//! ```text
//! file header   magic u8 (59), version u8 (1), groups i32, first group u32
//! data header   type id, file id (i32 length + ASCII), creation time,
//!               locale (wide strings), parameters, parents (nested headers)
//! group         next group u32, first set u32, sets i32, name
//! set           first element u32, next set u32, name, parameters,
//!               columns u32 x (name, type u8, width i32), rows u32
//! ```

pub mod column;
pub mod data;
pub mod header;

pub use column::{ColumnReader, ColumnType, DataColumn};
pub use data::{DataGroup, DataSet, ValueMapping};
pub use header::{DataHeader, FileHeader, Parameter};

use std::io::{Read, Seek};

use byteorder::BigEndian;

use crate::core::{ByteReader, ChipGeometry, DataFile, ParameterMap, Table, Value};
use crate::dispatch::Format;
use crate::error::Result;

/// Parameter naming the array design
pub const ARRAY_TYPE_PARAMETER: &str = "affymetrix-array-type";
/// Column holding probe-set identifiers
pub const PROBE_SET_COLUMN: &str = "ProbeSetName";
/// Column holding MAS5 detection calls
pub const DETECTION_COLUMN: &str = "Detection";

const COLS_PARAMETER: &str = "affymetrix-cel-cols";
const ROWS_PARAMETER: &str = "affymetrix-cel-rows";

/// A decoded generic container
#[derive(Debug, Clone)]
pub struct GenericFile {
    file_header: FileHeader,
    header: DataHeader,
    groups: Vec<DataGroup>,
    parameters: ParameterMap,
}

/// Decodes a generic container from the start of `inner`
pub fn decode<R: Read + Seek>(inner: R) -> Result<GenericFile> {
    let mut reader: ByteReader<R, BigEndian> = ByteReader::new(inner)?;
    reader.rewind()?;

    let file_header = FileHeader::read(&mut reader)?;
    let header = DataHeader::read(&mut reader)?;

    let mut groups = Vec::with_capacity((file_header.num_groups as usize).min(1 << 10));
    let mut pos = file_header.first_group_pos;
    for _ in 0..file_header.num_groups {
        reader.seek_to(pos.into())?;
        let group = DataGroup::read(&mut reader)?;
        pos = group.next_group_pos;
        groups.push(group);
    }

    let mut parameters = ParameterMap::new();
    collect_parameters(&header, &mut parameters);
    Ok(GenericFile {
        file_header,
        header,
        groups,
        parameters,
    })
}

/// Flattens parameters, parents first so a header overrides what it inherits
fn collect_parameters(header: &DataHeader, into: &mut ParameterMap) {
    for parent in &header.parents {
        collect_parameters(parent, into);
    }
    into.extend(header.parameters.iter().map(|p| (p.name.as_str(), p.value.as_str())));
}

impl GenericFile {
    #[must_use]
    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    #[must_use]
    pub fn header(&self) -> &DataHeader {
        &self.header
    }

    #[must_use]
    pub fn groups(&self) -> &[DataGroup] {
        &self.groups
    }

    /// All data sets in file order
    pub fn data_sets(&self) -> impl Iterator<Item = &DataSet> {
        self.groups.iter().flat_map(|g| g.data_sets.iter())
    }

    /// The data set exported by [`DataFile::table`]: the first with a schema
    #[must_use]
    pub fn primary_data_set(&self) -> Option<&DataSet> {
        self.data_sets().find(|s| !s.columns.is_empty())
    }

    /// Maps every `Detection` column of `set` to the MAS5 labels
    #[must_use]
    pub fn detection_mapping(set: &DataSet) -> ValueMapping {
        set.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name == DETECTION_COLUMN)
            .fold(ValueMapping::new(), |mapping, (i, _)| {
                mapping.with_column(i, ValueMapping::mas5_detection())
            })
    }

    fn geometry_parameter(&self, name: &str) -> u32 {
        self.header
            .find_parameter(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl DataFile for GenericFile {
    fn format(&self) -> Format {
        Format::Generic
    }

    fn geometry(&self) -> ChipGeometry {
        ChipGeometry::new(
            self.geometry_parameter(COLS_PARAMETER),
            self.geometry_parameter(ROWS_PARAMETER),
            self.primary_data_set().map_or(0, |s| s.row_count),
            0,
        )
    }

    fn chip_type(&self) -> Option<&str> {
        self.header
            .find_parameter(ARRAY_TYPE_PARAMETER)
            .filter(|s| !s.is_empty())
    }

    fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    fn table(&self) -> Table {
        let Some(set) = self.primary_data_set() else {
            return Table::new::<&str>(&[]);
        };
        let names: Vec<&str> = set.column_names().collect();
        let mapping = Self::detection_mapping(set);
        let probe_set = set.columns.iter().position(|c| c.name == PROBE_SET_COLUMN);
        let chip_type = self.chip_type();

        let mut table = Table::with_capacity(&names, set.rows.len());
        for row in &set.rows {
            let values = row
                .iter()
                .enumerate()
                .map(|(i, value)| match (Some(i) == probe_set, chip_type, value) {
                    (true, Some(chip), Value::Text(name)) => Value::Text(format!("{chip}:{name}")),
                    _ => mapping.apply(i, value.clone()),
                })
                .collect();
            table.push_row(values);
        }
        table
    }
}
