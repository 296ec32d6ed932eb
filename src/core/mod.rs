pub mod params;
pub mod reader;
pub mod table;
pub mod text;

use auto_impl::auto_impl;

pub use params::ParameterMap;
pub use reader::ByteReader;
pub use table::{Table, Value};

use crate::dispatch::Format;

/// Physical chip dimensions as declared by a file header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipGeometry {
    pub num_columns: u32,
    pub num_rows: u32,
    /// Declared data cell (or unit) count
    pub num_cells: u32,
    pub num_qc_cells: u32,
}

impl ChipGeometry {
    #[must_use]
    pub fn new(num_columns: u32, num_rows: u32, num_cells: u32, num_qc_cells: u32) -> Self {
        Self {
            num_columns,
            num_rows,
            num_cells,
            num_qc_cells,
        }
    }

    /// `rows * cols`, widened so that it cannot overflow
    #[must_use]
    pub fn expected_cells(&self) -> u64 {
        u64::from(self.num_columns) * u64::from(self.num_rows)
    }

    /// Checks the declared cell count against `rows * cols`
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        u64::from(self.num_cells) == self.expected_cells()
    }

    /// Checks that `(x, y)` addresses a cell of the chip
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.num_columns && y < self.num_rows
    }
}

/// Common view over every decoded file
///
/// Each format keeps its own typed records; this trait exposes the
/// normalized table plus the metadata the downstream consumers need.
#[auto_impl(&, Box)]
pub trait DataFile {
    /// The format family the file was decoded as
    fn format(&self) -> Format;

    fn geometry(&self) -> ChipGeometry;

    /// Array design name used to tag probe-set identifiers
    fn chip_type(&self) -> Option<&str>;

    /// Header parameters and summary statistics
    fn parameters(&self) -> &ParameterMap;

    /// Builds the normalized row/column export
    fn table(&self) -> Table;
}
