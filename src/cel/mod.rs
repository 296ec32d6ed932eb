//! Cell intensity (CEL) files
//!
//! The intensity table is built in stages: the body fills every cell, then
//! the masked and outlier lists flag cells by coordinate. [`CellTableBuilder`]
//! owns the table while it is mutable and [`CellTableBuilder::finish`]
//! freezes it into the decoded [`CelFile`].

pub mod text;
pub mod xda;

use crate::core::{ChipGeometry, DataFile, ParameterMap, Table, Value};
use crate::dispatch::Format;
use crate::error::{Location, RecordError, Result};

/// Decimal places of exported intensity and stddev values
pub const INTENSITY_PLACES: u8 = 1;

/// One scanned cell
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntensityCell {
    pub x: u32,
    pub y: u32,
    pub intensity: f32,
    pub stddev: f32,
    pub pixels: u16,
    pub masked: bool,
    pub outlier: bool,
}

/// Grid alignment record of a CEL v4 file
///
/// Decoded for completeness; the field meanings have not been validated
/// against instrument output and nothing downstream consumes them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subgrid {
    pub row: i32,
    pub column: i32,
    /// Pixel corners as `(x, y)`: upper-left, upper-right, lower-left, lower-right
    pub corners: [(f32, f32); 4],
    /// Cell bounds: left, top, right, bottom
    pub bounds: [i32; 4],
}

/// Which auxiliary list a coordinate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFlag {
    Masked,
    Outlier,
}
impl CellFlag {
    fn name(self) -> &'static str {
        match self {
            Self::Masked => "masked",
            Self::Outlier => "outlier",
        }
    }
}

/// Mutable intensity table indexed by `(x, y)`
#[derive(Debug)]
pub struct CellTableBuilder {
    cols: u32,
    rows: u32,
    cells: Vec<IntensityCell>,
}

impl CellTableBuilder {
    /// Allocates `cols * rows` empty cells in row-major order
    #[must_use]
    pub fn new(cols: u32, rows: u32) -> Self {
        let cells = (0..rows)
            .flat_map(|y| {
                (0..cols).map(move |x| IntensityCell {
                    x,
                    y,
                    ..Default::default()
                })
            })
            .collect();
        Self { cols, rows, cells }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.cols && y < self.rows).then(|| y as usize * self.cols as usize + x as usize)
    }

    fn out_of_range(
        &self,
        list: &'static str,
        record: usize,
        x: u32,
        y: u32,
        location: Location,
    ) -> crate::error::Error {
        RecordError::OutOfRangeCoordinate {
            list,
            record,
            x,
            y,
            cols: self.cols,
            rows: self.rows,
            location,
        }
        .into()
    }

    /// Stores a measurement at its `(x, y)` slot; its flags are ignored
    pub fn set(&mut self, record: usize, measured: IntensityCell, location: Location) -> Result<()> {
        let Some(i) = self.index(measured.x, measured.y) else {
            return Err(self.out_of_range("intensity", record, measured.x, measured.y, location));
        };
        let cell = &mut self.cells[i];
        cell.intensity = measured.intensity;
        cell.stddev = measured.stddev;
        cell.pixels = measured.pixels;
        Ok(())
    }

    /// Sets `flag` on the cell at `(x, y)`
    ///
    /// Setting is idempotent, so a coordinate listed twice is flagged once.
    pub fn mark(&mut self, flag: CellFlag, record: usize, x: u32, y: u32, location: Location) -> Result<()> {
        let Some(i) = self.index(x, y) else {
            return Err(self.out_of_range(flag.name(), record, x, y, location));
        };
        let cell = &mut self.cells[i];
        match flag {
            CellFlag::Masked => cell.masked = true,
            CellFlag::Outlier => cell.outlier = true,
        }
        Ok(())
    }

    /// Freezes the table
    #[must_use]
    pub fn finish(self) -> Vec<IntensityCell> {
        self.cells
    }
}

/// A decoded CEL file
#[derive(Debug, Clone)]
pub struct CelFile {
    pub(crate) format: Format,
    pub(crate) version: i32,
    pub(crate) geometry: ChipGeometry,
    pub(crate) algorithm: String,
    pub(crate) chip_type: Option<String>,
    pub(crate) parameters: ParameterMap,
    pub(crate) cells: Vec<IntensityCell>,
    pub(crate) subgrids: Vec<Subgrid>,
    pub(crate) rounded: bool,
}

impl CelFile {
    pub const COLUMNS: [&'static str; 7] =
        ["X", "Y", "MEAN", "STDV", "NPIXELS", "MASKED", "OUTLIER"];

    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Cells in row-major order
    #[must_use]
    pub fn cells(&self) -> &[IntensityCell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, x: u32, y: u32) -> Option<&IntensityCell> {
        let cols = self.geometry.num_columns;
        if x >= cols || y >= self.geometry.num_rows {
            return None;
        }
        self.cells.get(y as usize * cols as usize + x as usize)
    }

    #[must_use]
    pub fn subgrids(&self) -> &[Subgrid] {
        &self.subgrids
    }

    #[must_use]
    pub fn num_masked(&self) -> usize {
        self.cells.iter().filter(|c| c.masked).count()
    }

    #[must_use]
    pub fn num_outliers(&self) -> usize {
        self.cells.iter().filter(|c| c.outlier).count()
    }

    fn float(&self, value: f32) -> Value {
        if self.rounded {
            Value::Fixed {
                value,
                places: INTENSITY_PLACES,
            }
        } else {
            Value::Float(value)
        }
    }
}

impl DataFile for CelFile {
    fn format(&self) -> Format {
        self.format
    }

    fn geometry(&self) -> ChipGeometry {
        self.geometry
    }

    fn chip_type(&self) -> Option<&str> {
        self.chip_type.as_deref()
    }

    fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    fn table(&self) -> Table {
        let mut table = Table::with_capacity(&Self::COLUMNS, self.cells.len());
        for cell in &self.cells {
            table.push_row(vec![
                Value::from(cell.x),
                Value::from(cell.y),
                self.float(cell.intensity),
                self.float(cell.stddev),
                Value::from(cell.pixels),
                Value::from(cell.masked),
                Value::from(cell.outlier),
            ]);
        }
        table
    }
}

/// Extracts the array name from a `DatHeader` value
///
/// The header embeds the scanned array file as `<name>.1sq`.
pub(crate) fn chip_type_from_dat_header(dat_header: &str) -> Option<String> {
    dat_header
        .split_whitespace()
        .find_map(|token| token.strip_suffix(".1sq"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
