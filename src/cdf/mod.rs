//! Probe layout (CDF) files
//!
//! Both encodings produce a [`CdfFile`]: the chip geometry, the QC units and
//! the probe units, each unit owning its blocks and each block its cells.

pub mod text;
pub mod xda;

use crate::core::{ChipGeometry, DataFile, ParameterMap, Table, Value};
use crate::dispatch::Format;
use crate::error::{Result, SectionError};

/// Unit name used by expression CDFs whose probe-set name lives on the block
pub const UNRESOLVED_NAME: &str = "NONE";

/// A single probe cell of a unit block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCell {
    pub atom: i32,
    pub x: u32,
    pub y: u32,
    /// Base of the probe at the interrogation position
    pub probe_base: char,
    /// Base of the target at the interrogation position
    pub target_base: char,
    /// Position in the reference sequence (binary encoding only)
    pub reference_position: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub direction: u8,
    pub cells: Vec<ProbeCell>,
}

/// A probe set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeUnit {
    pub unit_number: u32,
    pub name: String,
    pub unit_type: u16,
    pub direction: u8,
    pub blocks: Vec<Block>,
}

impl ProbeUnit {
    /// Total number of probe cells across all blocks
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.blocks.iter().map(|b| b.cells.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcCell {
    pub x: u32,
    pub y: u32,
    pub probe_length: u8,
    pub perfect_match: bool,
    pub background: bool,
}

/// A quality-control unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcUnit {
    pub qc_type: u16,
    pub cells: Vec<QcCell>,
}

/// A decoded CDF file
#[derive(Debug, Clone)]
pub struct CdfFile {
    pub(crate) format: Format,
    pub(crate) geometry: ChipGeometry,
    pub(crate) chip_type: Option<String>,
    pub(crate) parameters: ParameterMap,
    pub(crate) qc_units: Vec<QcUnit>,
    pub(crate) units: Vec<ProbeUnit>,
}

impl CdfFile {
    #[must_use]
    pub fn units(&self) -> &[ProbeUnit] {
        &self.units
    }

    #[must_use]
    pub fn qc_units(&self) -> &[QcUnit] {
        &self.qc_units
    }

    /// Looks up a unit by name
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&ProbeUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// The export columns, one row per probe cell
    pub const COLUMNS: [&'static str; 9] = [
        "Unit", "UnitName", "Block", "Atom", "X", "Y", "PBase", "TBase", "RefPos",
    ];
}

impl DataFile for CdfFile {
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
        let total = self.units.iter().map(ProbeUnit::num_cells).sum();
        let mut table = Table::with_capacity(&Self::COLUMNS, total);
        for unit in &self.units {
            for block in &unit.blocks {
                for cell in &block.cells {
                    table.push_row(vec![
                        Value::from(unit.unit_number),
                        Value::from(unit.name.as_str()),
                        Value::from(block.name.as_str()),
                        Value::from(cell.atom),
                        Value::from(cell.x),
                        Value::from(cell.y),
                        Value::Text(cell.probe_base.to_string()),
                        Value::Text(cell.target_base.to_string()),
                        cell.reference_position
                            .map_or_else(|| Value::from(""), Value::from),
                    ]);
                }
            }
        }
        table
    }
}

/// Resolves a unit's declared name, falling back to its first named block
pub(crate) fn resolve_unit_name(unit_number: u32, declared: &str, blocks: &[Block]) -> Result<String> {
    let usable = |name: &str| !name.is_empty() && name != UNRESOLVED_NAME;
    if usable(declared) {
        return Ok(declared.to_string());
    }
    blocks
        .first()
        .map(|b| b.name.as_str())
        .filter(|name| usable(name))
        .map(str::to_string)
        .ok_or_else(|| SectionError::UnresolvedUnitName { unit: unit_number }.into())
}
