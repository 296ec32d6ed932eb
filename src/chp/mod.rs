//! Results (CHP) files
//!
//! The record shape of a CHP body is fixed per file and derived from header
//! and body-prefix values: the results type, the expression analysis type
//! byte and, for genotyping, the chip size class. [`RecordLayout`] names the
//! active shape and [`ResultRecords`] stores the records of exactly that shape.

pub mod gdac;
pub mod record;
pub mod xda;

pub use record::{
    ComparisonResult, ExpressionResult, Genotyping100kResult, Genotyping10kResult,
    ResequencingResult, ResultRecord, ResultRecords, UniversalResult,
};

use crate::core::{ChipGeometry, DataFile, ParameterMap, Table, Value};
use crate::dispatch::Format;
use crate::error::{FormatError, Result};

/// Genotyping files with fewer cells than this use the 10k record shape
///
/// No product identifier reliably separates the two chip families, so the
/// cell count is the only discriminator.
pub const GENOTYPING_100K_THRESHOLD: u32 = 25_000;

/// Which analysis produced the body records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsType {
    Expression,
    Genotyping,
    Resequencing,
    Universal,
}
impl ResultsType {
    /// Maps the header code read at `offset`
    pub fn from_code(code: i32, offset: u64) -> Result<Self> {
        match code {
            0 => Ok(Self::Expression),
            1 => Ok(Self::Genotyping),
            2 => Ok(Self::Resequencing),
            3 => Ok(Self::Universal),
            _ => Err(FormatError::UnrecognizedResultsType {
                results_type: code,
                offset,
            }
            .into()),
        }
    }

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Expression => 0,
            Self::Genotyping => 1,
            Self::Resequencing => 2,
            Self::Universal => 3,
        }
    }
}

/// Genotyping chip family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipSizeClass {
    Mapping10k,
    Mapping100k,
}
impl ChipSizeClass {
    #[must_use]
    pub fn from_num_cells(num_cells: u32) -> Self {
        if num_cells < GENOTYPING_100K_THRESHOLD {
            Self::Mapping10k
        } else {
            Self::Mapping100k
        }
    }
}

/// Shape of every record in a CHP body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    Expression,
    ExpressionComparison,
    Genotyping10k,
    Genotyping100k,
    Resequencing,
    Universal,
}

impl RecordLayout {
    /// Selects the layout from the header values and the optional analysis type byte
    ///
    /// Analysis types 1 and 3 are comparison analyses.
    #[must_use]
    pub fn select(results_type: ResultsType, analysis_type: Option<u8>, num_cells: u32) -> Self {
        match results_type {
            ResultsType::Expression => match analysis_type {
                Some(1 | 3) => Self::ExpressionComparison,
                _ => Self::Expression,
            },
            ResultsType::Genotyping => match ChipSizeClass::from_num_cells(num_cells) {
                ChipSizeClass::Mapping10k => Self::Genotyping10k,
                ChipSizeClass::Mapping100k => Self::Genotyping100k,
            },
            ResultsType::Resequencing => Self::Resequencing,
            ResultsType::Universal => Self::Universal,
        }
    }

    /// Exported column names
    #[must_use]
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Expression => &[
                "Unit",
                "Detection",
                "DetectionPValue",
                "Signal",
                "NumPairs",
                "NumUsedPairs",
            ],
            Self::ExpressionComparison => &[
                "Unit",
                "Detection",
                "DetectionPValue",
                "Signal",
                "NumPairs",
                "NumUsedPairs",
                "Change",
                "ChangePValue",
                "SignalLogRatio",
                "SignalLogRatioLow",
                "SignalLogRatioHigh",
                "CommonPairs",
            ],
            Self::Genotyping10k => &["Unit", "Call", "Confidence", "RAS1", "RAS2"],
            Self::Genotyping100k => &[
                "Unit",
                "Call",
                "Confidence",
                "pAA",
                "pAB",
                "pBB",
                "pNoCall",
            ],
            Self::Resequencing => &["Unit", "Bases", "Scores"],
            Self::Universal => &["Unit", "Background"],
        }
    }

    /// Bytes a fixed-shape record occupies, `None` for resequencing
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Expression => Some(13),
            Self::ExpressionComparison => Some(13 + 19),
            Self::Genotyping10k | Self::Genotyping100k => Some(21),
            Self::Resequencing => None,
            Self::Universal => Some(4),
        }
    }
}

/// Detection call label
#[must_use]
pub fn detection_label(code: u8) -> Value {
    match code {
        0 => "P".into(),
        1 => "M".into(),
        2 => "A".into(),
        3 => "No Call".into(),
        other => Value::Int(other.into()),
    }
}

/// Change call label
#[must_use]
pub fn change_label(code: u8) -> Value {
    match code {
        1 => "I".into(),
        2 => "D".into(),
        3 => "MI".into(),
        4 => "MD".into(),
        5 => "NC".into(),
        6 => "No Call".into(),
        other => Value::Int(other.into()),
    }
}

/// Genotype call label
#[must_use]
pub fn genotype_label(code: u8) -> Value {
    match code {
        6 => "AA".into(),
        7 => "BB".into(),
        8 => "AB".into(),
        11 => "No Call".into(),
        other => Value::Int(other.into()),
    }
}

/// A decoded CHP file
#[derive(Debug, Clone)]
pub struct ChpFile {
    pub(crate) format: Format,
    pub(crate) version: i32,
    pub(crate) geometry: ChipGeometry,
    pub(crate) results_type: ResultsType,
    pub(crate) program_id: String,
    pub(crate) parent_cel: String,
    pub(crate) chip_type: String,
    pub(crate) algorithm_name: String,
    pub(crate) algorithm_version: String,
    pub(crate) parameters: ParameterMap,
    pub(crate) records: ResultRecords,
    pub(crate) rounded: bool,
}

impl ChpFile {
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    #[must_use]
    pub fn results_type(&self) -> ResultsType {
        self.results_type
    }

    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        self.records.layout()
    }

    #[must_use]
    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    #[must_use]
    pub fn parent_cel(&self) -> &str {
        &self.parent_cel
    }

    #[must_use]
    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    #[must_use]
    pub fn algorithm_version(&self) -> &str {
        &self.algorithm_version
    }

    #[must_use]
    pub fn records(&self) -> &ResultRecords {
        &self.records
    }
}

impl DataFile for ChpFile {
    fn format(&self) -> Format {
        self.format
    }

    fn geometry(&self) -> ChipGeometry {
        self.geometry
    }

    fn chip_type(&self) -> Option<&str> {
        Some(self.chip_type.as_str()).filter(|s| !s.is_empty())
    }

    fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    fn table(&self) -> Table {
        let layout = self.layout();
        let mut table = Table::with_capacity(layout.columns(), self.records.len());
        for (unit, record) in self.records.iter().enumerate() {
            let mut row = Vec::with_capacity(layout.columns().len());
            row.push(Value::UInt(unit as u64));
            record.push_values(&mut row, self.rounded);
            table.push_row(row);
        }
        table
    }
}
