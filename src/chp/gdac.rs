//! Legacy GDAC CHP (`"GeneChip Sequence File"`)
//!
//! Layout, all little-endian:
//!
//! ```text
//! magic       22 ASCII bytes
//! header      version i32 (8, 12 or 13), algorithm name, algorithm version,
//!             parameter blob, summary blob (each i32 length + text),
//!             cols u16, rows u16, units i32, max pairs i32, qc units i32,
//!             results type i32, chip type, parent CEL,
//!             program id (absent in version 8)
//! body        units x expression records, comparison records in version 13
//! ```
//!
//! Only expression results were ever written in this family.

use std::io::{Read, Seek};

use super::record::read_records;
use super::{ChpFile, RecordLayout, ResultsType};
use crate::core::params::{parse_assignments, split_summary_stat};
use crate::core::reader::check_count;
use crate::core::{ByteReader, ChipGeometry, ParameterMap};
use crate::dispatch::Format;
use crate::error::{FormatError, Result};
use crate::policy::DecodeOptions;

pub const MAGIC: &[u8; 22] = b"GeneChip Sequence File";

/// Byte offset of the version field
const VERSION_OFFSET: u64 = 22;

/// Versions 8 and 12 differ only by the header program id
fn layout_for(version: i32) -> Option<RecordLayout> {
    match version {
        8 | 12 => Some(RecordLayout::Expression),
        13 => Some(RecordLayout::ExpressionComparison),
        _ => None,
    }
}

/// Decodes a GDAC CHP from the start of `inner`
pub fn decode<R: Read + Seek>(inner: R, options: &DecodeOptions) -> Result<ChpFile> {
    let mut reader: ByteReader<R> = ByteReader::new(inner)?;
    reader.rewind()?;

    let magic = reader.read_bytes(MAGIC.len())?;
    if magic != MAGIC {
        let found = i32::from_le_bytes([magic[0], magic[1], magic[2], magic[3]]);
        return Err(FormatError::InvalidMagicNumber {
            format: "GDAC CHP",
            expected: Format::ChpGdac.signature().into(),
            found: found.into(),
        }
        .into());
    }
    let version = reader.read_i32()?;

    let algorithm_name = reader.read_prefixed_str()?;
    let algorithm_version = reader.read_prefixed_str()?;
    let parameter_blob = reader.read_prefixed_str()?;
    let summary_blob = reader.read_prefixed_str()?;

    let cols = reader.read_u16()?;
    let rows = reader.read_u16()?;
    let units_offset = reader.position();
    let num_units = check_count("unit", reader.read_i32()?, units_offset)?;
    let max_pairs = reader.read_i32()?;
    let qc_offset = reader.position();
    let num_qc_units = check_count("QC unit", reader.read_i32()?, qc_offset)?;
    let results_type_offset = reader.position();
    let results_type = reader.read_i32()?;

    let chip_type = reader.read_prefixed_str()?;
    let parent_cel = reader.read_prefixed_str()?;
    let program_id = if version == 8 {
        String::new()
    } else {
        reader.read_prefixed_str()?
    };

    let Some(layout) = layout_for(version) else {
        return Err(FormatError::UnrecognizedVersion {
            format: "GDAC CHP",
            version,
            offset: VERSION_OFFSET,
        }
        .into());
    };
    if results_type != ResultsType::Expression.code() {
        return Err(FormatError::UnrecognizedResultsType {
            results_type,
            offset: results_type_offset,
        }
        .into());
    }

    let mut parameters: ParameterMap = parse_assignments(&parameter_blob, '=').into_iter().collect();
    for (name, value) in parse_assignments(&summary_blob, '=') {
        parameters.extend(split_summary_stat(&name, &value));
    }
    parameters.insert("MaxPairs", max_pairs.to_string());

    let record_size = layout.fixed_size().map_or(0, |size| size as i32);
    let records = read_records(&mut reader, layout, num_units, record_size, options)?;

    Ok(ChpFile {
        format: Format::ChpGdac,
        version,
        geometry: ChipGeometry::new(
            cols.into(),
            rows.into(),
            num_units as u32,
            num_qc_units as u32,
        ),
        results_type: ResultsType::Expression,
        program_id,
        parent_cel,
        chip_type,
        algorithm_name,
        algorithm_version,
        parameters,
        records,
        rounded: options.round_values,
    })
}
