//! Binary (XDA) CHP
//!
//! Layout, all little-endian:
//!
//! ```text
//! header      magic i32 (65), version i32, cols u16, rows u16, cells i32,
//!             qc cells i32, results type i32,
//!             program id, parent CEL, chip type, algorithm name,
//!             algorithm version (each i32 length + text)
//! parameters  count i32, then count x (name, value) prefixed strings
//! summary     count i32, then count x (name, value) prefixed strings
//! zones       count i32, smoothing f32, then count x (cx f32, cy f32, value f32)
//! expression  analysis type u8 (results type 0 only)
//! body        record size i32, then cells x records of the active layout
//! ```

use std::io::{Read, Seek};

use bytemuck::{Pod, Zeroable};
use log::debug;

use super::record::read_records;
use super::{ChpFile, RecordLayout, ResultsType};
use crate::core::params::split_summary_stat;
use crate::core::reader::check_count;
use crate::core::{ByteReader, ChipGeometry, ParameterMap};
use crate::dispatch::Format;
use crate::error::{FormatError, Result};
use crate::policy::DecodeOptions;

pub const MAGIC: i32 = 65;

/// Byte offset of the results type field
const RESULTS_TYPE_OFFSET: u64 = 20;

/// Fixed-width header prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
struct ChpHeader {
    magic: i32,
    version: i32,
    cols: u16,
    rows: u16,
    num_cells: i32,
    num_qc_cells: i32,
    results_type: i32,
}
impl ChpHeader {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: Self = bytemuck::pod_read_unaligned(bytes);
        let header = Self {
            magic: i32::from_le(raw.magic),
            version: i32::from_le(raw.version),
            cols: u16::from_le(raw.cols),
            rows: u16::from_le(raw.rows),
            num_cells: i32::from_le(raw.num_cells),
            num_qc_cells: i32::from_le(raw.num_qc_cells),
            results_type: i32::from_le(raw.results_type),
        };
        if header.magic != MAGIC {
            return Err(FormatError::InvalidMagicNumber {
                format: "XDA CHP",
                expected: MAGIC.into(),
                found: header.magic.into(),
            }
            .into());
        }
        Ok(header)
    }
}

/// Reads a block of `count` prefixed name/value pairs
fn read_pairs<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    field: &'static str,
) -> Result<Vec<(String, String)>> {
    let count = reader.read_count(field)?;
    let mut pairs = Vec::with_capacity(count.min(1 << 10));
    for _ in 0..count {
        let name = reader.read_prefixed_str()?;
        let value = reader.read_prefixed_str()?;
        pairs.push((name, value));
    }
    Ok(pairs)
}

/// Decodes an XDA CHP from the start of `inner`
pub fn decode<R: Read + Seek>(inner: R, options: &DecodeOptions) -> Result<ChpFile> {
    let mut reader: ByteReader<R> = ByteReader::new(inner)?;
    reader.rewind()?;

    let header = ChpHeader::from_bytes(&reader.read_bytes(size_of::<ChpHeader>())?)?;
    let num_cells = check_count("cell", header.num_cells, 12)?;
    let num_qc_cells = check_count("QC cell", header.num_qc_cells, 16)?;
    let results_type = ResultsType::from_code(header.results_type, RESULTS_TYPE_OFFSET)?;

    let program_id = reader.read_prefixed_str()?;
    let parent_cel = reader.read_prefixed_str()?;
    let chip_type = reader.read_prefixed_str()?;
    let algorithm_name = reader.read_prefixed_str()?;
    let algorithm_version = reader.read_prefixed_str()?;

    let mut parameters = ParameterMap::new();
    parameters.extend(read_pairs(&mut reader, "parameter")?);
    for (name, value) in read_pairs(&mut reader, "summary statistic")? {
        parameters.extend(split_summary_stat(&name, &value));
    }

    let num_zones = reader.read_count("background zone")?;
    let _smooth_factor = reader.read_f32()?;
    reader.skip(12 * num_zones)?;
    debug!("discarded {num_zones} background zones");

    let analysis_type = match results_type {
        ResultsType::Expression => Some(reader.read_u8()?),
        _ => None,
    };
    let layout = RecordLayout::select(results_type, analysis_type, num_cells as u32);
    let record_size = reader.read_i32()?;
    let records = read_records(&mut reader, layout, num_cells, record_size, options)?;

    Ok(ChpFile {
        format: Format::ChpXda,
        version: header.version,
        geometry: ChipGeometry::new(
            header.cols.into(),
            header.rows.into(),
            num_cells as u32,
            num_qc_cells as u32,
        ),
        results_type,
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

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::chp::ResultRecord;
    use crate::core::DataFile;
    use crate::error::{Error, ErrorKind};
    use crate::fixtures::{comparison_tail, expression_record, genotyping_record, ChpXda};

    fn expression_file(analysis_type: u8) -> Vec<u8> {
        let mut fixture = ChpXda::new(0, 2, 13);
        fixture.analysis_type = Some(analysis_type);
        let mut body = Vec::new();
        for (detection, signal) in [(0, 250.04), (2, 12.0)] {
            expression_record(&mut body, detection, 0.001, signal);
            if analysis_type == 1 {
                comparison_tail(&mut body, 1, 0.75);
            }
        }
        fixture.build(&body)
    }

    fn decode_default(bytes: Vec<u8>) -> Result<ChpFile> {
        decode(Cursor::new(bytes), &DecodeOptions::default())
    }

    // ==================== Header Tests ====================

    #[test]
    fn test_header_strings() {
        let chp = decode_default(expression_file(0)).unwrap();
        assert_eq!(chp.format(), Format::ChpXda);
        assert_eq!(chp.version(), 1);
        assert_eq!(chp.program_id(), "GeneChip.CallGEBaseCall.1");
        assert_eq!(chp.parent_cel(), "Test3.CEL");
        assert_eq!(chp.chip_type(), Some("Test3"));
        assert_eq!(chp.algorithm_name(), "ExpressionStat");
        assert_eq!(chp.algorithm_version(), "5.0");
        assert_eq!(chp.geometry(), ChipGeometry::new(8, 8, 2, 4));
    }

    #[test]
    fn test_parameters_and_split_summary() {
        let chp = decode_default(expression_file(0)).unwrap();
        let params = chp.parameters();
        assert_eq!(params.get("Alpha1"), Some("0.04"));
        assert_eq!(params.get("RawQ"), Some("2.31"));
        assert_eq!(params.get("Noise X"), Some("1.2"));
        assert_eq!(params.get("Noise Y"), Some("3.4"));
        assert!(!params.contains("Noise"));
    }

    // ==================== Layout Tests ====================

    #[test]
    fn test_analysis_type_changes_columns() {
        let absolute = decode_default(expression_file(0)).unwrap().table();
        let comparison = decode_default(expression_file(1)).unwrap();
        assert_eq!(comparison.layout(), RecordLayout::ExpressionComparison);
        let comparison = comparison.table();
        assert_eq!(absolute.num_columns(), 6);
        assert_eq!(comparison.num_columns(), 12);
        assert!(comparison.column_index("SignalLogRatioLow").is_some());
        assert!(comparison.column_index("SignalLogRatioHigh").is_some());
        assert!(absolute.column_index("SignalLogRatioLow").is_none());
        assert_eq!(absolute.row_tsv(1).unwrap(), "1\tA\t0.001000\t12.0\t16\t15");
        assert_eq!(
            comparison.row_tsv(0).unwrap(),
            "0\tP\t0.001000\t250.0\t16\t15\tI\t0.002500\t0.8\t0.5\t1.0\t14"
        );
    }

    #[test]
    fn test_genotyping_size_class_boundary() {
        for (num_cells, layout, columns) in [
            (24_999, RecordLayout::Genotyping10k, 5),
            (25_000, RecordLayout::Genotyping100k, 7),
        ] {
            let mut body = Vec::new();
            for _ in 0..num_cells {
                genotyping_record(&mut body, 6, 0.02, [0.1, 0.2, 0.3, 0.4]);
            }
            let bytes = ChpXda::new(1, num_cells, 21).build(&body);
            let chp = decode_default(bytes).unwrap();
            assert_eq!(chp.layout(), layout);
            assert_eq!(chp.records().len(), num_cells as usize);
            assert_eq!(chp.table().num_columns(), columns);
        }
    }

    #[test]
    fn test_universal_background() {
        let body = 17.25f32.to_le_bytes();
        let chp = decode_default(ChpXda::new(3, 1, 4).build(&body)).unwrap();
        assert_eq!(chp.results_type(), ResultsType::Universal);
        let Some(ResultRecord::Universal(r)) = chp.records().get(0) else {
            panic!("wrong layout");
        };
        assert!((r.background - 17.3).abs() < 1e-4);
        assert_eq!(chp.table().row_tsv(0).unwrap(), "0\t17.3");
    }

    #[test]
    fn test_rounding_can_be_disabled() {
        let options = DecodeOptions::new().with_rounding(false);
        let chp = decode(Cursor::new(expression_file(0)), &options).unwrap();
        assert_eq!(chp.table().row_tsv(0).unwrap(), "0\tP\t0.001\t250.04\t16\t15");
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_unknown_results_type() {
        let err = decode_default(ChpXda::new(4, 0, 0).build(&[])).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::UnrecognizedResultsType {
                results_type: 4,
                offset: 20
            })
        ));
    }

    #[test]
    fn test_truncated_mid_header() {
        let bytes = expression_file(1);
        for cut in [3, 23, 40, 120] {
            let err = decode_default(bytes[..cut].to_vec()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TruncatedInput, "cut at {cut}");
        }
    }

    #[test]
    fn test_missing_records_are_truncation() {
        let bytes = ChpXda::new(0, 3, 13).build(&[0u8; 13]);
        let err = decode_default(bytes).unwrap_err();
        assert!(err.is_truncated());
    }
}
