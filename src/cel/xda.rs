//! Binary CEL v4
//!
//! Layout, all little-endian:
//!
//! ```text
//! header    magic i32 (64), version i32 (4), cols i32, rows i32, cells i32,
//!           header tags (i32 length + text), algorithm (i32 length + text),
//!           algorithm parameters (i32 length + text), cell margin i32,
//!           outliers u32, masked u32, subgrids i32
//! body      rows * cols records of intensity f32, stddev f32, pixels u16
//! masked    masked x (x u16, y u16)
//! outliers  outliers x (x u16, y u16)
//! subgrids  subgrids x (row i32, column i32, 8 x corner f32, 4 x bound i32)
//! ```

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};
use bytemuck::{Pod, Zeroable};
use log::debug;

use super::{chip_type_from_dat_header, CelFile, CellFlag, CellTableBuilder, IntensityCell, Subgrid};
use crate::core::params::parse_assignments;
use crate::core::reader::check_count;
use crate::core::{ByteReader, ChipGeometry, ParameterMap};
use crate::dispatch::Format;
use crate::error::{FormatError, Location, Result};
use crate::policy::DecodeOptions;

pub const MAGIC: i32 = 64;
pub const VERSION: i32 = 4;

/// Size of one intensity record
const RECORD_SIZE: usize = 10;

/// Fixed-width header prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
struct CelHeader {
    magic: i32,
    version: i32,
    cols: i32,
    rows: i32,
    num_cells: i32,
}
impl CelHeader {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: Self = bytemuck::pod_read_unaligned(bytes);
        let header = Self {
            magic: i32::from_le(raw.magic),
            version: i32::from_le(raw.version),
            cols: i32::from_le(raw.cols),
            rows: i32::from_le(raw.rows),
            num_cells: i32::from_le(raw.num_cells),
        };
        if header.magic != MAGIC {
            return Err(FormatError::InvalidMagicNumber {
                format: "CEL",
                expected: MAGIC.into(),
                found: header.magic.into(),
            }
            .into());
        }
        if header.version != VERSION {
            return Err(FormatError::UnrecognizedVersion {
                format: "CEL",
                version: header.version,
                offset: 4,
            }
            .into());
        }
        Ok(header)
    }
}

/// Decodes a CEL v4 file from the start of `inner`
pub fn decode<R: Read + Seek>(inner: R, options: &DecodeOptions) -> Result<CelFile> {
    let mut reader: ByteReader<R> = ByteReader::new(inner)?;
    reader.rewind()?;

    let header = CelHeader::from_bytes(&reader.read_bytes(size_of::<CelHeader>())?)?;
    let cols = check_count("column", header.cols, 8)? as u32;
    let rows = check_count("row", header.rows, 12)? as u32;
    let num_cells = check_count("cell", header.num_cells, 16)? as u32;
    let geometry = ChipGeometry::new(cols, rows, num_cells, 0);
    options
        .geometry_policy
        .handle("CEL", &geometry, Location::Byte(16))?;

    let tags = reader.read_prefixed_str()?;
    let algorithm = reader.read_prefixed_str()?;
    let algorithm_parameters = reader.read_prefixed_str()?;
    let cell_margin = reader.read_i32()?;
    let num_outliers = reader.read_u32()? as usize;
    let num_masked = reader.read_u32()? as usize;
    let num_subgrids = reader.read_count("subgrid")?;

    let mut parameters = ParameterMap::new();
    parameters.extend(parse_assignments(&tags, '='));
    parameters.extend(parse_assignments(&algorithm_parameters, ':'));
    parameters.insert("Algorithm", algorithm.as_str());
    parameters.insert("CellMargin", cell_margin.to_string());
    let chip_type = parameters
        .get("DatHeader")
        .and_then(chip_type_from_dat_header);

    // the body always spans the full grid whatever the declared count
    let total = geometry.expected_cells();
    reader.ensure_remaining(total.saturating_mul(RECORD_SIZE as u64))?;
    let mut builder = CellTableBuilder::new(cols, rows);
    let body_start = reader.position();
    let body = reader.read_bytes(total as usize * RECORD_SIZE)?;
    for (i, record) in body.chunks_exact(RECORD_SIZE).enumerate() {
        let measured = IntensityCell {
            x: (i % cols as usize) as u32,
            y: (i / cols as usize) as u32,
            intensity: options.round(LittleEndian::read_f32(&record[0..4]), super::INTENSITY_PLACES),
            stddev: options.round(LittleEndian::read_f32(&record[4..8]), super::INTENSITY_PLACES),
            pixels: LittleEndian::read_u16(&record[8..10]),
            ..Default::default()
        };
        let offset = body_start + (i * RECORD_SIZE) as u64;
        builder.set(i, measured, Location::Byte(offset))?;
    }

    for (flag, count) in [(CellFlag::Masked, num_masked), (CellFlag::Outlier, num_outliers)] {
        for record in 0..count {
            let offset = reader.position();
            let x = reader.read_u16()?;
            let y = reader.read_u16()?;
            builder.mark(flag, record, x.into(), y.into(), Location::Byte(offset))?;
        }
    }

    let subgrids = if options.decode_subgrids {
        read_subgrids(&mut reader, num_subgrids)?
    } else {
        debug!("left {num_subgrids} subgrid records unread");
        Vec::new()
    };

    Ok(CelFile {
        format: Format::CelXda,
        version: header.version,
        geometry,
        algorithm,
        chip_type,
        parameters,
        cells: builder.finish(),
        subgrids,
        rounded: options.round_values,
    })
}

fn read_subgrids<R: Read + Seek>(reader: &mut ByteReader<R>, count: usize) -> Result<Vec<Subgrid>> {
    let mut subgrids = Vec::with_capacity(count.min(1 << 10));
    for _ in 0..count {
        let row = reader.read_i32()?;
        let column = reader.read_i32()?;
        let c = reader.read_f32_array(8)?;
        let mut bounds = [0i32; 4];
        for bound in &mut bounds {
            *bound = reader.read_i32()?;
        }
        subgrids.push(Subgrid {
            row,
            column,
            corners: [(c[0], c[1]), (c[2], c[3]), (c[4], c[5]), (c[6], c[7])],
            bounds,
        });
    }
    Ok(subgrids)
}
