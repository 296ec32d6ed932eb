//! Binary (XDA) CDF
//!
//! Layout, all little-endian:
//!
//! ```text
//! header     magic i32 (67), version i32, cols u16, rows u16,
//!            units i32, qc units i32, reference sequence (i32 length + bytes)
//! directory  units x name[64], qc units x offset i32, units x offset i32
//! qc units   type u16, cells i32, then cells of x u16, y u16, length u8, pm u8, bg u8
//! units      type u16, direction u8, atoms i32, blocks i32, cells i32,
//!            number i32, cells-per-atom u8, then each block:
//!            atoms i32, cells i32, cells-per-atom u8, direction u8,
//!            first atom i32, last atom i32, name[64],
//!            then cells of atom i32, x u16, y u16, index i32, pbase u8, tbase u8
//! ```

use std::io::{Read, Seek};

use bytemuck::{Pod, Zeroable};
use log::debug;

use super::{resolve_unit_name, Block, CdfFile, ProbeCell, ProbeUnit, QcCell, QcUnit};
use crate::core::reader::check_count;
use crate::core::{ByteReader, ChipGeometry, ParameterMap};
use crate::dispatch::Format;
use crate::error::{FormatError, RecordError, Result};

pub const MAGIC: i32 = 67;

/// Width of the fixed name fields
const NAME_WIDTH: usize = 64;

/// Fixed-width header prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
struct XdaCdfHeader {
    magic: i32,
    version: i32,
    cols: u16,
    rows: u16,
    num_units: i32,
    num_qc_units: i32,
}
impl XdaCdfHeader {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: Self = bytemuck::pod_read_unaligned(bytes);
        let header = Self {
            magic: i32::from_le(raw.magic),
            version: i32::from_le(raw.version),
            cols: u16::from_le(raw.cols),
            rows: u16::from_le(raw.rows),
            num_units: i32::from_le(raw.num_units),
            num_qc_units: i32::from_le(raw.num_qc_units),
        };
        if header.magic != MAGIC {
            return Err(FormatError::InvalidMagicNumber {
                format: "XDA CDF",
                expected: MAGIC.into(),
                found: header.magic.into(),
            }
            .into());
        }
        Ok(header)
    }
}

/// Decodes an XDA CDF from the start of `inner`
pub fn decode<R: Read + Seek>(inner: R) -> Result<CdfFile> {
    let mut reader: ByteReader<R> = ByteReader::new(inner)?;
    reader.rewind()?;

    let header = XdaCdfHeader::from_bytes(&reader.read_bytes(size_of::<XdaCdfHeader>())?)?;
    let num_units = check_count("unit", header.num_units, 12)?;
    let num_qc = check_count("QC unit", header.num_qc_units, 16)?;
    let reference = reader.read_prefixed_str()?;

    let mut parameters = ParameterMap::new();
    parameters.insert("Version", header.version.to_string());
    if !reference.is_empty() {
        parameters.insert("Reference", reference);
    }

    let mut names = Vec::with_capacity(num_units.min(1 << 16));
    for _ in 0..num_units {
        names.push(reader.read_fixed_str(NAME_WIDTH)?);
    }

    // offset tables are only needed for random access
    reader.skip(4 * num_qc)?;
    reader.skip(4 * num_units)?;
    debug!("skipped {num_qc} QC and {num_units} unit offsets");

    let mut qc_units = Vec::with_capacity(num_qc.min(1 << 16));
    for _ in 0..num_qc {
        qc_units.push(read_qc_unit(&mut reader)?);
    }

    let mut units = Vec::with_capacity(names.len());
    for name in &names {
        units.push(read_unit(&mut reader, name)?);
    }

    Ok(CdfFile {
        format: Format::CdfXda,
        geometry: ChipGeometry::new(
            header.cols.into(),
            header.rows.into(),
            num_units as u32,
            num_qc as u32,
        ),
        chip_type: None,
        parameters,
        qc_units,
        units,
    })
}

fn read_qc_unit<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<QcUnit> {
    let qc_type = reader.read_u16()?;
    let num_cells = reader.read_count("QC cell")?;
    let mut cells = Vec::with_capacity(num_cells.min(1 << 16));
    for _ in 0..num_cells {
        cells.push(QcCell {
            x: reader.read_u16()?.into(),
            y: reader.read_u16()?.into(),
            probe_length: reader.read_u8()?,
            perfect_match: reader.read_u8()? != 0,
            background: reader.read_u8()? != 0,
        });
    }
    Ok(QcUnit { qc_type, cells })
}

fn read_unit<R: Read + Seek>(reader: &mut ByteReader<R>, name: &str) -> Result<ProbeUnit> {
    let unit_type = reader.read_u16()?;
    let direction = reader.read_u8()?;
    let _num_atoms = reader.read_i32()?;
    let num_blocks = reader.read_count("block")?;
    let num_cells = reader.read_i32()?;
    let number_offset = reader.position();
    let unit_number = reader.read_i32()?;
    let _cells_per_atom = reader.read_u8()?;

    let mut blocks = Vec::with_capacity(num_blocks.min(1 << 10));
    for _ in 0..num_blocks {
        blocks.push(read_block(reader)?);
    }

    let found: usize = blocks.iter().map(|b| b.cells.len()).sum();
    if i64::try_from(found).ok() != Some(num_cells.into()) {
        debug!("unit {unit_number} declares {num_cells} cells, blocks hold {found}");
    }

    let unit_number =
        u32::try_from(unit_number).map_err(|_| RecordError::InvalidUnitNumber {
            unit: unit_number,
            offset: number_offset,
        })?;
    Ok(ProbeUnit {
        unit_number,
        name: resolve_unit_name(unit_number, name, &blocks)?,
        unit_type,
        direction,
        blocks,
    })
}

fn read_block<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Block> {
    let _num_atoms = reader.read_i32()?;
    let num_cells = reader.read_count("cell")?;
    let _cells_per_atom = reader.read_u8()?;
    let direction = reader.read_u8()?;
    let _first_atom = reader.read_i32()?;
    let _last_atom = reader.read_i32()?;
    let name = reader.read_fixed_str(NAME_WIDTH)?;

    let mut cells = Vec::with_capacity(num_cells.min(1 << 16));
    for _ in 0..num_cells {
        let atom = reader.read_i32()?;
        let x = reader.read_u16()?.into();
        let y = reader.read_u16()?.into();
        let index = reader.read_i32()?;
        cells.push(ProbeCell {
            atom,
            x,
            y,
            probe_base: char::from(reader.read_u8()?),
            target_base: char::from(reader.read_u8()?),
            reference_position: Some(index),
        });
    }
    Ok(Block {
        name,
        direction,
        cells,
    })
}
