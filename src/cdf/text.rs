//! Legacy text CDF (`[CDF]` / `[Chip]` / `[UnitN]` / `[UnitN_BlockM]`)

use std::collections::HashMap;
use std::io::Read;

use log::debug;

use super::{resolve_unit_name, Block, CdfFile, ProbeCell, ProbeUnit, QcCell, QcUnit};
use crate::core::text::{CellHeader, Document, Section};
use crate::core::{ChipGeometry, ParameterMap};
use crate::dispatch::Format;
use crate::error::{Result, SectionError};

/// Decodes a text CDF from the start of `inner`
pub fn decode<R: Read>(mut inner: R) -> Result<CdfFile> {
    let mut bytes = Vec::new();
    inner.read_to_end(&mut bytes)?;
    let doc = Document::parse(&bytes)?;

    let mut parameters = ParameterMap::new();
    let cdf = doc.expect_first("CDF")?;
    if let Some(version) = cdf.get("Version") {
        parameters.insert("Version", version.trim());
    }

    let chip = doc.require("Chip")?;
    let num_rows: u32 = chip.parse("Rows")?;
    let num_columns: u32 = chip.parse("Cols")?;
    let num_units: u32 = chip.parse("NumberOfUnits")?;
    let num_qc: u32 = chip.parse_opt("NumQCUnits")?.unwrap_or(0);
    let chip_type = chip
        .get("Name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    for (tag, value) in chip.entries() {
        parameters.insert(tag, value.trim());
    }

    let index: HashMap<&str, &Section> = doc
        .sections()
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();

    let mut qc_units = Vec::with_capacity((num_qc as usize).min(1 << 10));
    let mut units = Vec::with_capacity((num_units as usize).min(1 << 16));
    for section in doc.sections() {
        if is_numbered(&section.name, "QC") {
            qc_units.push(decode_qc_unit(section)?);
        } else if is_numbered(&section.name, "Unit") {
            units.push(decode_unit(section, &index)?);
        }
    }

    chip.check_count("NumberOfUnits", num_units as usize, units.len())?;
    if chip.get("NumQCUnits").is_some() {
        chip.check_count("NumQCUnits", num_qc as usize, qc_units.len())?;
    }
    debug!("decoded text CDF with {} units", units.len());

    Ok(CdfFile {
        format: Format::CdfText,
        geometry: ChipGeometry::new(num_columns, num_rows, num_units, num_qc),
        chip_type,
        parameters,
        qc_units,
        units,
    })
}

/// Matches `prefix` followed by one or more digits
fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Iterates the `CellK=` entries of a section as `(line, fields)`
fn cell_rows(section: &Section) -> impl Iterator<Item = (usize, Vec<&str>)> {
    section
        .entries_with_lines()
        .filter(|(tag, _, _)| is_numbered(tag, "Cell"))
        .map(|(_, value, line)| (line, value.split('\t').collect()))
}

fn required_column(section: &Section, header: &CellHeader, names: &[&'static str]) -> Result<usize> {
    header.index_of(names).ok_or_else(|| {
        SectionError::MissingTag {
            section: section.name.clone(),
            tag: format!("CellHeader column {}", names[0]),
            line: section.line,
        }
        .into()
    })
}

fn field<'a>(fields: &[&'a str], index: Option<usize>) -> Option<&'a str> {
    index.and_then(|i| fields.get(i)).map(|f| f.trim())
}

fn decode_qc_unit(section: &Section) -> Result<QcUnit> {
    let qc_type = section.parse_opt("Type")?.unwrap_or(0);
    let header = CellHeader::new(section.get("CellHeader").unwrap_or("X\tY"));
    let x_col = required_column(section, &header, &["X"])?;
    let y_col = required_column(section, &header, &["Y"])?;
    let len_col = header.index_of(&["PLEN"]);
    let pm_col = header.index_of(&["PMFLAG"]);
    let bg_col = header.index_of(&["BGFLAG"]);

    let mut cells = Vec::new();
    for (line, fields) in cell_rows(section) {
        let parse_flag = |col: Option<usize>, tag: &str| -> Result<bool> {
            match field(&fields, col) {
                Some(v) => Ok(section.parse_value::<u8>(tag, v, line)? != 0),
                None => Ok(false),
            }
        };
        cells.push(QcCell {
            x: section.parse_value("X", field(&fields, Some(x_col)).unwrap_or(""), line)?,
            y: section.parse_value("Y", field(&fields, Some(y_col)).unwrap_or(""), line)?,
            probe_length: match field(&fields, len_col) {
                Some(v) => section.parse_value("PLEN", v, line)?,
                None => 0,
            },
            perfect_match: parse_flag(pm_col, "PMFLAG")?,
            background: parse_flag(bg_col, "BGFLAG")?,
        });
    }
    if let Some(declared) = section.parse_opt("NumberCells")? {
        section.check_count("NumberCells", declared, cells.len())?;
    }
    Ok(QcUnit { qc_type, cells })
}

fn decode_unit(section: &Section, index: &HashMap<&str, &Section>) -> Result<ProbeUnit> {
    let unit_number = match section.parse_opt("UnitNumber")? {
        Some(n) => n,
        None => section.parse_value("UnitNumber", &section.name["Unit".len()..], section.line)?,
    };
    let num_blocks: u32 = section.parse("NumberBlocks")?;
    let direction = section.parse_opt("Direction")?.unwrap_or(0);

    let mut blocks = Vec::with_capacity((num_blocks as usize).min(64));
    for m in 1..=num_blocks {
        let name = format!("{}_Block{m}", section.name);
        let block = index.get(name.as_str()).ok_or(SectionError::MissingSection {
            section: name.clone(),
        })?;
        blocks.push(decode_block(block, direction)?);
    }

    let declared = section.get("Name").map_or("", str::trim);
    Ok(ProbeUnit {
        unit_number,
        name: resolve_unit_name(unit_number, declared, &blocks)?,
        unit_type: section.parse_opt("UnitType")?.unwrap_or(0),
        direction,
        blocks,
    })
}

fn decode_block(section: &Section, direction: u8) -> Result<Block> {
    let num_cells: Option<usize> = section.parse_opt("NumCells")?;
    let mut cells = Vec::with_capacity(num_cells.unwrap_or(0).min(1 << 12));

    if let Some(header) = section.get("CellHeader").map(CellHeader::new) {
        let x_col = required_column(section, &header, &["X"])?;
        let y_col = required_column(section, &header, &["Y"])?;
        let pbase_col = header.index_of(&["PBASE"]);
        let tbase_col = header.index_of(&["TBASE"]);
        let atom_col = header.index_of(&["ATOM"]);

        let base = |fields: &[&str], col| {
            field(fields, col)
                .and_then(|v| v.chars().next())
                .unwrap_or(' ')
        };
        for (line, fields) in cell_rows(section) {
            cells.push(ProbeCell {
                atom: match field(&fields, atom_col) {
                    Some(v) => section.parse_value("ATOM", v, line)?,
                    None => 0,
                },
                x: section.parse_value("X", field(&fields, Some(x_col)).unwrap_or(""), line)?,
                y: section.parse_value("Y", field(&fields, Some(y_col)).unwrap_or(""), line)?,
                probe_base: base(&fields, pbase_col),
                target_base: base(&fields, tbase_col),
                reference_position: None,
            });
        }
    }

    if let Some(declared) = num_cells {
        section.check_count("NumCells", declared, cells.len())?;
    }

    Ok(Block {
        name: section.get("Name").map_or("", str::trim).to_string(),
        direction,
        cells,
    })
}
