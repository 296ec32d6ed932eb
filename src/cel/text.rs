//! Legacy text CEL v3
//!
//! Sections, in order: `[CEL]`, `[HEADER]`, `[INTENSITY]`, `[MASKS]`,
//! `[OUTLIERS]` and `[MODIFIED]`. Data rows are whitespace separated and
//! located by the `CellHeader` tag of their section.

use std::io::Read;

use super::{
    chip_type_from_dat_header, CelFile, CellFlag, CellTableBuilder, IntensityCell, INTENSITY_PLACES,
};
use crate::core::params::parse_assignments;
use crate::core::text::{CellHeader, Document, Section};
use crate::core::{ChipGeometry, ParameterMap};
use crate::dispatch::Format;
use crate::error::{Location, ReadError, Result, SectionError};
use crate::policy::DecodeOptions;

/// Column positions of one data section
struct Columns {
    indices: Vec<usize>,
    names: &'static [&'static str],
}

impl Columns {
    /// Resolves `names` against the section's `CellHeader`, defaulting to file order
    fn locate(section: &Section, names: &'static [&'static str]) -> Self {
        let header = section.get("CellHeader").map(CellHeader::new);
        let indices = names
            .iter()
            .enumerate()
            .map(|(default, &name)| {
                header
                    .as_ref()
                    .and_then(|h| h.index_of(&[name]))
                    .unwrap_or(default)
            })
            .collect();
        Self { indices, names }
    }

    fn parse<T: std::str::FromStr>(
        &self,
        section: &Section,
        fields: &[&str],
        column: usize,
        line: usize,
    ) -> Result<T> {
        let tag = self.names[column];
        match fields.get(self.indices[column]) {
            Some(value) => section.parse_value(tag, value, line),
            None => Err(SectionError::InvalidValue {
                section: section.name.clone(),
                tag: tag.to_string(),
                value: String::new(),
                line,
            }
            .into()),
        }
    }
}

const INTENSITY_COLUMNS: &[&str] = &["X", "Y", "MEAN", "STDV", "NPIXELS"];
const COORDINATE_COLUMNS: &[&str] = &["X", "Y"];

/// Decodes a text CEL from the start of `inner`
pub fn decode<R: Read>(mut inner: R, options: &DecodeOptions) -> Result<CelFile> {
    let mut bytes = Vec::new();
    inner.read_to_end(&mut bytes)?;
    let doc = Document::parse(&bytes)?;

    let version = doc.expect_first("CEL")?.parse_opt("Version")?.unwrap_or(3);

    let header = doc.require("HEADER")?;
    let cols: u32 = header.parse("Cols")?;
    let rows: u32 = header.parse("Rows")?;
    let mut parameters: ParameterMap = header.entries().map(|(tag, value)| (tag, value.trim())).collect();
    if let Some(blob) = header.get("AlgorithmParameters") {
        parameters.extend(parse_assignments(blob, ':'));
    }
    let algorithm = header.get("Algorithm").unwrap_or_default().trim().to_string();
    let chip_type = header.get("DatHeader").and_then(chip_type_from_dat_header);

    let intensity = doc.require("INTENSITY")?;
    let num_cells: u32 = intensity.parse("NumberCells")?;
    let geometry = ChipGeometry::new(cols, rows, num_cells, 0);
    options.geometry_policy.handle(
        "CEL",
        &geometry,
        Location::Line(intensity.line_of("NumberCells")),
    )?;

    // every cell of the grid needs at least one byte of text
    if geometry.expected_cells() > bytes.len() as u64 {
        return Err(ReadError::TruncatedInput {
            offset: bytes.len() as u64,
            needed: usize::try_from(geometry.expected_cells()).unwrap_or(usize::MAX),
        }
        .into());
    }
    let mut builder = CellTableBuilder::new(cols, rows);
    let columns = Columns::locate(intensity, INTENSITY_COLUMNS);
    for (record, (line, row)) in intensity.rows().iter().enumerate() {
        let fields: Vec<&str> = row.split_whitespace().collect();
        let measured = IntensityCell {
            x: columns.parse(intensity, &fields, 0, *line)?,
            y: columns.parse(intensity, &fields, 1, *line)?,
            intensity: options.round(
                columns.parse(intensity, &fields, 2, *line)?,
                INTENSITY_PLACES,
            ),
            stddev: options.round(
                columns.parse(intensity, &fields, 3, *line)?,
                INTENSITY_PLACES,
            ),
            pixels: columns.parse(intensity, &fields, 4, *line)?,
            ..Default::default()
        };
        builder.set(record, measured, Location::Line(*line))?;
    }
    // the body covers the full grid whatever NumberCells declares
    intensity.check_count(
        "Cols*Rows",
        usize::try_from(geometry.expected_cells()).unwrap_or(usize::MAX),
        intensity.rows().len(),
    )?;

    for (name, flag) in [("MASKS", CellFlag::Masked), ("OUTLIERS", CellFlag::Outlier)] {
        let Some(section) = doc.section(name) else {
            continue;
        };
        if let Some(declared) = section.parse_opt::<usize>("NumberCells")? {
            section.check_count("NumberCells", declared, section.rows().len())?;
        }
        let columns = Columns::locate(section, COORDINATE_COLUMNS);
        for (record, (line, row)) in section.rows().iter().enumerate() {
            let fields: Vec<&str> = row.split_whitespace().collect();
            let x = columns.parse(section, &fields, 0, *line)?;
            let y = columns.parse(section, &fields, 1, *line)?;
            builder.mark(flag, record, x, y, Location::Line(*line))?;
        }
    }

    Ok(CelFile {
        format: Format::CelText,
        version,
        geometry,
        algorithm,
        chip_type,
        parameters,
        cells: builder.finish(),
        subgrids: Vec::new(),
        rounded: options.round_values,
    })
}
