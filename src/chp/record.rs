//! CHP body records
//!
//! Every record shape is decoded by [`read_records`]; floats are rounded to
//! their export precision as they are read.

use std::io::{Read, Seek};

use byteorder::ByteOrder;
use log::debug;

use super::{change_label, detection_label, genotype_label, RecordLayout};
use crate::core::reader::ascii_to_string;
use crate::core::{ByteReader, Value};
use crate::error::{RecordError, Result};
use crate::policy::DecodeOptions;

/// Places kept for p-values and genotype confidences
pub const P_VALUE_PLACES: u8 = 6;
/// Places kept for signals, log ratios, RAS scores and backgrounds
pub const SIGNAL_PLACES: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionResult {
    pub detection: u8,
    pub detection_p_value: f32,
    pub signal: f32,
    pub num_pairs: u16,
    pub num_used_pairs: u16,
}

/// An expression result from a comparison analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonResult {
    pub expression: ExpressionResult,
    pub change: u8,
    pub change_p_value: f32,
    pub signal_log_ratio: f32,
    pub signal_log_ratio_low: f32,
    pub signal_log_ratio_high: f32,
    pub common_pairs: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Genotyping10kResult {
    pub call: u8,
    pub confidence: f32,
    pub ras1: f32,
    pub ras2: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Genotyping100kResult {
    pub call: u8,
    pub confidence: f32,
    pub p_aa: f32,
    pub p_ab: f32,
    pub p_bb: f32,
    pub p_no_call: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResequencingResult {
    pub bases: String,
    pub scores: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniversalResult {
    pub background: f32,
}

/// The records of one CHP body, all of one shape
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRecords {
    Expression(Vec<ExpressionResult>),
    ExpressionComparison(Vec<ComparisonResult>),
    Genotyping10k(Vec<Genotyping10kResult>),
    Genotyping100k(Vec<Genotyping100kResult>),
    Resequencing(Vec<ResequencingResult>),
    Universal(Vec<UniversalResult>),
}

/// A borrowed view of a single record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultRecord<'a> {
    Expression(&'a ExpressionResult),
    ExpressionComparison(&'a ComparisonResult),
    Genotyping10k(&'a Genotyping10kResult),
    Genotyping100k(&'a Genotyping100kResult),
    Resequencing(&'a ResequencingResult),
    Universal(&'a UniversalResult),
}

impl ResultRecords {
    fn with_capacity(layout: RecordLayout, capacity: usize) -> Self {
        match layout {
            RecordLayout::Expression => Self::Expression(Vec::with_capacity(capacity)),
            RecordLayout::ExpressionComparison => {
                Self::ExpressionComparison(Vec::with_capacity(capacity))
            }
            RecordLayout::Genotyping10k => Self::Genotyping10k(Vec::with_capacity(capacity)),
            RecordLayout::Genotyping100k => Self::Genotyping100k(Vec::with_capacity(capacity)),
            RecordLayout::Resequencing => Self::Resequencing(Vec::with_capacity(capacity)),
            RecordLayout::Universal => Self::Universal(Vec::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        match self {
            Self::Expression(_) => RecordLayout::Expression,
            Self::ExpressionComparison(_) => RecordLayout::ExpressionComparison,
            Self::Genotyping10k(_) => RecordLayout::Genotyping10k,
            Self::Genotyping100k(_) => RecordLayout::Genotyping100k,
            Self::Resequencing(_) => RecordLayout::Resequencing,
            Self::Universal(_) => RecordLayout::Universal,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Expression(v) => v.len(),
            Self::ExpressionComparison(v) => v.len(),
            Self::Genotyping10k(v) => v.len(),
            Self::Genotyping100k(v) => v.len(),
            Self::Resequencing(v) => v.len(),
            Self::Universal(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<ResultRecord<'_>> {
        Some(match self {
            Self::Expression(v) => ResultRecord::Expression(v.get(index)?),
            Self::ExpressionComparison(v) => ResultRecord::ExpressionComparison(v.get(index)?),
            Self::Genotyping10k(v) => ResultRecord::Genotyping10k(v.get(index)?),
            Self::Genotyping100k(v) => ResultRecord::Genotyping100k(v.get(index)?),
            Self::Resequencing(v) => ResultRecord::Resequencing(v.get(index)?),
            Self::Universal(v) => ResultRecord::Universal(v.get(index)?),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ResultRecord<'_>> {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// Chooses the exported form of a decoded float
fn float(value: f32, places: u8, rounded: bool) -> Value {
    if rounded {
        Value::Fixed { value, places }
    } else {
        Value::Float(value)
    }
}

impl ResultRecord<'_> {
    /// Appends this record's exported values after the unit column
    pub fn push_values(&self, row: &mut Vec<Value>, rounded: bool) {
        match self {
            Self::Expression(r) => push_expression(row, r, rounded),
            Self::ExpressionComparison(r) => {
                push_expression(row, &r.expression, rounded);
                row.extend([
                    change_label(r.change),
                    float(r.change_p_value, P_VALUE_PLACES, rounded),
                    float(r.signal_log_ratio, SIGNAL_PLACES, rounded),
                    float(r.signal_log_ratio_low, SIGNAL_PLACES, rounded),
                    float(r.signal_log_ratio_high, SIGNAL_PLACES, rounded),
                    Value::from(r.common_pairs),
                ]);
            }
            Self::Genotyping10k(r) => row.extend([
                genotype_label(r.call),
                float(r.confidence, P_VALUE_PLACES, rounded),
                float(r.ras1, SIGNAL_PLACES, rounded),
                float(r.ras2, SIGNAL_PLACES, rounded),
            ]),
            Self::Genotyping100k(r) => row.extend([
                genotype_label(r.call),
                float(r.confidence, P_VALUE_PLACES, rounded),
                float(r.p_aa, P_VALUE_PLACES, rounded),
                float(r.p_ab, P_VALUE_PLACES, rounded),
                float(r.p_bb, P_VALUE_PLACES, rounded),
                float(r.p_no_call, P_VALUE_PLACES, rounded),
            ]),
            Self::Resequencing(r) => {
                let scores: Vec<String> = r.scores.iter().map(ToString::to_string).collect();
                row.push(Value::from(r.bases.as_str()));
                row.push(Value::from(scores.join(",")));
            }
            Self::Universal(r) => row.push(float(r.background, SIGNAL_PLACES, rounded)),
        }
    }
}

fn push_expression(row: &mut Vec<Value>, r: &ExpressionResult, rounded: bool) {
    row.extend([
        detection_label(r.detection),
        float(r.detection_p_value, P_VALUE_PLACES, rounded),
        float(r.signal, SIGNAL_PLACES, rounded),
        Value::from(r.num_pairs),
        Value::from(r.num_used_pairs),
    ]);
}

/// Reads `count` records of `layout`
///
/// `record_size` is the size declared in the file. It sizes the score array
/// of resequencing records and is otherwise only compared against the layout.
pub(crate) fn read_records<R: Read + Seek, B: ByteOrder>(
    reader: &mut ByteReader<R, B>,
    layout: RecordLayout,
    count: usize,
    record_size: i32,
    options: &DecodeOptions,
) -> Result<ResultRecords> {
    if let Some(size) = layout.fixed_size() {
        if usize::try_from(record_size).ok() != Some(size) {
            debug!("declared record size {record_size} differs from the {size} bytes of {layout:?}");
        }
        reader.ensure_remaining((count as u64).saturating_mul(size as u64))?;
    }

    let mut records = ResultRecords::with_capacity(layout, count.min(1 << 16));
    for record in 0..count {
        match &mut records {
            ResultRecords::Expression(v) => v.push(read_expression(reader, options)?),
            ResultRecords::ExpressionComparison(v) => {
                let expression = read_expression(reader, options)?;
                v.push(ComparisonResult {
                    expression,
                    change: reader.read_u8()?,
                    change_p_value: options.round(reader.read_f32()?, P_VALUE_PLACES),
                    signal_log_ratio: options.round(reader.read_f32()?, SIGNAL_PLACES),
                    signal_log_ratio_low: options.round(reader.read_f32()?, SIGNAL_PLACES),
                    signal_log_ratio_high: options.round(reader.read_f32()?, SIGNAL_PLACES),
                    common_pairs: reader.read_u16()?,
                });
            }
            ResultRecords::Genotyping10k(v) => {
                let call = reader.read_u8()?;
                let confidence = options.round(reader.read_f32()?, P_VALUE_PLACES);
                let ras1 = options.round(reader.read_f32()?, SIGNAL_PLACES);
                let ras2 = options.round(reader.read_f32()?, SIGNAL_PLACES);
                // two unused slots
                reader.skip(8)?;
                v.push(Genotyping10kResult {
                    call,
                    confidence,
                    ras1,
                    ras2,
                });
            }
            ResultRecords::Genotyping100k(v) => v.push(Genotyping100kResult {
                call: reader.read_u8()?,
                confidence: options.round(reader.read_f32()?, P_VALUE_PLACES),
                p_aa: options.round(reader.read_f32()?, P_VALUE_PLACES),
                p_ab: options.round(reader.read_f32()?, P_VALUE_PLACES),
                p_bb: options.round(reader.read_f32()?, P_VALUE_PLACES),
                p_no_call: options.round(reader.read_f32()?, P_VALUE_PLACES),
            }),
            ResultRecords::Resequencing(v) => {
                v.push(read_resequencing(reader, record, record_size)?);
            }
            ResultRecords::Universal(v) => v.push(UniversalResult {
                background: options.round(reader.read_f32()?, SIGNAL_PLACES),
            }),
        }
    }
    Ok(records)
}

fn read_expression<R: Read + Seek, B: ByteOrder>(
    reader: &mut ByteReader<R, B>,
    options: &DecodeOptions,
) -> Result<ExpressionResult> {
    Ok(ExpressionResult {
        detection: reader.read_u8()?,
        detection_p_value: options.round(reader.read_f32()?, P_VALUE_PLACES),
        signal: options.round(reader.read_f32()?, SIGNAL_PLACES),
        num_pairs: reader.read_u16()?,
        num_used_pairs: reader.read_u16()?,
    })
}

/// Reads one resequencing record: i32 length, bases, then the score array
fn read_resequencing<R: Read + Seek, B: ByteOrder>(
    reader: &mut ByteReader<R, B>,
    record: usize,
    record_size: i32,
) -> Result<ResequencingResult> {
    let offset = reader.position();
    let sequence_length = reader.read_count("sequence length")?;
    let bases = ascii_to_string(&reader.read_bytes(sequence_length)?);

    let score_bytes = i64::from(record_size) - sequence_length as i64 - 4;
    if score_bytes < 0 || score_bytes % 4 != 0 {
        return Err(RecordError::InvalidRecordSize {
            record,
            offset,
            record_size,
            sequence_length: i32::try_from(sequence_length).unwrap_or(i32::MAX),
        }
        .into());
    }
    let scores = reader.read_f32_array((score_bytes / 4) as usize)?;
    Ok(ResequencingResult { bases, scores })
}
