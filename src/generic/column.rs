//! Column descriptors and the typed reader table
//!
//! Each [`DataColumn`] is bound to exactly one [`ColumnReader`] chosen from
//! its [`ColumnType`]. The set of types is closed; an unknown tag is a
//! format error, not an extension point.

use std::io::{Read, Seek};

use byteorder::{BigEndian, WriteBytesExt};

use crate::core::reader::check_count;
use crate::core::{ByteReader, Value};
use crate::error::{FormatError, RecordError, Result};

/// Decodes one value of a column at the reader's position
pub type ColumnReader<R> = fn(&mut ByteReader<R, BigEndian>, &DataColumn) -> Result<Value>;

/// On-disk value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    /// i32 length followed by ASCII
    Text,
    /// i32 character count followed by UTF-16 code units
    WideText,
}

impl ColumnType {
    /// Maps an in-file tag, `None` for unknown tags
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Byte,
            1 => Self::UByte,
            2 => Self::Short,
            3 => Self::UShort,
            4 => Self::Int,
            5 => Self::UInt,
            6 => Self::Float,
            7 => Self::Text,
            8 => Self::WideText,
            _ => return None,
        })
    }

    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Byte => 0,
            Self::UByte => 1,
            Self::Short => 2,
            Self::UShort => 3,
            Self::Int => 4,
            Self::UInt => 5,
            Self::Float => 6,
            Self::Text => 7,
            Self::WideText => 8,
        }
    }

    /// Smallest width that can hold a value of this type
    ///
    /// String columns need at least their length prefix.
    #[must_use]
    pub fn min_width(self) -> u32 {
        match self {
            Self::Byte | Self::UByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float | Self::Text | Self::WideText => 4,
        }
    }

    /// The reader for this type
    #[must_use]
    pub fn reader<R: Read + Seek>(self) -> ColumnReader<R> {
        match self {
            Self::Byte => |r, c| fixed(r, c, |r| Ok(Value::Int(r.read_i8()?.into()))),
            Self::UByte => |r, c| fixed(r, c, |r| Ok(Value::UInt(r.read_u8()?.into()))),
            Self::Short => |r, c| fixed(r, c, |r| Ok(Value::Int(r.read_i16()?.into()))),
            Self::UShort => |r, c| fixed(r, c, |r| Ok(Value::UInt(r.read_u16()?.into()))),
            Self::Int => |r, c| fixed(r, c, |r| Ok(Value::Int(r.read_i32()?.into()))),
            Self::UInt => |r, c| fixed(r, c, |r| Ok(Value::UInt(r.read_u32()?.into()))),
            Self::Float => |r, c| fixed(r, c, |r| Ok(Value::Float(r.read_f32()?))),
            Self::Text => |r, c| string(r, c, |r| Ok(Value::Text(r.read_prefixed_str()?))),
            Self::WideText => |r, c| string(r, c, |r| Ok(Value::Text(r.read_wide_str()?))),
        }
    }
}

/// Reads a fixed-size value and skips the column's padding
fn fixed<R: Read + Seek>(
    reader: &mut ByteReader<R, BigEndian>,
    column: &DataColumn,
    read: impl FnOnce(&mut ByteReader<R, BigEndian>) -> Result<Value>,
) -> Result<Value> {
    let value = read(reader)?;
    reader.skip((column.width - column.column_type.min_width()) as usize)?;
    Ok(value)
}

/// Reads a length-prefixed string and skips the rest of the column
///
/// The column width covers the prefix and the longest string; shorter
/// strings are padded up to it.
fn string<R: Read + Seek>(
    reader: &mut ByteReader<R, BigEndian>,
    column: &DataColumn,
    read: impl FnOnce(&mut ByteReader<R, BigEndian>) -> Result<Value>,
) -> Result<Value> {
    let start = reader.position();
    let value = read(reader)?;
    let used = reader.position() - start;
    let Some(padding) = u64::from(column.width).checked_sub(used) else {
        return Err(RecordError::ColumnOverflow {
            column: column.name.clone(),
            length: used,
            width: column.width,
            offset: start,
        }
        .into());
    };
    reader.skip(padding as usize)?;
    Ok(value)
}

/// One column descriptor: `(name, type tag, byte width)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataColumn {
    pub name: String,
    pub column_type: ColumnType,
    pub width: u32,
}

impl DataColumn {
    /// Builds a descriptor, rejecting widths below the type's size
    ///
    /// Width errors from a descriptor built in memory report offset 0.
    pub fn new(name: impl Into<String>, column_type: ColumnType, width: u32) -> Result<Self> {
        Self::checked(name.into(), column_type, width, 0)
    }

    /// Validates `width`, reporting `offset` as the position of the width field
    fn checked(name: String, column_type: ColumnType, width: u32, offset: u64) -> Result<Self> {
        let expected = column_type.min_width();
        if width < expected {
            return Err(RecordError::InvalidColumnWidth {
                column: name,
                width,
                expected,
                offset,
            }
            .into());
        }
        Ok(Self {
            name,
            column_type,
            width,
        })
    }

    /// Reads a descriptor: wide-string name, type tag u8, width i32
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R, BigEndian>) -> Result<Self> {
        let name = reader.read_wide_str()?;
        let tag_offset = reader.position();
        let tag = reader.read_u8()?;
        let Some(column_type) = ColumnType::from_tag(tag) else {
            return Err(FormatError::UnrecognizedColumnType {
                column: name,
                tag,
                offset: tag_offset,
            }
            .into());
        };
        let width_offset = reader.position();
        let width = check_count("column width", reader.read_i32()?, width_offset)?;
        Self::checked(
            name,
            column_type,
            u32::try_from(width).unwrap_or(u32::MAX),
            width_offset,
        )
    }

    /// Re-encodes this descriptor in the layout [`DataColumn::read`] accepts
    pub fn write_descriptor(&self, out: &mut Vec<u8>) -> Result<()> {
        let units: Vec<u16> = self.name.encode_utf16().collect();
        out.write_i32::<BigEndian>(units.len() as i32)?;
        for unit in units {
            out.write_u16::<BigEndian>(unit)?;
        }
        out.write_u8(self.column_type.tag())?;
        out.write_i32::<BigEndian>(self.width as i32)?;
        Ok(())
    }

    /// The reader bound to this column's type
    #[must_use]
    pub fn reader<R: Read + Seek>(&self) -> ColumnReader<R> {
        self.column_type.reader()
    }
}
