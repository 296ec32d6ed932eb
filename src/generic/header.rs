//! File and data headers of the generic container

use std::io::{Read, Seek};

use byteorder::{BigEndian, ByteOrder};

use crate::core::reader::decode_utf16;
use crate::core::ByteReader;
use crate::error::{FormatError, Result};

/// First byte of every generic container
pub const MAGIC: u8 = 59;
/// The only container version
pub const VERSION: u8 = 1;

/// Parent headers nested deeper than this are rejected as corrupt
const MAX_PARENT_DEPTH: usize = 64;

/// Fixed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u8,
    pub num_groups: u32,
    pub first_group_pos: u32,
}

impl FileHeader {
    /// Reads `magic u8, version u8, groups i32, first group position u32`
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R, BigEndian>) -> Result<Self> {
        let magic = reader.read_u8()?;
        if magic != MAGIC {
            return Err(FormatError::InvalidMagicNumber {
                format: "generic container",
                expected: MAGIC.into(),
                found: magic.into(),
            }
            .into());
        }
        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(FormatError::UnrecognizedVersion {
                format: "generic container",
                version: version.into(),
                offset: 1,
            }
            .into());
        }
        let num_groups = reader.read_count("data group")? as u32;
        let first_group_pos = reader.read_u32()?;
        Ok(Self {
            version,
            num_groups,
            first_group_pos,
        })
    }
}

/// A named parameter with its value decoded to text
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub mime_type: String,
}

impl Parameter {
    /// Reads `name wstring, value (i32 length + bytes), MIME type wstring`
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R, BigEndian>) -> Result<Self> {
        let name = reader.read_wide_str()?;
        let raw = reader.read_prefixed_bytes()?;
        let mime_type = reader.read_wide_str()?;
        Ok(Self {
            value: decode_mime_value(&raw, &mime_type),
            name,
            mime_type,
        })
    }
}

/// Reads an i32 count followed by that many parameters
pub(crate) fn read_parameters<R: Read + Seek>(
    reader: &mut ByteReader<R, BigEndian>,
) -> Result<Vec<Parameter>> {
    let count = reader.read_count("parameter")?;
    let mut parameters = Vec::with_capacity(count.min(1 << 10));
    for _ in 0..count {
        parameters.push(Parameter::read(reader)?);
    }
    Ok(parameters)
}

/// Renders a raw parameter value according to its MIME type
///
/// Numeric values occupy the leading bytes of a fixed-size slot; unknown
/// types fall back to their ASCII rendition.
#[must_use]
pub fn decode_mime_value(raw: &[u8], mime_type: &str) -> String {
    fn leading<const N: usize>(raw: &[u8]) -> Option<&[u8]> {
        raw.get(..N)
    }
    let rendered = match mime_type {
        "text/plain" => decode_utf16::<BigEndian>(raw),
        "text/x-calvin-float" => leading::<4>(raw).map(|b| BigEndian::read_f32(b).to_string()),
        "text/x-calvin-integer-8" => leading::<1>(raw).map(|b| (b[0] as i8).to_string()),
        "text/x-calvin-unsigned-integer-8" => leading::<1>(raw).map(|b| b[0].to_string()),
        "text/x-calvin-integer-16" => leading::<2>(raw).map(|b| BigEndian::read_i16(b).to_string()),
        "text/x-calvin-unsigned-integer-16" => {
            leading::<2>(raw).map(|b| BigEndian::read_u16(b).to_string())
        }
        "text/x-calvin-integer-32" => leading::<4>(raw).map(|b| BigEndian::read_i32(b).to_string()),
        "text/x-calvin-unsigned-integer-32" => {
            leading::<4>(raw).map(|b| BigEndian::read_u32(b).to_string())
        }
        _ => None,
    };
    rendered.unwrap_or_else(|| crate::core::reader::ascii_to_string(raw))
}

/// The data header and its parent headers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataHeader {
    pub data_type_id: String,
    pub file_id: String,
    pub creation_time: String,
    pub locale: String,
    pub parameters: Vec<Parameter>,
    /// Headers of the files this one was derived from
    pub parents: Vec<DataHeader>,
}

impl DataHeader {
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R, BigEndian>) -> Result<Self> {
        Self::read_nested(reader, 0)
    }

    fn read_nested<R: Read + Seek>(
        reader: &mut ByteReader<R, BigEndian>,
        depth: usize,
    ) -> Result<Self> {
        let data_type_id = reader.read_prefixed_str()?;
        let file_id = reader.read_prefixed_str()?;
        let creation_time = reader.read_wide_str()?;
        let locale = reader.read_wide_str()?;
        let parameters = read_parameters(reader)?;

        let offset = reader.position();
        let num_parents = reader.read_count("parent header")?;
        if num_parents > 0 && depth >= MAX_PARENT_DEPTH {
            return Err(crate::error::RecordError::InvalidCount {
                field: "parent header",
                count: num_parents as i64,
                offset,
            }
            .into());
        }
        let mut parents = Vec::with_capacity(num_parents.min(16));
        for _ in 0..num_parents {
            parents.push(Self::read_nested(reader, depth + 1)?);
        }

        Ok(Self {
            data_type_id,
            file_id,
            creation_time,
            locale,
            parameters,
            parents,
        })
    }

    /// Looks `name` up in this header, then depth-first through its parents
    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
            .or_else(|| self.parents.iter().find_map(|p| p.find_parameter(name)))
    }
}
