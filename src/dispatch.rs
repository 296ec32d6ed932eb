//! Format detection and dispatch
//!
//! The first four bytes of every supported file, read as a little-endian
//! `u32`, identify its format. [`Decoder`] binds a detected [`Format`] to its
//! stream and [`Decoder::parse`] runs the matching decoder.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::str::FromStr;

use log::debug;
use memmap2::Mmap;

use crate::cdf::{self, CdfFile};
use crate::cel::{self, CelFile};
use crate::chp::{self, ChpFile};
use crate::core::{ByteReader, ChipGeometry, DataFile, ParameterMap, Table};
use crate::error::{FormatError, ReadError, Result};
use crate::generic::{self, GenericFile};
use crate::policy::DecodeOptions;

/// Every format this crate decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Legacy text CDF (`[CDF]`)
    CdfText,
    /// Binary CDF
    CdfXda,
    /// Legacy text CEL v3 (`[CEL]`)
    CelText,
    /// Binary CEL v4
    CelXda,
    /// Legacy binary CHP (`GeneChip Sequence File`)
    ChpGdac,
    /// Binary CHP
    ChpXda,
    /// Generic (Command Console) container
    Generic,
}

impl Format {
    pub const ALL: [Self; 7] = [
        Self::CdfText,
        Self::CdfXda,
        Self::CelText,
        Self::CelXda,
        Self::ChpGdac,
        Self::ChpXda,
        Self::Generic,
    ];

    /// Maps a signature to its format
    #[must_use]
    pub fn from_signature(signature: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.signature() == signature)
    }

    /// The leading four bytes of this format as a little-endian `u32`
    #[must_use]
    pub fn signature(self) -> u32 {
        match self {
            Self::CdfText => 1_178_878_811,
            Self::CdfXda => 67,
            Self::CelText => 1_279_607_643,
            Self::CelXda => 64,
            Self::ChpGdac => 1_701_733_703,
            Self::ChpXda => 65,
            Self::Generic => 315,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CdfText => "cdf-text",
            Self::CdfXda => "cdf-xda",
            Self::CelText => "cel-text",
            Self::CelXda => "cel-xda",
            Self::ChpGdac => "chp-gdac",
            Self::ChpXda => "chp-xda",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown format '{s}'"))
    }
}

/// Reads the signature at offset 0 and rewinds to 0
///
/// # Errors
///
/// * [`ReadError::TruncatedInput`] if the stream holds fewer than four bytes
/// * [`FormatError::UnrecognizedSignature`] for an unknown signature
pub fn detect_format<R: Read + Seek>(inner: &mut R) -> Result<Format> {
    let mut reader: ByteReader<&mut R> = ByteReader::new(inner)?;
    reader.rewind()?;
    let signature = reader.read_u32()?;
    reader.rewind()?;
    Format::from_signature(signature)
        .ok_or_else(|| FormatError::UnrecognizedSignature(signature).into())
}

/// A stream bound to its detected format
pub struct Decoder<R> {
    format: Format,
    inner: R,
    options: DecodeOptions,
}

impl<R: Read + Seek> Decoder<R> {
    /// Detects the format of `inner` with the default options
    pub fn new(inner: R) -> Result<Self> {
        Self::with_options(inner, DecodeOptions::default())
    }

    pub fn with_options(mut inner: R, options: DecodeOptions) -> Result<Self> {
        let format = detect_format(&mut inner)?;
        debug!("detected {format} input");
        Ok(Self {
            format,
            inner,
            options,
        })
    }

    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Decodes the whole stream
    ///
    /// Nothing partially decoded is returned on failure.
    pub fn parse(self) -> Result<DecodedFile> {
        let Self {
            format,
            inner,
            options,
        } = self;
        Ok(match format {
            Format::CdfText => DecodedFile::Cdf(cdf::text::decode(inner)?),
            Format::CdfXda => DecodedFile::Cdf(cdf::xda::decode(inner)?),
            Format::CelText => DecodedFile::Cel(cel::text::decode(inner, &options)?),
            Format::CelXda => DecodedFile::Cel(cel::xda::decode(inner, &options)?),
            Format::ChpGdac => DecodedFile::Chp(chp::gdac::decode(inner, &options)?),
            Format::ChpXda => DecodedFile::Chp(chp::xda::decode(inner, &options)?),
            Format::Generic => DecodedFile::Generic(generic::decode(inner)?),
        })
    }
}

/// Any decoded file
#[derive(Debug, Clone)]
pub enum DecodedFile {
    Cdf(CdfFile),
    Cel(CelFile),
    Chp(ChpFile),
    Generic(GenericFile),
}

impl DecodedFile {
    #[must_use]
    pub fn as_cdf(&self) -> Option<&CdfFile> {
        match self {
            Self::Cdf(file) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_cel(&self) -> Option<&CelFile> {
        match self {
            Self::Cel(file) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_chp(&self) -> Option<&ChpFile> {
        match self {
            Self::Chp(file) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_generic(&self) -> Option<&GenericFile> {
        match self {
            Self::Generic(file) => Some(file),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn DataFile {
        match self {
            Self::Cdf(file) => file,
            Self::Cel(file) => file,
            Self::Chp(file) => file,
            Self::Generic(file) => file,
        }
    }
}

impl DataFile for DecodedFile {
    fn format(&self) -> Format {
        self.inner().format()
    }

    fn geometry(&self) -> ChipGeometry {
        self.inner().geometry()
    }

    fn chip_type(&self) -> Option<&str> {
        self.inner().chip_type()
    }

    fn parameters(&self) -> &ParameterMap {
        self.inner().parameters()
    }

    fn table(&self) -> Table {
        self.inner().table()
    }
}

/// Bytes of an opened file: mapped when stored plain, decompressed otherwise
enum Source {
    Mapped(Mmap),
    Buffer(Vec<u8>),
}
impl AsRef<[u8]> for Source {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Buffer(buf) => buf,
        }
    }
}
impl Source {
    /// Decompresses `mmap` into memory if it holds gzip, bzip2, xz or zstd data
    fn acquire(mmap: Mmap) -> Result<Self> {
        // too short for any compression header
        if mmap.len() < 5 {
            return Ok(Self::Mapped(mmap));
        }
        let decompressed = {
            let (mut reader, compression) = niffler::get_reader(Box::new(&mmap[..]))?;
            match compression {
                niffler::compression::Format::No => None,
                other => {
                    debug!("decompressing {other:?} input");
                    let mut buf = Vec::new();
                    reader.read_to_end(&mut buf)?;
                    Some(buf)
                }
            }
        };
        Ok(match decompressed {
            Some(buf) => Self::Buffer(buf),
            None => Self::Mapped(mmap),
        })
    }
}

/// Opens, detects and decodes the file at `path`
///
/// Compressed files are decompressed into memory first; plain files are
/// memory-mapped.
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be opened
/// * The file is not a regular file
/// * The compressed stream is corrupt
/// * Detection or decoding fails
pub fn open_path<P: AsRef<Path>>(path: P, options: DecodeOptions) -> Result<DecodedFile> {
    // Verify input file is a file before attempting to map
    let file = File::open(path)?;
    if !file.metadata()?.is_file() {
        return Err(ReadError::IncompatibleFile.into());
    }

    // Safety: the file is open and won't be modified while mapped
    let mmap = unsafe { Mmap::map(&file)? };

    let source = Source::acquire(mmap)?;
    Decoder::with_options(Cursor::new(source), options)?.parse()
}
