//! # affybin
//!
//! Decoders for the binary and legacy text data files written by Affymetrix
//! microarray instruments:
//!
//! - probe layout files (CDF), text and XDA binary
//! - cell intensity files (CEL), text v3 and binary v4
//! - results files (CHP), legacy GDAC and XDA binary
//! - the self-describing generic (Command Console) container
//!
//! Every decoded file is reduced to the same normalized view through the
//! [`DataFile`] trait: a row/column [`Table`], a flat [`ParameterMap`] and an
//! optional chip type.
//!
//! ## Decoding a stream
//!
//! ```no_run
//! use std::fs::File;
//! use affybin::{DataFile, Decoder};
//!
//! let decoder = Decoder::new(File::open("sample.cel")?)?;
//! println!("format: {}", decoder.format());
//!
//! let file = decoder.parse()?;
//! let mut out = std::io::stdout();
//! file.table().write_tsv(&mut out)?;
//! # Ok::<(), affybin::Error>(())
//! ```
//!
//! ## Decoding many files
//!
//! [`decode_parallel`] spreads a list of paths over worker threads and hands
//! each decoded file to a [`FileProcessor`]. Files may be gzip, bzip2, xz or
//! zstd compressed.

pub mod cdf;
pub mod cel;
pub mod chp;
pub mod core;
mod dispatch;
pub mod error;
pub mod generic;
mod parallel;
mod policy;

#[cfg(test)]
mod fixtures;

pub use crate::core::{ByteReader, ChipGeometry, DataFile, ParameterMap, Table, Value};
pub use dispatch::{detect_format, open_path, DecodedFile, Decoder, Format};
pub use error::{Error, ErrorKind, IntoDecodeError, Location, Result};
pub use parallel::{decode_parallel, FileProcessor};
pub use policy::{DecodeOptions, GeometryPolicy};
