//! Decoding policies
//!
//! Several instrument generations wrote headers whose declared cell count
//! disagrees with `rows * cols`. [`GeometryPolicy`] decides how a decoder
//! reacts; [`DecodeOptions`] bundles it with the other per-parse switches.

use log::warn;

use crate::core::ChipGeometry;
use crate::error::{Location, RecordError, Result};

/// Policy for a declared cell count that does not match `rows * cols`
///
/// The default policy is `Warn`, which logs the mismatch and keeps decoding
/// with the declared count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeometryPolicy {
    /// Log a warning and continue (default policy)
    #[default]
    Warn,

    /// Continue silently
    Ignore,

    /// Fail with a [`RecordError::GeometryMismatch`]
    Fail,
}
impl GeometryPolicy {
    /// Applies the policy to a decoded header
    ///
    /// # Arguments
    ///
    /// * `format` - Name of the format, used in the warning
    /// * `geometry` - The declared geometry
    /// * `location` - Position of the header field holding the declared count
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the geometry is consistent or the policy tolerates the mismatch
    /// * `Err(Error)` - If the geometry is inconsistent under `Fail`
    pub fn handle(&self, format: &str, geometry: &ChipGeometry, location: Location) -> Result<()> {
        if geometry.is_consistent() {
            return Ok(());
        }
        match self {
            Self::Warn => {
                warn!(
                    "{format}: declared cell count {} does not match {}x{} ({location})",
                    geometry.num_cells, geometry.num_columns, geometry.num_rows
                );
                Ok(())
            }
            Self::Ignore => Ok(()),
            Self::Fail => Err(RecordError::GeometryMismatch {
                declared: geometry.num_cells,
                cols: geometry.num_columns,
                rows: geometry.num_rows,
                location,
            }
            .into()),
        }
    }
}

/// Per-parse configuration shared by every decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub geometry_policy: GeometryPolicy,

    /// Round exported floats to the fixed precision of the legacy text exports
    pub round_values: bool,

    /// Decode CEL subgrid records instead of leaving them unread
    pub decode_subgrids: bool,
}
impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            geometry_policy: GeometryPolicy::default(),
            round_values: true,
            decode_subgrids: true,
        }
    }
}
impl DecodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_geometry_policy(mut self, policy: GeometryPolicy) -> Self {
        self.geometry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_rounding(mut self, round_values: bool) -> Self {
        self.round_values = round_values;
        self
    }

    #[must_use]
    pub fn with_subgrids(mut self, decode_subgrids: bool) -> Self {
        self.decode_subgrids = decode_subgrids;
        self
    }

    /// Rounds `value` to `places` unless rounding is disabled
    pub(crate) fn round(&self, value: f32, places: u8) -> f32 {
        if self.round_values {
            crate::core::table::round_to(value, places)
        } else {
            value
        }
    }
}
