use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Binary layout used when storing `uuid::Uuid` values.
///
/// The legacy layouts match the byte orders the MongoDB drivers used for
/// binary subtype 3 before subtype 4 was standardized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidRepresentation {
    /// Refuse to encode UUIDs; decoding still accepts subtype 4.
    Unspecified,
    /// RFC 4122 byte order, binary subtype 4.
    #[default]
    Standard,
    /// Each 8-byte half reversed, binary subtype 3.
    JavaLegacy,
    /// First three groups little-endian, binary subtype 3.
    CSharpLegacy,
    /// RFC 4122 byte order, binary subtype 3.
    PythonLegacy,
}

/// How date-times finer than one millisecond are handled on encode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimePrecision {
    /// Fail with [`CodecError::PrecisionLoss`].
    #[default]
    Strict,
    /// Drop the sub-millisecond part.
    Truncate,
}

/// Process-wide settings shared by every codec in a registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Layout for UUID scalars.
    pub uuid_representation: UuidRepresentation,
    /// Leave null-valued fields out of encoded documents.
    pub omit_null_fields: bool,
    /// Policy for date-times that do not fit in epoch milliseconds.
    pub datetime_precision: DateTimePrecision,
}

impl MapperConfig {
    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> CodecResult<Self> {
        toml::from_str(text).map_err(|e| CodecError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> CodecResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CodecError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Builder-style setter for the UUID layout.
    pub fn with_uuid_representation(mut self, representation: UuidRepresentation) -> Self {
        self.uuid_representation = representation;
        self
    }

    /// Builder-style setter for null omission.
    pub fn with_omit_null_fields(mut self, omit: bool) -> Self {
        self.omit_null_fields = omit;
        self
    }

    /// Builder-style setter for date-time precision handling.
    pub fn with_datetime_precision(mut self, precision: DateTimePrecision) -> Self {
        self.datetime_precision = precision;
        self
    }
}
