use bson::spec::BinarySubtype;
use bson::{Binary, Bson};
use uuid::Uuid;

use super::ScalarCodec;
use crate::config::{MapperConfig, UuidRepresentation};
use crate::error::{CodecError, CodecResult};

/// Stores `uuid::Uuid` values as BSON binary under the configured layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidCodec;

/// Reorder bytes between RFC 4122 order and a legacy layout.
///
/// Each shuffle is its own inverse, so the same function serves both ways.
fn shuffle(mut bytes: [u8; 16], representation: UuidRepresentation) -> [u8; 16] {
    match representation {
        UuidRepresentation::JavaLegacy => {
            bytes[0..8].reverse();
            bytes[8..16].reverse();
        }
        UuidRepresentation::CSharpLegacy => {
            bytes[0..4].reverse();
            bytes[4..6].reverse();
            bytes[6..8].reverse();
        }
        _ => {}
    }
    bytes
}

fn to_array(bytes: &[u8]) -> CodecResult<[u8; 16]> {
    bytes.try_into().map_err(|_| {
        CodecError::UuidRepresentation(format!("expected 16 bytes, found {}", bytes.len()))
    })
}

impl ScalarCodec for UuidCodec {
    fn encode(&self, value: Bson, config: &MapperConfig) -> CodecResult<Bson> {
        let uuid = match value {
            Bson::String(text) => Uuid::parse_str(&text).map_err(|e| {
                CodecError::UnsupportedType {
                    type_name: "uuid::Uuid".into(),
                    reason: format!("{text:?}: {e}"),
                }
            })?,
            Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            }) => Uuid::from_bytes(to_array(&bytes)?),
            native @ Bson::Binary(Binary {
                subtype: BinarySubtype::Uuid | BinarySubtype::UuidOld,
                ..
            }) => return Ok(native),
            other => {
                return Err(CodecError::UnsupportedType {
                    type_name: "uuid::Uuid".into(),
                    reason: format!("unexpected {:?} value", other.element_type()),
                })
            }
        };

        let representation = config.uuid_representation;
        let subtype = match representation {
            UuidRepresentation::Unspecified => {
                return Err(CodecError::UuidRepresentation(
                    "cannot encode a UUID while the representation is unspecified".into(),
                ))
            }
            UuidRepresentation::Standard => BinarySubtype::Uuid,
            _ => BinarySubtype::UuidOld,
        };
        Ok(Bson::Binary(Binary {
            subtype,
            bytes: shuffle(*uuid.as_bytes(), representation).to_vec(),
        }))
    }

    fn decode(&self, value: Bson, config: &MapperConfig) -> CodecResult<Bson> {
        let bytes = match value {
            Bson::Binary(Binary {
                subtype: BinarySubtype::Uuid,
                bytes,
            }) => to_array(&bytes)?,
            Bson::Binary(Binary {
                subtype: BinarySubtype::UuidOld,
                bytes,
            }) => match config.uuid_representation {
                representation @ (UuidRepresentation::JavaLegacy
                | UuidRepresentation::CSharpLegacy
                | UuidRepresentation::PythonLegacy) => shuffle(to_array(&bytes)?, representation),
                other => {
                    return Err(CodecError::UuidRepresentation(format!(
                        "legacy binary UUID cannot be read with representation {other:?}"
                    )))
                }
            },
            text @ Bson::String(_) => return Ok(text),
            other => {
                return Err(CodecError::Deserialization(format!(
                    "expected a binary UUID, found {:?}",
                    other.element_type()
                )))
            }
        };
        Ok(Bson::String(Uuid::from_bytes(bytes).to_string()))
    }
}
