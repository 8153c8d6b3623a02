use bson::Bson;
use chrono::{DateTime, SecondsFormat, Utc};

use super::ScalarCodec;
use crate::config::{DateTimePrecision, MapperConfig};
use crate::error::{CodecError, CodecResult};

/// Stores chrono date-times as BSON date-times.
///
/// The document keeps the absolute instant in epoch milliseconds. Decoding
/// always yields UTC, so a zoned value comes back at the same instant with a
/// zero offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateTimeCodec;

impl DateTimeCodec {
    fn parse(text: &str) -> CodecResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CodecError::UnsupportedType {
                type_name: "chrono::DateTime".into(),
                reason: format!("{text:?} is not RFC 3339: {e}"),
            })
    }
}

impl ScalarCodec for DateTimeCodec {
    fn encode(&self, value: Bson, config: &MapperConfig) -> CodecResult<Bson> {
        let instant = match value {
            Bson::String(text) => Self::parse(&text)?,
            native @ Bson::DateTime(_) => return Ok(native),
            other => {
                return Err(CodecError::UnsupportedType {
                    type_name: "chrono::DateTime".into(),
                    reason: format!("unexpected {:?} value", other.element_type()),
                })
            }
        };

        if instant.timestamp_subsec_nanos() % 1_000_000 != 0
            && config.datetime_precision == DateTimePrecision::Strict
        {
            return Err(CodecError::PrecisionLoss {
                value: instant.to_rfc3339_opts(SecondsFormat::Nanos, true),
            });
        }
        Ok(Bson::DateTime(bson::DateTime::from_millis(
            instant.timestamp_millis(),
        )))
    }

    fn decode(&self, value: Bson, _config: &MapperConfig) -> CodecResult<Bson> {
        match value {
            Bson::DateTime(native) => {
                let millis = native.timestamp_millis();
                let instant = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                    CodecError::Deserialization(format!("date-time {millis}ms is out of range"))
                })?;
                Ok(Bson::String(
                    instant.to_rfc3339_opts(SecondsFormat::Millis, true),
                ))
            }
            text @ Bson::String(_) => Ok(text),
            other => Err(CodecError::Deserialization(format!(
                "expected a date-time, found {:?}",
                other.element_type()
            ))),
        }
    }
}
