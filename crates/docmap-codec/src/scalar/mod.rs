//! Custom scalar encodings.
//!
//! Serde renders every value in a generic shape (a date-time becomes an
//! RFC 3339 string, a UUID a hyphenated string). A [`ScalarCodec`] converts
//! between that generic shape and the value the document should actually
//! hold, in both directions.

mod datetime;
mod uuid;

pub use self::datetime::DateTimeCodec;
pub use self::uuid::UuidCodec;

use std::fmt;

use bson::Bson;

use crate::config::MapperConfig;
use crate::error::CodecResult;
use crate::visibility::Direction;

/// Converts one scalar type between its serde shape and its document shape.
pub trait ScalarCodec: Send + Sync + fmt::Debug {
    /// Generic serde value to document-native value.
    fn encode(&self, value: Bson, config: &MapperConfig) -> CodecResult<Bson>;

    /// Document-native value to the shape serde expects.
    fn decode(&self, value: Bson, config: &MapperConfig) -> CodecResult<Bson>;
}

/// Run `codec` over a field value.
///
/// Null passes through so optional fields work; arrays are converted
/// element by element so sequence fields work.
pub(crate) fn apply(
    codec: &dyn ScalarCodec,
    value: Bson,
    direction: Direction,
    config: &MapperConfig,
) -> CodecResult<Bson> {
    match value {
        Bson::Null => Ok(Bson::Null),
        Bson::Array(items) => items
            .into_iter()
            .map(|item| apply(codec, item, direction, config))
            .collect::<CodecResult<Vec<_>>>()
            .map(Bson::Array),
        other => match direction {
            Direction::Encode => codec.encode(other, config),
            Direction::Decode => codec.decode(other, config),
        },
    }
}
