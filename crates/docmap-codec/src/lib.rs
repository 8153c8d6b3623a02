//! Codec registry for docmap.
//!
//! This crate adapts serde's generic data model to BSON documents. A type
//! becomes storable by implementing [`Mapped`] and being registered with a
//! [`CodecRegistry`]; the registry then encodes values into
//! [`bson::Document`]s and decodes documents into fresh values.
//!
//! # Pieces
//!
//! - [`visibility`] -- which direction each field flows in
//! - [`mapping`] -- declarative per-type field tables
//! - [`scalar`] -- custom encodings for date-times, UUIDs, and user types
//! - [`codec`] -- the object-document encode/decode passes
//! - [`registry`] -- type-keyed lookup of codecs
//! - [`config`] -- settings shared by every codec in a registry
//!
//! # Rules
//!
//! 1. Registration happens on an owned registry; sharing freezes it.
//! 2. Encode never emits read-only or ignored fields.
//! 3. Decode never reads write-only or ignored fields; they keep their defaults.
//! 4. The identifier field is always stored as `_id`.
//! 5. A field that asks for a scalar codec nobody registered fails at encode.

pub mod codec;
pub mod config;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod scalar;
pub mod visibility;

pub use codec::DocumentCodec;
pub use config::{DateTimePrecision, MapperConfig, UuidRepresentation};
pub use error::{CodecError, CodecResult};
pub use mapping::{FieldSpec, IdKind, Mapped, ResolvedMapping, TypeMapping, ID_FIELD};
pub use registry::CodecRegistry;
pub use scalar::{DateTimeCodec, ScalarCodec, UuidCodec};
pub use visibility::{Direction, Visibility};

pub use bson;
