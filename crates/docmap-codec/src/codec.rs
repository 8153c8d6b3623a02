//! The object-document codec.
//!
//! Encoding lets serde render the object, then walks the rendered fields
//! through the type's field table: visibility, identifier handling, scalar
//! codecs, and attribute renames. Decoding runs the same table in reverse on
//! top of the rendered default value, so anything the stored document lacks
//! (or that visibility suppresses) keeps its default.

use std::marker::PhantomData;
use std::sync::Arc;

use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};
use crate::mapping::{FieldSpec, IdKind, ResolvedMapping, ID_FIELD};
use crate::registry::CodecRegistry;
use crate::scalar;
use crate::visibility::Direction;

/// Encoder/decoder for one registered type, borrowed from a [`CodecRegistry`].
pub struct DocumentCodec<'r, T> {
    registry: &'r CodecRegistry,
    mapping: Arc<ResolvedMapping>,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T> DocumentCodec<'r, T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(registry: &'r CodecRegistry, mapping: Arc<ResolvedMapping>) -> Self {
        Self {
            registry,
            mapping,
            _marker: PhantomData,
        }
    }

    pub fn mapping(&self) -> &ResolvedMapping {
        &self.mapping
    }

    /// Render `value` as a storable document.
    ///
    /// A null identifier is left out so the store can assign one.
    pub fn encode(&self, value: &T) -> CodecResult<Document> {
        let rendered = bson::to_document(value).map_err(|e| CodecError::UnsupportedType {
            type_name: self.mapping.type_name().to_string(),
            reason: e.to_string(),
        })?;
        if self.mapping.is_raw() {
            return Ok(rendered);
        }

        let omit_nulls = self.registry.config().omit_null_fields;
        let mut identifier = None;
        let mut fields = Vec::with_capacity(rendered.len());

        for (property, value) in rendered {
            let Some(spec) = self.mapping.by_property(&property) else {
                if !(omit_nulls && value == Bson::Null) {
                    fields.push((property, value));
                }
                continue;
            };
            if !spec.participates(Direction::Encode) {
                continue;
            }
            let value = self.convert_scalar(spec, value, Direction::Encode)?;
            if spec.is_identifier() {
                if value != Bson::Null {
                    identifier = Some(encode_identifier(spec, value)?);
                }
                continue;
            }
            if omit_nulls && value == Bson::Null {
                continue;
            }
            fields.push((spec.stored_name().to_string(), value));
        }

        let mut document = Document::new();
        if let Some(id) = identifier {
            document.insert(ID_FIELD, id);
        }
        for (name, value) in fields {
            document.insert(name, value);
        }
        Ok(document)
    }

    /// Build a new `T` from a stored document.
    ///
    /// Attributes no field claims are handed to serde untouched; serde drops
    /// them unless the type denies unknown fields.
    pub fn decode(&self, document: Document) -> CodecResult<T> {
        if self.mapping.is_raw() {
            return from_document(document);
        }

        let mut merged = self.mapping.defaults().clone();
        for (name, value) in document {
            let (property, value) = match self.mapping.by_stored_name(&name) {
                Some(spec) => {
                    if !spec.participates(Direction::Decode) {
                        continue;
                    }
                    let value = if spec.is_identifier() {
                        self.decode_identifier(spec, value)
                    } else {
                        value
                    };
                    let value = self.convert_scalar(spec, value, Direction::Decode)?;
                    (spec.property().to_string(), value)
                }
                // The property name of a renamed field is not its attribute.
                None if self
                    .mapping
                    .by_property(&name)
                    .is_some_and(FieldSpec::is_renamed) =>
                {
                    continue
                }
                None => (name, value),
            };
            merged.insert(property, value);
        }
        from_document(merged)
    }

    fn convert_scalar(&self, spec: &FieldSpec, value: Bson, direction: Direction) -> CodecResult<Bson> {
        match spec.scalar_type() {
            Some(scalar_type) => {
                let codec = self.registry.scalar(scalar_type, spec.property())?;
                scalar::apply(codec, value, direction, self.registry.config())
            }
            None => Ok(value),
        }
    }

    fn decode_identifier(&self, spec: &FieldSpec, value: Bson) -> Bson {
        match (spec.id_kind(), value) {
            (Some(IdKind::ObjectIdHex), Bson::ObjectId(oid)) => Bson::String(oid.to_hex()),
            // A store-assigned ObjectId lands in a string-shaped identifier as hex.
            (Some(IdKind::Natural), Bson::ObjectId(oid))
                if matches!(
                    self.mapping.default_value(spec.property()),
                    Some(Bson::Null | Bson::String(_))
                ) =>
            {
                Bson::String(oid.to_hex())
            }
            (_, value) => value,
        }
    }
}

fn encode_identifier(spec: &FieldSpec, value: Bson) -> CodecResult<Bson> {
    match (spec.id_kind(), value) {
        (Some(IdKind::ObjectIdHex), Bson::String(text)) => ObjectId::parse_str(&text)
            .map(Bson::ObjectId)
            .map_err(|_| CodecError::InvalidIdentifier { value: text }),
        (Some(IdKind::ObjectIdHex), native @ Bson::ObjectId(_)) => Ok(native),
        (Some(IdKind::ObjectIdHex), other) => Err(CodecError::InvalidIdentifier {
            value: other.to_string(),
        }),
        (_, value) => Ok(value),
    }
}

fn from_document<T: DeserializeOwned>(document: Document) -> CodecResult<T> {
    bson::from_document(document).map_err(|e| CodecError::Deserialization(e.to_string()))
}
