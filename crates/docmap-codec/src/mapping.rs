//! Declarative field tables.
//!
//! A type opts into document mapping by implementing [`Mapped`] and returning
//! a [`TypeMapping`]: a list of [`FieldSpec`] entries describing only the
//! fields that need something other than the defaults (read-write, stored
//! under their serde name). The table is compiled once, at registration, into
//! a [`ResolvedMapping`] that the codec consults on every call.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{CodecError, CodecResult};
use crate::visibility::{Direction, Visibility};

/// Reserved attribute holding a document's primary key.
pub const ID_FIELD: &str = "_id";

/// How the identifier field's value is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdKind {
    /// Stored exactly as serde renders it.
    #[default]
    Natural,
    /// A hex string in Rust, a BSON ObjectId in the document.
    ObjectIdHex,
}

/// A Rust type named by a field declaration, used to find its scalar codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScalarType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ScalarType {
    pub fn of<V: 'static>() -> Self {
        Self {
            id: TypeId::of::<V>(),
            name: type_name::<V>(),
        }
    }
}

/// Metadata for one field of a mapped type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    property: String,
    document_name: Option<String>,
    visibility: Visibility,
    identifier: Option<IdKind>,
    scalar: Option<ScalarType>,
}

impl FieldSpec {
    /// A plain read-write field, keyed by its serde property name.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            document_name: None,
            visibility: Visibility::ReadWrite,
            identifier: None,
            scalar: None,
        }
    }

    /// The field mapped to the document's `_id` attribute.
    pub fn identifier(property: impl Into<String>) -> Self {
        Self {
            identifier: Some(IdKind::Natural),
            ..Self::new(property)
        }
    }

    /// Store this identifier as a BSON ObjectId parsed from its hex string.
    pub fn object_id(mut self) -> Self {
        self.identifier = Some(IdKind::ObjectIdHex);
        self
    }

    /// Store the field under a different attribute name.
    pub fn document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn write_only(self) -> Self {
        self.visibility(Visibility::WriteOnly)
    }

    pub fn read_only(self) -> Self {
        self.visibility(Visibility::ReadOnly)
    }

    pub fn ignored(self) -> Self {
        self.visibility(Visibility::Ignored)
    }

    /// Route the field's values through the scalar codec registered for `V`.
    ///
    /// `V` is the element type: declare `DateTime<Utc>` for an
    /// `Option<DateTime<Utc>>` or `Vec<DateTime<Utc>>` field.
    pub fn scalar<V: 'static>(mut self) -> Self {
        self.scalar = Some(ScalarType::of::<V>());
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Attribute name used in stored documents.
    pub fn stored_name(&self) -> &str {
        if self.identifier.is_some() {
            ID_FIELD
        } else {
            self.document_name.as_deref().unwrap_or(&self.property)
        }
    }

    pub fn id_kind(&self) -> Option<IdKind> {
        self.identifier
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier.is_some()
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.scalar
    }

    pub fn participates(&self, direction: Direction) -> bool {
        self.visibility.participates(direction)
    }

    pub fn is_renamed(&self) -> bool {
        self.stored_name() != self.property
    }
}

/// The field table a type declares.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeMapping {
    fields: Vec<FieldSpec>,
}

impl TypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate the table and compile it for `T`.
    ///
    /// `T::default()` is rendered once here; decode starts from that document
    /// so every field the stored document lacks keeps its default value.
    /// A write-only, read-only, or ignored field that serde leaves out of
    /// that rendering (`skip_serializing_if`) must carry `#[serde(default)]`,
    /// otherwise the table is rejected with [`CodecError::InvalidMapping`].
    pub fn resolve<T>(self) -> CodecResult<ResolvedMapping>
    where
        T: Serialize + DeserializeOwned + Default + 'static,
    {
        let type_name = type_name::<T>();
        let invalid = |reason: String| CodecError::InvalidMapping {
            type_name: type_name.to_string(),
            reason,
        };

        let mut by_property = HashMap::new();
        let mut by_stored_name = HashMap::new();
        let mut identifier = None;

        for (index, spec) in self.fields.iter().enumerate() {
            if by_property.insert(spec.property.clone(), index).is_some() {
                return Err(invalid(format!("property {} declared twice", spec.property)));
            }
            if spec.is_identifier() {
                if identifier.is_some() {
                    return Err(invalid("more than one identifier field".into()));
                }
                if spec.visibility != Visibility::ReadWrite {
                    return Err(invalid(format!(
                        "identifier {} must be read_write, not {}",
                        spec.property, spec.visibility
                    )));
                }
                identifier = Some(index);
            } else if spec.stored_name() == ID_FIELD {
                return Err(invalid(format!(
                    "{} is stored as {ID_FIELD} but is not the identifier",
                    spec.property
                )));
            }
            if by_stored_name.insert(spec.stored_name().to_string(), index).is_some() {
                return Err(invalid(format!(
                    "attribute {} is claimed by two fields",
                    spec.stored_name()
                )));
            }
        }

        let defaults = bson::to_document(&T::default()).map_err(|e| {
            CodecError::UnsupportedType {
                type_name: type_name.to_string(),
                reason: e.to_string(),
            }
        })?;

        // Decode falls back on the default rendering for fields it withholds,
        // so a restricted field serde leaves out must still deserialize.
        for spec in &self.fields {
            if defaults.contains_key(&spec.property) {
                continue;
            }
            warn!(
                type_name,
                property = %spec.property,
                "mapped property absent from the default rendering"
            );
            if spec.visibility == Visibility::ReadWrite {
                continue;
            }
            if let Err(e) = bson::from_document::<T>(defaults.clone()) {
                return Err(invalid(format!(
                    "{} field {} is absent from the default rendering and the type \
                     cannot be decoded without it ({e}); mark the field #[serde(default)]",
                    spec.visibility, spec.property
                )));
            }
        }

        Ok(ResolvedMapping {
            type_name,
            raw: false,
            fields: self.fields,
            by_property,
            by_stored_name,
            identifier,
            defaults,
        })
    }
}

/// A type that can be stored through a codec registry.
///
/// Decoding starts from `Self::default()`, so missing and suppressed fields
/// take their default values. Types that need no per-field metadata can rely
/// on the provided `mapping`.
///
/// Scalar codecs only run for fields that declare them with
/// [`FieldSpec::scalar`]. A `chrono::DateTime` or `uuid::Uuid` field left
/// out of the table is stored in serde's generic shape: an RFC 3339 string or
/// a hyphenated string. Declare it to get a BSON date-time or binary UUID:
///
/// ```ignore
/// fn mapping() -> TypeMapping {
///     TypeMapping::new().field(FieldSpec::new("created").scalar::<DateTime<Utc>>())
/// }
/// ```
pub trait Mapped: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    fn mapping() -> TypeMapping {
        TypeMapping::new()
    }
}

/// Raw documents map to themselves with no rules.
impl Mapped for Document {}

/// A compiled field table.
#[derive(Clone, Debug)]
pub struct ResolvedMapping {
    type_name: &'static str,
    raw: bool,
    fields: Vec<FieldSpec>,
    by_property: HashMap<String, usize>,
    by_stored_name: HashMap<String, usize>,
    identifier: Option<usize>,
    defaults: Document,
}

impl ResolvedMapping {
    /// The identity mapping for `bson::Document`: no field rules at all.
    pub(crate) fn raw() -> Self {
        Self {
            type_name: type_name::<Document>(),
            raw: true,
            fields: Vec::new(),
            by_property: HashMap::new(),
            by_stored_name: HashMap::new(),
            identifier: None,
            defaults: Document::new(),
        }
    }

    /// Returns `true` for the untyped document mapping.
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn by_property(&self, property: &str) -> Option<&FieldSpec> {
        self.by_property.get(property).map(|&i| &self.fields[i])
    }

    pub fn by_stored_name(&self, name: &str) -> Option<&FieldSpec> {
        self.by_stored_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn identifier(&self) -> Option<&FieldSpec> {
        self.identifier.map(|i| &self.fields[i])
    }

    /// Serde rendering of the type's default value.
    pub fn defaults(&self) -> &Document {
        &self.defaults
    }

    /// The default rendering of one property, if serde emitted it.
    pub fn default_value(&self, property: &str) -> Option<&Bson> {
        self.defaults.get(property)
    }
}
