use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bson::Document;
use chrono::{DateTime, FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::codec::DocumentCodec;
use crate::config::MapperConfig;
use crate::error::{CodecError, CodecResult};
use crate::mapping::{Mapped, ResolvedMapping, ScalarType};
use crate::scalar::{DateTimeCodec, ScalarCodec, UuidCodec};

struct ScalarEntry {
    name: &'static str,
    codec: Arc<dyn ScalarCodec>,
}

/// Registry of document codecs, keyed by Rust type.
///
/// Registration takes `&mut self`; once the registry is moved into an `Arc`
/// and shared, it is read-only and safe for concurrent lookups.
///
/// A fresh registry already knows:
/// - `bson::Document` (identity codec, no field rules)
/// - scalar codecs for `DateTime<Utc>`, `DateTime<FixedOffset>`, and `uuid::Uuid`
pub struct CodecRegistry {
    config: MapperConfig,
    scalars: HashMap<TypeId, ScalarEntry>,
    types: HashMap<TypeId, Arc<ResolvedMapping>>,
}

impl CodecRegistry {
    /// Create a registry with the built-in codecs.
    pub fn new(config: MapperConfig) -> Self {
        let mut registry = Self {
            config,
            scalars: HashMap::new(),
            types: HashMap::new(),
        };
        registry
            .types
            .insert(TypeId::of::<Document>(), Arc::new(ResolvedMapping::raw()));
        registry
            .add_scalar_codec::<DateTime<Utc>>(DateTimeCodec)
            .add_scalar_codec::<DateTime<FixedOffset>>(DateTimeCodec)
            .add_scalar_codec::<uuid::Uuid>(UuidCodec);
        registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Register (or replace) the scalar codec for values of type `V`.
    pub fn add_scalar_codec<V: 'static>(&mut self, codec: impl ScalarCodec + 'static) -> &mut Self {
        let name = type_name::<V>();
        debug!(scalar = name, "registered scalar codec");
        self.scalars.insert(
            TypeId::of::<V>(),
            ScalarEntry {
                name,
                codec: Arc::new(codec),
            },
        );
        self
    }

    /// Make `T` storable: compile its field table and index it by type.
    ///
    /// Registering a type again is a no-op; the first compiled table stays.
    pub fn add_codec_for<T: Mapped>(&mut self) -> CodecResult<()> {
        let key = TypeId::of::<T>();
        if self.types.contains_key(&key) {
            debug!(type_name = type_name::<T>(), "codec already registered");
            return Ok(());
        }
        let resolved = T::mapping().resolve::<T>()?;
        debug!(
            type_name = resolved.type_name(),
            identifier = resolved.identifier().map(|f| f.property()),
            "registered document codec"
        );
        self.types.insert(key, Arc::new(resolved));
        Ok(())
    }

    /// Returns `true` if a document codec exists for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    /// Look up the codec for `T`.
    pub fn codec<T>(&self) -> CodecResult<DocumentCodec<'_, T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.types
            .get(&TypeId::of::<T>())
            .map(|mapping| DocumentCodec::new(self, Arc::clone(mapping)))
            .ok_or_else(|| CodecError::CodecNotFound {
                type_name: type_name::<T>().to_string(),
            })
    }

    /// Encode `value` with the codec registered for `T`.
    pub fn encode<T>(&self, value: &T) -> CodecResult<Document>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.codec::<T>()?.encode(value)
    }

    /// Decode `document` into a new `T`.
    pub fn decode<T>(&self, document: Document) -> CodecResult<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.codec::<T>()?.decode(document)
    }

    /// Find the scalar codec a field declaration asks for.
    pub(crate) fn scalar(&self, scalar: ScalarType, field: &str) -> CodecResult<&dyn ScalarCodec> {
        self.scalars
            .get(&scalar.id)
            .map(|entry| entry.codec.as_ref())
            .ok_or_else(|| CodecError::UnsupportedType {
                type_name: scalar.name.to_string(),
                reason: format!("field {field} declares a scalar type with no registered codec"),
            })
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scalars: Vec<&str> = self.scalars.values().map(|e| e.name).collect();
        scalars.sort_unstable();
        let mut types: Vec<&str> = self.types.values().map(|m| m.type_name()).collect();
        types.sort_unstable();
        f.debug_struct("CodecRegistry")
            .field("config", &self.config)
            .field("scalars", &scalars)
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldSpec, TypeMapping};
    use bson::{doc, Bson};
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Plain {
        id: Option<String>,
        count: i32,
    }

    impl Mapped for Plain {
        fn mapping() -> TypeMapping {
            TypeMapping::new().field(FieldSpec::identifier("id"))
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Broken {
        a: i32,
    }

    impl Mapped for Broken {
        fn mapping() -> TypeMapping {
            TypeMapping::new()
                .field(FieldSpec::identifier("a"))
                .field(FieldSpec::identifier("b"))
        }
    }

    #[test]
    fn document_is_preregistered() {
        let registry = CodecRegistry::default();
        assert!(registry.contains::<Document>());
        let raw = doc! { "_id": 1, "x": Bson::Null };
        assert_eq!(registry.encode(&raw).unwrap(), raw);
        assert_eq!(registry.decode::<Document>(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn unregistered_type_not_found() {
        let registry = CodecRegistry::default();
        let err = registry.encode(&Plain::default()).unwrap_err();
        assert!(matches!(err, CodecError::CodecNotFound { .. }));
    }

    #[test]
    fn registration_is_idempotent() {
        let mut registry = CodecRegistry::default();
        registry.add_codec_for::<Plain>().unwrap();
        let value = Plain {
            id: Some("a".into()),
            count: 3,
        };
        let first = registry.encode(&value).unwrap();
        registry.add_codec_for::<Plain>().unwrap();
        assert_eq!(registry.encode(&value).unwrap(), first);
        assert_eq!(first, doc! { "_id": "a", "count": 3 });
    }

    #[test]
    fn invalid_mapping_not_registered() {
        let mut registry = CodecRegistry::default();
        assert!(matches!(
            registry.add_codec_for::<Broken>(),
            Err(CodecError::InvalidMapping { .. })
        ));
        assert!(!registry.contains::<Broken>());
    }

    #[test]
    fn missing_scalar_is_unsupported() {
        let registry = CodecRegistry::default();
        let err = registry
            .scalar(ScalarType::of::<std::time::Duration>(), "elapsed")
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));
        assert!(registry.scalar(ScalarType::of::<DateTime<Utc>>(), "at").is_ok());
    }

    #[test]
    fn debug_lists_registrations() {
        let mut registry = CodecRegistry::default();
        registry.add_codec_for::<Plain>().unwrap();
        let rendered = format!("{registry:?}");
        assert!(rendered.contains("Plain"));
        assert!(rendered.contains("uuid::Uuid"));
    }
}
