//! Schema descriptors.
//!
//! A [`Schema`] is the ordered field list of one composite type. It is built
//! once from the type's [`Composite::describe`] registration and cached per
//! type in a [`SchemaCache`]. Embedded composites are flattened into the
//! parent's list at build time, so the codec never sees nesting.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::{FieldSpec, Modifier};
use crate::codec::{
    ComputedField, FieldCodec, MapField, Projected, ReferenceField, ReferencesField, ScalarField,
    SetField, StringsField,
};
use crate::computed::ComputedBool;
use crate::container::{MapContainer, SetContainer};
use crate::entity::{Composite, Entity};
use crate::error::{CodecError, CodecResult};
use crate::scalar::Scalar;

/// Classification of a field's shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar,
    NullableScalar,
    EntityReference,
    ReferenceSequence,
    /// A literal list of strings.
    StringSequence,
    MapContainer,
    SetContainer,
    BooleanScalar,
    BooleanComputed,
    Timestamp,
}

impl FieldKind {
    /// Whether values of this kind live in the entity's own hash.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            FieldKind::Scalar
                | FieldKind::NullableScalar
                | FieldKind::EntityReference
                | FieldKind::BooleanScalar
                | FieldKind::Timestamp
        )
    }
}

/// One persisted field of `T`.
pub struct FieldDescriptor<T> {
    name: String,
    modifier: Modifier,
    kind: FieldKind,
    codec: Box<dyn FieldCodec<T>>,
}

impl<T> FieldDescriptor<T> {
    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_computed(&self) -> bool {
        self.kind == FieldKind::BooleanComputed
    }

    pub(crate) fn codec(&self) -> &dyn FieldCodec<T> {
        self.codec.as_ref()
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("modifier", &self.modifier)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The ordered, flattened field list of a composite type.
pub struct Schema<T> {
    type_name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> Schema<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Look up a field by store name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Collects field registrations for a composite type.
///
/// Registration methods never fail immediately; the first error is kept and
/// returned by [`build`](Self::build).
pub struct SchemaBuilder<T> {
    fields: Vec<FieldDescriptor<T>>,
    error: Option<CodecError>,
}

impl<T: 'static> Default for SchemaBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> SchemaBuilder<T> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            error: None,
        }
    }

    fn push(
        mut self,
        spec: FieldSpec,
        kind: FieldKind,
        codec: impl FnOnce() -> Box<dyn FieldCodec<T>>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        let annotation = match spec.resolve() {
            Ok(annotation) => annotation,
            Err(err) => {
                self.error = Some(err);
                return self;
            }
        };
        if annotation.is_skipped() {
            return self;
        }
        self.insert(FieldDescriptor {
            name: annotation.name,
            modifier: annotation.modifier,
            kind,
            codec: codec(),
        })
    }

    fn insert(mut self, descriptor: FieldDescriptor<T>) -> Self {
        if self.fields.iter().any(|f| f.name == descriptor.name) {
            self.error = Some(CodecError::DuplicateField {
                name: descriptor.name,
            });
            return self;
        }
        self.fields.push(descriptor);
        self
    }

    /// A value stored as text in the entity's hash. Covers numbers, strings,
    /// booleans, timestamps, nullable scalars and scalar newtypes.
    pub fn scalar<F: Scalar>(
        mut self,
        spec: impl Into<FieldSpec>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        let spec = spec.into();
        let supported = matches!(
            F::KIND,
            FieldKind::Scalar
                | FieldKind::NullableScalar
                | FieldKind::BooleanScalar
                | FieldKind::Timestamp
        );
        if !supported {
            // A skipped field is never persisted, so its kind does not matter.
            if self.error.is_none() {
                self.error = match spec.resolve() {
                    Ok(annotation) if annotation.is_skipped() => None,
                    Ok(annotation) => Some(CodecError::UnsupportedFieldKind {
                        field: annotation.name,
                    }),
                    Err(err) => Some(err),
                };
            }
            return self;
        }
        self.push(spec, F::KIND, || Box::new(ScalarField { get, get_mut }))
    }

    /// A reference to another entity, stored as its ID.
    pub fn reference<R: Entity>(
        self,
        spec: impl Into<FieldSpec>,
        get: fn(&T) -> &Option<Box<R>>,
        get_mut: fn(&mut T) -> &mut Option<Box<R>>,
    ) -> Self {
        self.push(spec.into(), FieldKind::EntityReference, || {
            Box::new(ReferenceField { get, get_mut })
        })
    }

    /// An ordered list of references, stored as a list of IDs.
    pub fn references<R: Entity>(
        self,
        spec: impl Into<FieldSpec>,
        get: fn(&T) -> &Vec<R>,
        get_mut: fn(&mut T) -> &mut Vec<R>,
    ) -> Self {
        self.push(spec.into(), FieldKind::ReferenceSequence, || {
            Box::new(ReferencesField { get, get_mut })
        })
    }

    /// An ordered list of plain strings.
    pub fn strings(
        self,
        spec: impl Into<FieldSpec>,
        get: fn(&T) -> &Vec<String>,
        get_mut: fn(&mut T) -> &mut Vec<String>,
    ) -> Self {
        self.push(spec.into(), FieldKind::StringSequence, || {
            Box::new(StringsField { get, get_mut })
        })
    }

    pub fn map<C: MapContainer>(
        self,
        spec: impl Into<FieldSpec>,
        get: fn(&T) -> &C,
        get_mut: fn(&mut T) -> &mut C,
    ) -> Self {
        self.push(spec.into(), FieldKind::MapContainer, || {
            Box::new(MapField { get, get_mut })
        })
    }

    pub fn set<C: SetContainer>(
        self,
        spec: impl Into<FieldSpec>,
        get: fn(&T) -> &C,
        get_mut: fn(&mut T) -> &mut C,
    ) -> Self {
        self.push(spec.into(), FieldKind::SetContainer, || {
            Box::new(SetField { get, get_mut })
        })
    }

    /// A boolean resolved from store state on load and never written.
    pub fn computed<B: ComputedBool>(
        self,
        spec: impl Into<FieldSpec>,
        get_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        self.push(spec.into(), FieldKind::BooleanComputed, || {
            Box::new(ComputedField { get_mut })
        })
    }

    /// Flatten the fields of an embedded composite into this schema.
    pub fn embed<E: Composite>(mut self, get: fn(&T) -> &E, get_mut: fn(&mut T) -> &mut E) -> Self {
        if self.error.is_some() {
            return self;
        }
        let inner = E::describe(SchemaBuilder::new());
        if let Some(err) = inner.error {
            self.error = Some(err);
            return self;
        }
        for field in inner.fields {
            self = self.insert(FieldDescriptor {
                name: field.name,
                modifier: field.modifier,
                kind: field.kind,
                codec: Box::new(Projected {
                    get,
                    get_mut,
                    inner: field.codec,
                }),
            });
        }
        self
    }

    pub fn build(self) -> CodecResult<Schema<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Schema {
                type_name: std::any::type_name::<T>(),
                fields: self.fields,
            }),
        }
    }
}

impl<T: Entity> SchemaBuilder<T> {
    /// Flatten the entity's [`Base`](crate::Base) fields into this schema.
    pub fn base(self) -> Self {
        self.embed(T::base, T::base_mut)
    }
}

/// Built schemas, one per composite type.
#[derive(Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the schema of `T`, building it on first use.
    pub fn get<T: Composite>(&self) -> CodecResult<Arc<Schema<T>>> {
        let type_id = TypeId::of::<T>();
        let cached = self
            .schemas
            .read()
            .expect("lock poisoned")
            .get(&type_id)
            .cloned();
        if let Some(schema) = cached.and_then(|s| s.downcast::<Schema<T>>().ok()) {
            return Ok(schema);
        }

        let schema = Arc::new(T::describe(SchemaBuilder::new()).build()?);
        debug!(
            type_name = schema.type_name(),
            fields = schema.len(),
            "schema built"
        );
        let erased: Arc<dyn Any + Send + Sync> = schema.clone();
        self.schemas
            .write()
            .expect("lock poisoned")
            .insert(type_id, erased);
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("schemas", &self.len())
            .finish()
    }
}
