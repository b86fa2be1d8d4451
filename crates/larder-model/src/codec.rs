//! Field codecs: translate entity fields to store commands and back.
//!
//! Each registered field owns a [`FieldCodec`] built from the accessor pair
//! passed to the [`SchemaBuilder`](crate::SchemaBuilder). [`bind`] runs every
//! decoder of a schema against a fetched record; [`encode_fields`] runs every
//! encoder that the [`EncodePolicy`] admits.

use larder_store::{Batch, KvStore, Record};
use tracing::debug;

use crate::annotation::Modifier;
use crate::computed::ComputedBool;
use crate::container::{MapContainer, SetContainer};
use crate::entity::{keys, Entity};
use crate::error::{CodecError, CodecResult};
use crate::scalar::Scalar;
use crate::schema::{Schema, SchemaCache};

/// Everything a decoder may consult besides the entity's own record.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    pub store: &'a dyn KvStore,
    pub schemas: &'a SchemaCache,
    /// Fail with [`CodecError::MissingReference`] or
    /// [`CodecError::ReferenceCycle`] instead of leaving the reference empty.
    pub strict_references: bool,
    /// Records being decoded on the path from the root entity to here.
    ancestors: Option<&'a Ancestor<'a>>,
}

/// One link of the decode path, kept on the stack of [`bind`].
struct Ancestor<'a> {
    key: &'a str,
    parent: Option<&'a Ancestor<'a>>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(store: &'a dyn KvStore, schemas: &'a SchemaCache) -> Self {
        Self {
            store,
            schemas,
            strict_references: false,
            ancestors: None,
        }
    }

    pub fn strict(mut self, strict_references: bool) -> Self {
        self.strict_references = strict_references;
        self
    }

    /// Whether the record at `key` is already being decoded further up the
    /// path.
    pub fn is_decoding(&self, key: &str) -> bool {
        let mut link = self.ancestors;
        while let Some(ancestor) = link {
            if ancestor.key == key {
                return true;
            }
            link = ancestor.parent;
        }
        false
    }
}

/// Read side of one entity being decoded.
pub struct FieldSource<'a> {
    cx: DecodeContext<'a>,
    prefix: &'a str,
    id: &'a str,
    record: &'a Record,
}

impl<'a> FieldSource<'a> {
    pub fn context(&self) -> DecodeContext<'a> {
        self.cx
    }

    pub fn id(&self) -> &str {
        self.id
    }

    /// Raw text stored under `name` in the entity's record.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.record.get(name).map(String::as_str)
    }

    /// Key of the separate collection holding field `name`.
    pub fn field_key(&self, name: &str) -> String {
        keys::field_key(self.prefix, self.id, name)
    }
}

/// Write side of one entity being encoded.
pub struct FieldSink<'a> {
    batch: &'a mut Batch,
    prefix: &'a str,
    id: &'a str,
}

impl<'a> FieldSink<'a> {
    pub fn new(batch: &'a mut Batch, prefix: &'a str, id: &'a str) -> Self {
        Self { batch, prefix, id }
    }

    /// Queue `HSET <prefix>:<id> <name> <value>`.
    pub fn write(&mut self, name: &str, value: impl Into<String>) {
        self.batch
            .hset(keys::record_key(self.prefix, self.id), name, value.into());
    }

    pub fn field_key(&self, name: &str) -> String {
        keys::field_key(self.prefix, self.id, name)
    }

    pub fn batch(&mut self) -> &mut Batch {
        &mut *self.batch
    }
}

/// Encode and decode one field of `T`.
pub(crate) trait FieldCodec<T>: Send + Sync {
    fn is_zero(&self, entity: &T) -> bool;

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()>;

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()>;
}

fn parse_error(field: &str, value: &str, reason: String) -> CodecError {
    CodecError::Parse {
        field: field.to_string(),
        value: value.to_string(),
        reason,
    }
}

pub(crate) struct ScalarField<T, F> {
    pub get: fn(&T) -> &F,
    pub get_mut: fn(&mut T) -> &mut F,
}

impl<T: 'static, F: Scalar> FieldCodec<T> for ScalarField<T, F> {
    fn is_zero(&self, entity: &T) -> bool {
        (self.get)(entity).is_zero()
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        if let Some(text) = (self.get)(entity).encode() {
            sink.write(name, text);
        }
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        // An absent hash field leaves the current value alone.
        let Some(raw) = source.raw(name) else {
            return Ok(());
        };
        *(self.get_mut)(entity) = F::decode(raw).map_err(|reason| parse_error(name, raw, reason))?;
        Ok(())
    }
}

pub(crate) struct ReferenceField<T, R> {
    pub get: fn(&T) -> &Option<Box<R>>,
    pub get_mut: fn(&mut T) -> &mut Option<Box<R>>,
}

impl<T: 'static, R: Entity> FieldCodec<T> for ReferenceField<T, R> {
    fn is_zero(&self, entity: &T) -> bool {
        (self.get)(entity).is_none()
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        match (self.get)(entity) {
            Some(target) => sink.write(name, referenced_id(&**target, name)?),
            None => sink.write(name, ""),
        }
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        let id = match source.raw(name) {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(()),
        };
        *(self.get_mut)(entity) = load_reference::<R>(source.context(), id)?.map(Box::new);
        Ok(())
    }
}

pub(crate) struct ReferencesField<T, R> {
    pub get: fn(&T) -> &Vec<R>,
    pub get_mut: fn(&mut T) -> &mut Vec<R>,
}

impl<T: 'static, R: Entity> FieldCodec<T> for ReferencesField<T, R> {
    fn is_zero(&self, entity: &T) -> bool {
        (self.get)(entity).is_empty()
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        let ids = (self.get)(entity)
            .iter()
            .map(|target| referenced_id(target, name).map(str::to_string))
            .collect::<CodecResult<Vec<_>>>()?;
        replace_list(sink, name, ids);
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        let cx = source.context();
        let ids = cx.store.lrange(&source.field_key(name))?;
        let mut targets = Vec::with_capacity(ids.len());
        for id in &ids {
            match load_reference::<R>(cx, id)? {
                Some(target) => targets.push(target),
                None => debug!(field = name, id = %id, "list member dropped"),
            }
        }
        *(self.get_mut)(entity) = targets;
        Ok(())
    }
}

pub(crate) struct StringsField<T> {
    pub get: fn(&T) -> &Vec<String>,
    pub get_mut: fn(&mut T) -> &mut Vec<String>,
}

impl<T: 'static> FieldCodec<T> for StringsField<T> {
    fn is_zero(&self, entity: &T) -> bool {
        (self.get)(entity).is_empty()
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        replace_list(sink, name, (self.get)(entity).iter().cloned());
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        *(self.get_mut)(entity) = source.context().store.lrange(&source.field_key(name))?;
        Ok(())
    }
}

pub(crate) struct MapField<T, C> {
    pub get: fn(&T) -> &C,
    pub get_mut: fn(&mut T) -> &mut C,
}

impl<T: 'static, C: MapContainer> FieldCodec<T> for MapField<T, C> {
    fn is_zero(&self, entity: &T) -> bool {
        (self.get)(entity).is_empty()
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        let key = sink.field_key(name);
        let batch = sink.batch();
        batch.del(key.clone());
        (self.get)(entity).range(&mut |k, v| {
            batch.hset(key.clone(), k, v);
            true
        });
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        let entries = source.context().store.hgetall(&source.field_key(name))?;
        let mut container = C::default();
        for (k, v) in entries {
            container.store(k, v);
        }
        container.setup();
        *(self.get_mut)(entity) = container;
        Ok(())
    }
}

pub(crate) struct SetField<T, C> {
    pub get: fn(&T) -> &C,
    pub get_mut: fn(&mut T) -> &mut C,
}

impl<T: 'static, C: SetContainer> FieldCodec<T> for SetField<T, C> {
    fn is_zero(&self, entity: &T) -> bool {
        (self.get)(entity).is_empty()
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        let key = sink.field_key(name);
        let batch = sink.batch();
        batch.del(key.clone());
        (self.get)(entity).range(&mut |member| {
            batch.sadd(key.clone(), member);
            true
        });
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        let members = source.context().store.smembers(&source.field_key(name))?;
        let mut container = C::default();
        for member in members {
            container.add(member);
        }
        container.setup();
        *(self.get_mut)(entity) = container;
        Ok(())
    }
}

pub(crate) struct ComputedField<T, B> {
    pub get_mut: fn(&mut T) -> &mut B,
}

impl<T: 'static, B: ComputedBool> FieldCodec<T> for ComputedField<T, B> {
    fn is_zero(&self, _entity: &T) -> bool {
        true
    }

    fn encode(&self, _entity: &T, _name: &str, _sink: &mut FieldSink<'_>) -> CodecResult<()> {
        Ok(())
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        let value = B::resolve(source.context().store, source.id(), name)?;
        (self.get_mut)(entity).set(value);
        Ok(())
    }
}

/// A field of an embedded composite `E`, reached through the parent `T`.
pub(crate) struct Projected<T, E> {
    pub get: fn(&T) -> &E,
    pub get_mut: fn(&mut T) -> &mut E,
    pub inner: Box<dyn FieldCodec<E>>,
}

impl<T: 'static, E: 'static> FieldCodec<T> for Projected<T, E> {
    fn is_zero(&self, entity: &T) -> bool {
        self.inner.is_zero((self.get)(entity))
    }

    fn encode(&self, entity: &T, name: &str, sink: &mut FieldSink<'_>) -> CodecResult<()> {
        self.inner.encode((self.get)(entity), name, sink)
    }

    fn decode(&self, entity: &mut T, name: &str, source: &FieldSource<'_>) -> CodecResult<()> {
        self.inner.decode((self.get_mut)(entity), name, source)
    }
}

fn referenced_id<'e, R: Entity>(target: &'e R, field: &str) -> CodecResult<&'e str> {
    let id = target.id();
    if id.is_empty() {
        return Err(CodecError::UnsavedReference {
            field: field.to_string(),
        });
    }
    Ok(id)
}

fn replace_list(sink: &mut FieldSink<'_>, name: &str, values: impl IntoIterator<Item = String>) {
    let key = sink.field_key(name);
    let batch = sink.batch();
    batch.del(key.clone());
    for value in values {
        batch.rpush(key.clone(), value);
    }
}

/// Populate `entity` from `record`, the hash stored at `<prefix>:<id>`.
///
/// Fields are decoded in schema order and the first failure aborts the bind.
/// The entity's ID is not touched; callers set it once the bind succeeds.
pub fn bind<T>(
    cx: DecodeContext<'_>,
    schema: &Schema<T>,
    prefix: &str,
    id: &str,
    record: &Record,
    entity: &mut T,
) -> CodecResult<()> {
    let key = keys::record_key(prefix, id);
    if record.is_empty() {
        return Err(CodecError::EmptyRecord { key });
    }

    let frame = Ancestor {
        key: &key,
        parent: cx.ancestors,
    };
    let source = FieldSource {
        cx: DecodeContext {
            ancestors: Some(&frame),
            ..cx
        },
        prefix,
        id,
        record,
    };
    for field in schema.fields() {
        field.codec().decode(entity, field.name(), &source)?;
    }
    Ok(())
}

/// Fetch and decode the entity of type `R` stored under `id`.
///
/// Returns `None` for a missing record, or for a record already being
/// decoded higher up the path (a cycle), unless the context is strict.
pub fn load_reference<R: Entity>(cx: DecodeContext<'_>, id: &str) -> CodecResult<Option<R>> {
    let prefix = keys::prefix::<R>();
    let key = keys::record_key(&prefix, id);
    if cx.is_decoding(&key) {
        if cx.strict_references {
            return Err(CodecError::ReferenceCycle { key });
        }
        debug!(key = %key, "reference cycle cut");
        return Ok(None);
    }
    let record = cx.store.hgetall(&key)?;
    if record.is_empty() {
        if cx.strict_references {
            return Err(CodecError::MissingReference { key });
        }
        debug!(key = %key, "dangling reference left empty");
        return Ok(None);
    }

    let schema = cx.schemas.get::<R>()?;
    let mut target = R::default();
    bind(cx, &schema, &prefix, id, &record, &mut target)?;
    target.base_mut().id = id.to_string();
    target.post_load();
    Ok(Some(target))
}

/// Which fields an encode pass writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodePolicy {
    /// Leave immutable fields out (every update).
    pub skip_immutable: bool,
    /// Write zero-valued fields instead of leaving the stored value alone.
    pub include_zero_values: bool,
}

impl EncodePolicy {
    pub fn create(include_zero_values: bool) -> Self {
        Self {
            skip_immutable: false,
            include_zero_values,
        }
    }

    pub fn update(include_zero_values: bool) -> Self {
        Self {
            skip_immutable: true,
            include_zero_values,
        }
    }
}

/// Queue the writes for every field of `entity` admitted by `policy`.
///
/// Computed fields are never written. Returns the number of fields encoded.
pub fn encode_fields<T>(
    schema: &Schema<T>,
    entity: &T,
    sink: &mut FieldSink<'_>,
    policy: EncodePolicy,
) -> CodecResult<usize> {
    let mut written = 0;
    for field in schema.fields() {
        if field.is_computed() {
            continue;
        }
        if policy.skip_immutable && field.modifier() == Modifier::Immutable {
            continue;
        }
        if !policy.include_zero_values && field.codec().is_zero(entity) {
            continue;
        }
        field.codec().encode(entity, field.name(), sink)?;
        written += 1;
    }
    Ok(written)
}
