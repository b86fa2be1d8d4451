use chrono::{DateTime, Utc};
use larder_store::Batch;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaBuilder;

/// Store name of the creation timestamp every entity carries.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Store name of the last-modified timestamp every entity carries.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A type whose fields can be described to the codec.
///
/// Plain composites are embedded into entities and flattened into the
/// entity's field list; entities additionally implement [`Entity`].
pub trait Composite: Default + Send + Sync + 'static {
    /// Register this type's fields, in order.
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self>;
}

/// A uniquely identified composite persisted as a hash record.
///
/// ```ignore
/// #[derive(Default)]
/// struct Item {
///     base: Base,
///     name: String,
/// }
///
/// impl Composite for Item {
///     fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
///         schema.base().scalar("name", |i| &i.name, |i| &mut i.name)
///     }
/// }
///
/// impl Entity for Item {
///     const TYPE_NAME: &'static str = "Item";
///     fn base(&self) -> &Base { &self.base }
///     fn base_mut(&mut self) -> &mut Base { &mut self.base }
/// }
/// ```
pub trait Entity: Composite {
    /// Type name; its lowercased form prefixes every key of this type.
    const TYPE_NAME: &'static str;

    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    fn id(&self) -> &str {
        &self.base().id
    }

    /// Called after the entity has been loaded and its ID set.
    fn post_load(&mut self) {}

    /// Called on create, after every write for this entity has been queued.
    /// Commands added to `batch` are committed together with the entity.
    fn post_store(&self, _batch: &mut Batch) {}
}

/// Fields every entity carries. They are maintained by the mutation engine
/// and should not be set by hand.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    /// When the entity was created.
    pub created_at: DateTime<Utc>,
    /// When the entity was last written.
    pub updated_at: DateTime<Utc>,
    /// The entity's ID. Not stored in the record; it is part of the key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl Composite for Base {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .scalar(
                "createdAt,immutable",
                |b| &b.created_at,
                |b| &mut b.created_at,
            )
            .scalar(
                "updatedAt,immutable",
                |b| &b.updated_at,
                |b| &mut b.updated_at,
            )
            .scalar("-", |b| &b.id, |b| &mut b.id)
    }
}

/// Key layout helpers.
pub mod keys {
    use super::Entity;

    /// The lowercased type name used as the first segment of every key.
    pub fn prefix<T: Entity>() -> String {
        T::TYPE_NAME.to_lowercase()
    }

    /// `<prefix>:<id>`, the entity's hash record.
    pub fn record_key(prefix: &str, id: &str) -> String {
        format!("{prefix}:{id}")
    }

    /// `<prefix>:<id>:<field>`, a container or sequence field of the entity.
    pub fn field_key(prefix: &str, id: &str, field: &str) -> String {
        format!("{prefix}:{id}:{field}")
    }

    /// `<prefix>:<id>`, the entity's notification channel.
    pub fn channel(prefix: &str, id: &str) -> String {
        record_key(prefix, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct LoadTestModel {
        base: Base,
    }

    impl Composite for LoadTestModel {
        fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
            schema.base()
        }
    }

    impl Entity for LoadTestModel {
        const TYPE_NAME: &'static str = "LoadTestModel";

        fn base(&self) -> &Base {
            &self.base
        }

        fn base_mut(&mut self) -> &mut Base {
            &mut self.base
        }
    }

    #[test]
    fn key_layout() {
        let prefix = keys::prefix::<LoadTestModel>();
        assert_eq!(prefix, "loadtestmodel");
        assert_eq!(keys::record_key(&prefix, "42"), "loadtestmodel:42");
        assert_eq!(keys::field_key(&prefix, "42", "mapVal"), "loadtestmodel:42:mapVal");
        assert_eq!(keys::channel(&prefix, "42"), "loadtestmodel:42");
    }

    #[test]
    fn base_json_uses_camel_case_and_omits_empty_id() {
        let json = serde_json::to_value(Base::default()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("id").is_none());

        let mut model = LoadTestModel::default();
        model.base_mut().id = "abc".into();
        assert_eq!(model.id(), "abc");
    }
}
