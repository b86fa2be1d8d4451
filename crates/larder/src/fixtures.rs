//! Entity types shared by the test modules.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use larder_model::{
    scalar_newtype, Base, Composite, Entity, FieldKind, FieldSpec, Map, MapContainer, Scalar,
    SchemaBuilder, Set, SetContainer, ZContains,
};
use larder_store::{Batch, InMemoryKvStore};

use crate::Larder;

pub fn larder() -> (Arc<InMemoryKvStore>, Larder) {
    let store = Arc::new(InMemoryKvStore::new());
    let larder = Larder::new(store.clone());
    (store, larder)
}

macro_rules! entity {
    ($ty:ident, $name:literal) => {
        impl Entity for $ty {
            const TYPE_NAME: &'static str = $name;

            fn base(&self) -> &Base {
                &self.base
            }

            fn base_mut(&mut self) -> &mut Base {
                &mut self.base
            }
        }
    };
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringAlias(pub String);

scalar_newtype!(StringAlias(String));

/// One field of every scalar and container kind, names derived from the
/// identifiers.
#[derive(Debug, Default)]
pub struct LoadTestModel {
    pub base: Base,
    pub string_val: String,
    pub int_val: i64,
    pub uint16_val: u16,
    pub bool_val: bool,
    pub float32_val: f32,
    pub float64_val: f64,
    pub string_alias_val: StringAlias,
    pub nullable_val: Option<i32>,
    pub map_val: Map,
    pub set_val: Set,
}

impl Composite for LoadTestModel {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar(FieldSpec::ident("StringVal"), |m| &m.string_val, |m| &mut m.string_val)
            .scalar(FieldSpec::ident("IntVal"), |m| &m.int_val, |m| &mut m.int_val)
            .scalar(FieldSpec::ident("UInt16Val"), |m| &m.uint16_val, |m| &mut m.uint16_val)
            .scalar(FieldSpec::ident("BoolVal"), |m| &m.bool_val, |m| &mut m.bool_val)
            .scalar(FieldSpec::ident("Float32Val"), |m| &m.float32_val, |m| &mut m.float32_val)
            .scalar(FieldSpec::ident("Float64Val"), |m| &m.float64_val, |m| &mut m.float64_val)
            .scalar(
                FieldSpec::ident("StringAliasVal"),
                |m| &m.string_alias_val,
                |m| &mut m.string_alias_val,
            )
            .scalar(FieldSpec::ident("NullableVal"), |m| &m.nullable_val, |m| &mut m.nullable_val)
            .map(FieldSpec::ident("MapVal"), |m| &m.map_val, |m| &mut m.map_val)
            .set(FieldSpec::ident("SetVal"), |m| &m.set_val, |m| &mut m.set_val)
    }
}

entity!(LoadTestModel, "LoadTestModel");

#[derive(Debug, Default)]
pub struct UpdateTestModel {
    pub base: Base,
    pub string_val: String,
    pub time_val: DateTime<Utc>,
    pub lines: Vec<String>,
}

impl Composite for UpdateTestModel {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar(FieldSpec::ident("StringVal"), |m| &m.string_val, |m| &mut m.string_val)
            .scalar(FieldSpec::ident("TimeVal"), |m| &m.time_val, |m| &mut m.time_val)
            .strings("lines", |m| &m.lines, |m| &mut m.lines)
    }
}

entity!(UpdateTestModel, "UpdateTestModel");

#[derive(Clone, Debug, Default)]
pub struct Producer {
    pub base: Base,
    pub name: String,
    pub loaded: bool,
}

impl Composite for Producer {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar("name", |p| &p.name, |p| &mut p.name)
            .scalar("-", |p| &p.loaded, |p| &mut p.loaded)
    }
}

impl Entity for Producer {
    const TYPE_NAME: &'static str = "Producer";

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn post_load(&mut self) {
        self.loaded = true;
    }

    fn post_store(&self, batch: &mut Batch) {
        batch.sadd("producer:all", self.id());
    }
}

#[derive(Debug, Default)]
pub struct Product {
    pub base: Base,
    pub producer: Option<Box<Producer>>,
}

impl Composite for Product {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .reference("ref", |p| &p.producer, |p| &mut p.producer)
    }
}

entity!(Product, "Product");

#[derive(Debug, Default)]
pub struct Catalog {
    pub base: Base,
    pub producers: Vec<Producer>,
}

impl Composite for Catalog {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .references("arrRef", |c| &c.producers, |c| &mut c.producers)
    }
}

entity!(Catalog, "Catalog");

#[derive(Debug, Default)]
pub struct ZContainsTestModel {
    pub base: Base,
    pub name: String,
    pub is_member: ZContains,
}

impl Composite for ZContainsTestModel {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar("name", |m| &m.name, |m| &mut m.name)
            .computed("sortedSetTest", |m| &mut m.is_member)
    }
}

entity!(ZContainsTestModel, "ZContainsTestModel");

#[derive(Debug, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
}

impl Composite for Address {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .scalar("street", |a| &a.street, |a| &mut a.street)
            .scalar("city", |a| &a.city, |a| &mut a.city)
    }
}

#[derive(Debug, Default)]
pub struct Customer {
    pub base: Base,
    pub name: String,
    pub address: Address,
}

impl Composite for Customer {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar("name", |c| &c.name, |c| &mut c.name)
            .embed(|c| &c.address, |c| &mut c.address)
    }
}

entity!(Customer, "Customer");

/// A scalar claiming a container kind, which the schema builder rejects.
#[derive(Debug, Default)]
pub struct Weird;

impl Scalar for Weird {
    const KIND: FieldKind = FieldKind::SetContainer;

    fn encode(&self) -> Option<String> {
        None
    }

    fn decode(_raw: &str) -> Result<Self, String> {
        Ok(Weird)
    }

    fn is_zero(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct Unsupported {
    pub base: Base,
    pub weird: Weird,
}

impl Composite for Unsupported {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema.base().scalar("weird", |u| &u.weird, |u| &mut u.weird)
    }
}

entity!(Unsupported, "Unsupported");

/// A linked entity that may point back at itself or at an ancestor.
#[derive(Clone, Debug, Default)]
pub struct Node {
    pub base: Base,
    pub name: String,
    pub next: Option<Box<Node>>,
}

impl Composite for Node {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar("name", |n| &n.name, |n| &mut n.name)
            .reference("next", |n| &n.next, |n| &mut n.next)
    }
}

entity!(Node, "Node");

#[derive(Debug, Default)]
pub struct Listing {
    pub base: Base,
    pub sku: String,
    pub title: String,
}

impl Composite for Listing {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .scalar("sku,immutable", |l| &l.sku, |l| &mut l.sku)
            .scalar("title", |l| &l.title, |l| &mut l.title)
    }
}

entity!(Listing, "Listing");

/// Set container that sorts its members and counts `setup` calls.
#[derive(Debug, Default)]
pub struct TallySet {
    pub members: Vec<String>,
    pub setups: usize,
}

impl SetContainer for TallySet {
    fn add(&mut self, member: String) {
        self.members.push(member);
    }

    fn range(&self, f: &mut dyn FnMut(&str) -> bool) {
        for member in &self.members {
            if !f(member) {
                break;
            }
        }
    }

    fn setup(&mut self) {
        self.members.sort();
        self.setups += 1;
    }
}

#[derive(Debug, Default)]
pub struct TallyMap {
    pub entries: BTreeMap<String, String>,
    pub setups: usize,
}

impl MapContainer for TallyMap {
    fn store(&mut self, key: String, value: String) {
        self.entries.insert(key, value);
    }

    fn range(&self, f: &mut dyn FnMut(&str, &str) -> bool) {
        for (key, value) in &self.entries {
            if !f(key, value) {
                break;
            }
        }
    }

    fn setup(&mut self) {
        self.setups += 1;
    }
}

#[derive(Debug, Default)]
pub struct Tallied {
    pub base: Base,
    pub tags: TallySet,
    pub attrs: TallyMap,
}

impl Composite for Tallied {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .base()
            .set("tags", |t| &t.tags, |t| &mut t.tags)
            .map("attrs", |t| &t.attrs, |t| &mut t.attrs)
    }
}

entity!(Tallied, "Tallied");
