//! Map- and Set-shaped fields backed by the store's native hash and set
//! primitives.
//!
//! A container field is persisted under its own key
//! (`<prefix>:<id>:<field>`) and fully rewritten on every write. Custom
//! containers implement [`MapContainer`] or [`SetContainer`] and may override
//! `setup`, which runs once after the container has been populated from the
//! store and before it is placed into the entity.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Contract for fields stored as a hash of string pairs.
pub trait MapContainer: Default + Send + Sync + 'static {
    /// Insert or replace one entry.
    fn store(&mut self, key: String, value: String);

    /// Visit every entry until `f` returns `false`.
    fn range(&self, f: &mut dyn FnMut(&str, &str) -> bool);

    /// Called once after loading, with every stored entry inserted.
    fn setup(&mut self) {}

    fn is_empty(&self) -> bool {
        let mut empty = true;
        self.range(&mut |_, _| {
            empty = false;
            false
        });
        empty
    }
}

/// Contract for fields stored as a set of strings.
pub trait SetContainer: Default + Send + Sync + 'static {
    /// Insert one member.
    fn add(&mut self, member: String);

    /// Visit every member until `f` returns `false`.
    fn range(&self, f: &mut dyn FnMut(&str) -> bool);

    /// Called once after loading, with every stored member inserted.
    fn setup(&mut self) {}

    fn is_empty(&self) -> bool {
        let mut empty = true;
        self.range(&mut |_| {
            empty = false;
            false
        });
        empty
    }
}

/// A string-to-string map field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Map {
    entries: BTreeMap<String, String>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl MapContainer for Map {
    fn store(&mut self, key: String, value: String) {
        self.entries.insert(key, value);
    }

    fn range(&self, f: &mut dyn FnMut(&str, &str) -> bool) {
        for (k, v) in &self.entries {
            if !f(k, v) {
                break;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A set-of-strings field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Set {
    members: BTreeSet<String>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `member`; returns `false` if it was already present.
    pub fn add(&mut self, member: impl Into<String>) -> bool {
        self.members.insert(member.into())
    }

    pub fn remove(&mut self, member: &str) -> bool {
        self.members.remove(member)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// Number of members.
    pub fn cardinality(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Set {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl SetContainer for Set {
    fn add(&mut self, member: String) {
        self.members.insert(member);
    }

    fn range(&self, f: &mut dyn FnMut(&str) -> bool) {
        for m in &self.members {
            if !f(m) {
                break;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
