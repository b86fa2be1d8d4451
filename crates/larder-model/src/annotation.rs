//! Field annotations: how a field is named in the store and whether it is
//! written on updates.
//!
//! The grammar is deliberately small:
//!
//! - `name` -- store the field under `name`
//! - `name,immutable` -- store under `name`, write only when the entity is
//!   created
//! - `-` -- never persist the field
//! - empty -- derive the store name from the field identifier

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// How a field participates in mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    /// Written on create and on every update.
    None,
    /// Written on create only.
    Immutable,
    /// Never written or read.
    Skip,
}

/// A field identifier together with its (possibly empty) annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    ident: Option<String>,
    tag: String,
}

impl FieldSpec {
    /// An unannotated field: the store name is derived from `ident`.
    pub fn ident(ident: impl Into<String>) -> Self {
        Self {
            ident: Some(ident.into()),
            tag: String::new(),
        }
    }

    /// A field with both an identifier and an annotation.
    pub fn tagged(ident: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            ident: Some(ident.into()),
            tag: tag.into(),
        }
    }

    /// Resolve into a store name and modifier.
    pub fn resolve(&self) -> CodecResult<Annotation> {
        Annotation::parse(self.ident.as_deref(), &self.tag)
    }
}

impl From<&str> for FieldSpec {
    /// A bare annotation such as `"name"`, `"name,immutable"`, or `"-"`.
    fn from(tag: &str) -> Self {
        Self {
            ident: None,
            tag: tag.to_string(),
        }
    }
}

impl From<(&str, &str)> for FieldSpec {
    /// `(identifier, annotation)`.
    fn from((ident, tag): (&str, &str)) -> Self {
        Self::tagged(ident, tag)
    }
}

/// A parsed field annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    /// Store field name. Empty only for skipped fields.
    pub name: String,
    pub modifier: Modifier,
}

impl Annotation {
    /// Parse `tag`, falling back to `ident` for the name when the tag has none.
    pub fn parse(ident: Option<&str>, tag: &str) -> CodecResult<Self> {
        let tag = tag.trim();
        if tag == "-" {
            return Ok(Self {
                name: String::new(),
                modifier: Modifier::Skip,
            });
        }

        let (name, modifier) = match tag.split_once(',') {
            None => (tag, Modifier::None),
            Some((name, modifier)) if modifier.trim() == "immutable" => {
                (name.trim(), Modifier::Immutable)
            }
            Some(_) => {
                return Err(CodecError::InvalidAnnotation {
                    annotation: tag.to_string(),
                })
            }
        };

        let name = match (name, ident) {
            ("", Some(ident)) if !ident.is_empty() => derive_store_name(ident),
            ("", _) => {
                return Err(CodecError::InvalidAnnotation {
                    annotation: tag.to_string(),
                })
            }
            (name, _) => name.to_string(),
        };

        Ok(Self { name, modifier })
    }

    pub fn is_skipped(&self) -> bool {
        self.modifier == Modifier::Skip
    }
}

/// Derive a store name from a field identifier by lower-casing its first
/// character: `StringVal` becomes `stringVal`, `ID` becomes `iD`.
pub fn derive_store_name(ident: &str) -> String {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
