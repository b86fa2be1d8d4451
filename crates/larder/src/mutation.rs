//! Create and update.
//!
//! Both operations queue their writes on a [`Batch`]. Unless the caller
//! supplies a batch of their own, it is committed in one round trip and the
//! entity is reloaded, so the caller's instance reflects what was stored.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use larder_model::{
    encode_fields, keys, EncodePolicy, Entity, FieldSink, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};
use larder_store::{Batch, StoreError};
use tracing::debug;
use uuid::Uuid;

use crate::context::Larder;
use crate::error::{LarderError, Result};

/// Options shared by creates and updates.
#[derive(Debug, Default)]
pub struct UpdateOptions<'a> {
    /// Publish an empty message on the entity's channel after the write.
    pub notify: bool,
    /// Write zero-valued fields instead of leaving the stored values alone.
    pub include_zero_values: bool,
    /// Queue onto this batch instead of committing. The caller commits and
    /// reloads.
    pub batch: Option<&'a mut Batch>,
}

/// Options for [`Larder::create_with`].
#[derive(Debug, Default)]
pub struct CreateOptions<'a> {
    /// Store under this ID instead of a random one.
    pub id: Option<String>,
    /// Write over an existing record instead of failing with `Conflict`.
    pub overwrite: bool,
    pub update: UpdateOptions<'a>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Create { overwrite: bool },
    Update,
}

impl Larder {
    /// Store `entity` under a fresh random ID and return the ID.
    pub fn create<T: Entity>(&self, entity: &mut T) -> Result<String> {
        self.create_with(entity, CreateOptions::default())
    }

    pub fn create_with<T: Entity>(
        &self,
        entity: &mut T,
        options: CreateOptions<'_>,
    ) -> Result<String> {
        let id = options.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.mutate(
            &id,
            entity,
            Mode::Create {
                overwrite: options.overwrite,
            },
            options.update,
        )?;
        Ok(id)
    }

    /// Write the non-zero, mutable fields of `entity` to the existing record
    /// `id`.
    pub fn update<T: Entity>(&self, id: &str, entity: &mut T) -> Result<()> {
        self.update_with(id, entity, UpdateOptions::default())
    }

    pub fn update_with<T: Entity>(
        &self,
        id: &str,
        entity: &mut T,
        options: UpdateOptions<'_>,
    ) -> Result<()> {
        self.mutate(id, entity, Mode::Update, options)
    }

    fn mutate<T: Entity>(
        &self,
        id: &str,
        entity: &mut T,
        mode: Mode,
        options: UpdateOptions<'_>,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(LarderError::InvalidTarget("ID must not be empty".into()));
        }

        let prefix = keys::prefix::<T>();
        let key = keys::record_key(&prefix, id);
        let schema = self.schema::<T>()?;

        let exists = self.store().exists(&key)?;
        match mode {
            Mode::Create { overwrite: false } if exists => {
                return Err(LarderError::Conflict { key });
            }
            Mode::Update if !exists => return Err(LarderError::NotFound { key }),
            _ => {}
        }

        let UpdateOptions {
            notify,
            include_zero_values,
            batch: external,
        } = options;
        let committing = external.is_none();
        let mut own = Batch::new();
        let batch = match external {
            Some(batch) => batch,
            None => &mut own,
        };

        // Re-checked by the store when the batch runs.
        match mode {
            Mode::Create { overwrite: false } => {
                batch.require_absent(key.clone());
            }
            Mode::Update => {
                batch.require_present(key.clone());
            }
            Mode::Create { overwrite: true } => {}
        }

        let policy = match mode {
            Mode::Create { .. } => EncodePolicy::create(include_zero_values),
            Mode::Update => EncodePolicy::update(include_zero_values),
        };
        let now = now_seconds();
        let stamp = now.timestamp().to_string();

        let mut sink = FieldSink::new(batch, &prefix, id);
        let written = encode_fields(&schema, entity, &mut sink, policy)?;
        sink.write(UPDATED_AT_FIELD, stamp.as_str());
        entity.base_mut().updated_at = now;

        if let Mode::Create { .. } = mode {
            sink.write(CREATED_AT_FIELD, stamp.as_str());
            let base = entity.base_mut();
            base.created_at = now;
            base.id = id.to_string();
            entity.post_store(sink.batch());
        }

        if notify {
            sink.batch()
                .publish(keys::channel(&prefix, id), Bytes::new());
        }

        debug!(key = %key, fields = written, mode = ?mode, notify, "mutation queued");
        if !committing {
            return Ok(());
        }

        self.store().exec(own).map_err(|err| match err {
            StoreError::PreconditionFailed { .. } => match mode {
                Mode::Update => LarderError::NotFound { key: key.clone() },
                Mode::Create { .. } => LarderError::Conflict { key: key.clone() },
            },
            other => LarderError::Transport(other),
        })?;

        self.load_into(id, entity)
    }
}

/// The current time truncated to whole seconds, the precision stored.
fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}
