use larder_model::{bind, keys, Entity};
use larder_store::Record;
use tracing::debug;

use crate::context::Larder;
use crate::error::{LarderError, Result};

impl Larder {
    /// Load the entity stored under `id`.
    pub fn load<T: Entity>(&self, id: &str) -> Result<T> {
        let mut entity = T::default();
        self.load_into(id, &mut entity)?;
        Ok(entity)
    }

    /// Load the entity stored under `id` into an existing instance. Fields
    /// absent from the record keep their current values.
    pub fn load_into<T: Entity>(&self, id: &str, entity: &mut T) -> Result<()> {
        if id.is_empty() {
            return Err(LarderError::InvalidTarget("ID must not be empty".into()));
        }
        let prefix = keys::prefix::<T>();
        let record = self.store().hgetall(&keys::record_key(&prefix, id))?;
        self.bind_record(&prefix, id, &record, entity)
    }

    /// Load several entities of one type, fetching their records in a single
    /// pipelined read. Fails on the first missing or malformed record.
    pub fn load_all<T: Entity, S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<T>> {
        if ids.iter().any(|id| id.as_ref().is_empty()) {
            return Err(LarderError::InvalidTarget("ID must not be empty".into()));
        }
        let prefix = keys::prefix::<T>();
        let record_keys: Vec<String> = ids
            .iter()
            .map(|id| keys::record_key(&prefix, id.as_ref()))
            .collect();
        let records = self.store().hgetall_batch(&record_keys)?;
        debug!(prefix = %prefix, count = records.len(), "records fetched");

        let mut entities = Vec::with_capacity(ids.len());
        for (id, record) in ids.iter().zip(&records) {
            let mut entity = T::default();
            self.bind_record(&prefix, id.as_ref(), record, &mut entity)?;
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Whether a record is stored under `id`.
    pub fn exists<T: Entity>(&self, id: &str) -> Result<bool> {
        let key = keys::record_key(&keys::prefix::<T>(), id);
        Ok(self.store().exists(&key)?)
    }

    fn bind_record<T: Entity>(
        &self,
        prefix: &str,
        id: &str,
        record: &Record,
        entity: &mut T,
    ) -> Result<()> {
        let schema = self.schema::<T>()?;
        bind(self.decode_context(), &schema, prefix, id, record, entity)?;
        entity.base_mut().id = id.to_string();
        entity.post_load();
        Ok(())
    }
}
