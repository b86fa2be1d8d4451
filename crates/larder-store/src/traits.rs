use std::collections::HashMap;

use bytes::Bytes;

use crate::command::Batch;
use crate::error::StoreResult;
use crate::pubsub::Subscription;

/// The contents of one hash, field name to value.
pub type Record = HashMap<String, String>;

/// The key-value server Larder maps entities onto.
///
/// All implementations must satisfy these invariants:
/// - Reads of a missing key return an empty collection (or `None` for
///   `zrank`), never an error.
/// - `exec` sends the whole batch in one round trip and applies commands in
///   queue order. Guards are checked atomically with the writes; a backend
///   that cannot honour guards must document that its creates are racy.
/// - Pattern subscriptions deliver messages in publish order.
pub trait KvStore: Send + Sync {
    /// Read every field of the hash at `key`.
    fn hgetall(&self, key: &str) -> StoreResult<Record>;

    /// Read the whole list at `key`, head to tail.
    fn lrange(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Read every member of the set at `key`, in no particular order.
    fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Rank of `member` in the sorted set at `key`, lowest score first.
    fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<usize>>;

    /// Check whether `key` holds any value.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Execute a batch as a single round trip.
    fn exec(&self, batch: Batch) -> StoreResult<()>;

    /// Open a subscription to every channel matching `pattern`.
    fn psubscribe(&self, pattern: &str) -> StoreResult<Subscription>;

    /// Read several hashes at once.
    ///
    /// Default implementation calls `hgetall()` for each key. Backends may
    /// override to pipeline the reads into one round trip.
    fn hgetall_batch(&self, keys: &[String]) -> StoreResult<Vec<Record>> {
        keys.iter().map(|key| self.hgetall(key)).collect()
    }

    /// Publish `payload` on `channel` outside of any batch.
    fn publish(&self, channel: &str, payload: Bytes) -> StoreResult<()> {
        let mut batch = Batch::new();
        batch.publish(channel, payload);
        self.exec(batch)
    }
}
