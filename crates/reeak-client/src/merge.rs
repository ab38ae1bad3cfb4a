//! Sibling resolution for index queries

use crate::{
    ClientError, Result,
    types::SiblingRecord,
};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Caller-supplied resolution of concurrent values stored under one key.
///
/// Only called for records carrying more than one value. Closures of the form
/// `Fn(&SiblingRecord) -> T` implement it directly.
pub trait MergeStrategy<T> {
    /// Collapse all values of `record` into one
    fn merge(&self, record: &SiblingRecord) -> T;
}

impl<T, F> MergeStrategy<T> for F
where
    F: Fn(&SiblingRecord) -> T,
{
    fn merge(&self, record: &SiblingRecord) -> T {
        self(record)
    }
}

/// Decode a map/reduce result body into one value per record, in server order.
pub(crate) fn resolve_records<T, M>(body: &[u8], strategy: &M) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    M: MergeStrategy<T> + ?Sized,
{
    let records: Vec<SiblingRecord> = serde_json::from_slice(body)?;
    records
        .iter()
        .map(|record| match record.values.as_slice() {
            [] => Err(ClientError::InvalidResponse(format!(
                "no values returned for {}/{}",
                record.bucket, record.key
            ))),
            [value] => value.decode(),
            values => {
                debug!(
                    bucket = %record.bucket,
                    key = %record.key,
                    siblings = values.len(),
                    "Resolving siblings"
                );
                Ok(strategy.merge(record))
            }
        })
        .collect()
}
