//! Bucket enumeration

use crate::{
    ClientError, Connection, Result,
    types::{BucketList, Outcome, RequestDescriptor},
};
use tracing::{instrument, warn};

const LIST_BUCKETS: &str = "List Buckets";

/// Store-wide bucket listing
#[derive(Clone, Debug)]
pub struct BucketCollection {
    connection: Connection,
}

impl BucketCollection {
    pub(crate) fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Names of all buckets holding at least one key
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<String>> {
        let request = RequestDescriptor::get("/buckets").query("buckets", "true");
        interpret_bucket_list(self.connection.issue(request).await?)
    }
}

fn interpret_bucket_list(outcome: Outcome) -> Result<Vec<String>> {
    if outcome.meta.status == 200 && outcome.meta.is_json() {
        let list: BucketList = serde_json::from_slice(&outcome.body)?;
        Ok(list.buckets)
    } else {
        warn!(
            "HTTP {} returned status {} ({:?})",
            LIST_BUCKETS,
            outcome.meta.status,
            outcome.meta.content_type()
        );
        Err(ClientError::protocol(LIST_BUCKETS, outcome.meta.status))
    }
}
