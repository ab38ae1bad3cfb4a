//! Operations against one bucket
//!
//! Every operation accepts its own set of status codes and fails with
//! [`ClientError::Protocol`] for anything else:
//!
//! | Operation      | 200          | 201        | 204          | 300             | 404         |
//! |----------------|--------------|------------|--------------|-----------------|-------------|
//! | get / index    | `Some(body)` |            |              | MultipleChoices | `None`      |
//! | save           | `Stored`     | `Created`  | `Stored`     | MultipleChoices |             |
//! | delete         |              |            | `true`       |                 | `false`     |
//! | all_keys       | keys (JSON)  |            |              |                 |             |

use crate::{
    ClientError, Connection, Result,
    headers::SaveOptions,
    index::IndexValue,
    merge::{resolve_records, MergeStrategy},
    stream::{KeyStream, KeyStreamHandle},
    types::*,
};
use bytes::Bytes;
use reqwest::{header, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

const GET: &str = "Get";
const SAVE: &str = "Save";
const DELETE: &str = "Delete";
const LIST_KEYS: &str = "List Keys";
const INDEX_LOOKUP: &str = "Index Lookup";
const INDEX_QUERY: &str = "Index Query";

/// Map phase that hands every matched object back unchanged
const IDENTITY_MAP: &str = "function(value) { return [value]; }";

/// A named bucket on a [`Connection`]
#[derive(Clone, Debug)]
pub struct Bucket {
    connection: Connection,
    name: String,
}

impl Bucket {
    pub(crate) fn new(connection: Connection, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
        }
    }

    /// Bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection this bucket issues requests through
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn keys_path(&self) -> String {
        format!("/buckets/{}/keys", urlencoding::encode(&self.name))
    }

    fn key_path(&self, key: &str) -> String {
        format!("{}/{}", self.keys_path(), urlencoding::encode(key))
    }

    fn index_path(&self, name: &str, value: &IndexValue) -> String {
        format!(
            "/buckets/{}/index/{}/{}",
            urlencoding::encode(&self.name),
            urlencoding::encode(&value.index_name(name)),
            urlencoding::encode(&value.to_string())
        )
    }

    fn read_request(&self, request: RequestDescriptor, options: &ReadOptions) -> RequestDescriptor {
        let request = request.query_args(&options.query);
        if options.accept_siblings {
            request.header(header::ACCEPT.as_str(), SIBLINGS_ACCEPT)
        } else {
            request
        }
    }

    // ==================== Reads ====================

    /// Fetch the raw value stored under `key`. A missing key yields `data: None`.
    #[instrument(skip(self, options), fields(bucket = %self.name))]
    pub async fn get(&self, key: &str, options: &ReadOptions) -> Result<Fetched<Bytes>> {
        let request = self.read_request(RequestDescriptor::get(self.key_path(key)), options);
        interpret_get(GET, self.connection.issue(request).await?)
    }

    /// Fetch and decode a JSON value
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        options: &ReadOptions,
    ) -> Result<Fetched<T>> {
        self.get(key, options)
            .await?
            .try_map(|body| serde_json::from_slice(&body).map_err(ClientError::from))
    }

    /// Keys whose index `name` holds exactly `value`
    #[instrument(skip(self, value, options), fields(bucket = %self.name))]
    pub async fn keys_from_index(
        &self,
        name: &str,
        value: impl Into<IndexValue>,
        options: &ReadOptions,
    ) -> Result<Fetched<Vec<String>>> {
        let value = value.into();
        let request = self.read_request(RequestDescriptor::get(self.index_path(name, &value)), options);
        interpret_get(INDEX_LOOKUP, self.connection.issue(request).await?)?.try_map(|body| {
            let list: KeyList = serde_json::from_slice(&body)?;
            Ok(list.keys)
        })
    }

    /// Objects whose index `name` holds exactly `value`, fetched with a
    /// map/reduce query so that every stored version comes back.
    ///
    /// A record with a single value is decoded as JSON; a record with
    /// siblings is handed to `strategy` and its result is used as is.
    #[instrument(skip(self, value, options, strategy), fields(bucket = %self.name))]
    pub async fn objects_from_index<T, M>(
        &self,
        name: &str,
        value: impl Into<IndexValue>,
        options: &ReadOptions,
        strategy: &M,
    ) -> Result<Fetched<Vec<T>>>
    where
        T: DeserializeOwned,
        M: MergeStrategy<T> + ?Sized,
    {
        let query = index_query(&self.name, name, &value.into());
        let request = RequestDescriptor::new(Method::POST, "/mapred")
            .header(header::CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE)
            .body(serde_json::to_vec(&query)?);
        let request = self.read_request(request, options);

        interpret_get(INDEX_QUERY, self.connection.issue(request).await?)?
            .try_map(|body| resolve_records(&body, strategy))
    }

    // ==================== Writes ====================

    /// Store `payload` under `key`, or under a store-assigned key when `key` is `None`.
    ///
    /// JSON payloads are sent as `application/json`; raw bytes go out as given,
    /// with whatever `Content-Type` the options carry.
    #[instrument(skip(self, payload, options, query), fields(bucket = %self.name))]
    pub async fn save(
        &self,
        key: Option<&str>,
        payload: impl Into<Payload>,
        options: &SaveOptions,
        query: &[(String, String)],
    ) -> Result<SaveResult> {
        let mut request = match key {
            Some(key) => RequestDescriptor::new(Method::PUT, self.key_path(key)),
            None => RequestDescriptor::new(Method::POST, self.keys_path()),
        }
        .query_args(query);

        let extra = options.to_headers();
        let (content_type, body) = payload.into().into_body()?;
        if let Some(content_type) = content_type {
            let overridden = extra
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()));
            if !overridden {
                request = request.header(header::CONTENT_TYPE.as_str(), content_type);
            }
        }
        let request = request.headers(extra).body(body);

        interpret_save(self.connection.issue(request).await?)
    }

    /// Serialize `value` as JSON and store it
    pub async fn save_json<T: Serialize + ?Sized>(
        &self,
        key: Option<&str>,
        value: &T,
        options: &SaveOptions,
    ) -> Result<SaveResult> {
        self.save(key, Payload::json(value)?, options, &[]).await
    }

    /// Delete `key`. Returns `false` when it was already absent.
    #[instrument(skip(self, query), fields(bucket = %self.name))]
    pub async fn delete(&self, key: &str, query: &[(String, String)]) -> Result<bool> {
        let request = RequestDescriptor::new(Method::DELETE, self.key_path(key)).query_args(query);
        interpret_delete(self.connection.issue(request).await?)
    }

    // ==================== Key listing ====================

    /// All keys of the bucket in one response. Expensive on large buckets;
    /// prefer [`Bucket::stream_keys`] there.
    #[instrument(skip(self), fields(bucket = %self.name))]
    pub async fn all_keys(&self) -> Result<Vec<String>> {
        let request = RequestDescriptor::get(self.keys_path()).query("keys", "true");
        interpret_key_list(self.connection.issue(request).await?)
    }

    /// All keys of the bucket, pushed batch by batch as the store streams them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream_keys(&self) -> KeyStream {
        let request = RequestDescriptor::get(self.keys_path()).query("keys", "stream");
        KeyStream::spawn(self.connection.clone(), request)
    }

    /// Callback form of [`Bucket::stream_keys`]: `on_data` receives every
    /// non-empty batch, then `on_end` runs exactly once with the failure, if any.
    pub fn stream_keys_with<D, E>(&self, on_data: D, on_end: E) -> KeyStreamHandle
    where
        D: FnMut(Vec<String>) + Send + 'static,
        E: FnOnce(Option<ClientError>) + Send + 'static,
    {
        KeyStreamHandle::spawn(self.stream_keys(), on_data, on_end)
    }
}

// ==================== Response interpretation ====================

fn interpret_get(operation: &'static str, outcome: Outcome) -> Result<Fetched<Bytes>> {
    match outcome.meta.status {
        200 => Ok(Fetched {
            meta: outcome.meta,
            data: Some(outcome.body),
        }),
        300 => Err(ClientError::MultipleChoices { operation }),
        404 => Ok(Fetched {
            meta: outcome.meta,
            data: None,
        }),
        status => {
            warn!("HTTP {} returned unexpected status {}", operation, status);
            Err(ClientError::protocol(operation, status))
        }
    }
}

fn interpret_save(outcome: Outcome) -> Result<SaveResult> {
    match outcome.meta.status {
        200 | 204 => Ok(SaveResult::Stored { body: outcome.body }),
        201 => outcome
            .meta
            .location()
            .map(|location| SaveResult::Created {
                location: location.to_string(),
            })
            .ok_or_else(|| ClientError::InvalidResponse("201 Created without Location".to_string())),
        300 => Err(ClientError::MultipleChoices { operation: SAVE }),
        status => {
            warn!("HTTP {} returned unexpected status {}", SAVE, status);
            Err(ClientError::protocol(SAVE, status))
        }
    }
}

fn interpret_delete(outcome: Outcome) -> Result<bool> {
    match outcome.meta.status {
        204 => Ok(true),
        404 => Ok(false),
        status => {
            warn!("HTTP {} returned unexpected status {}", DELETE, status);
            Err(ClientError::protocol(DELETE, status))
        }
    }
}

fn interpret_key_list(outcome: Outcome) -> Result<Vec<String>> {
    if outcome.meta.status == 200 && outcome.meta.is_json() {
        let list: KeyList = serde_json::from_slice(&outcome.body)?;
        Ok(list.keys)
    } else {
        warn!(
            "HTTP {} returned status {} ({:?})",
            LIST_KEYS,
            outcome.meta.status,
            outcome.meta.content_type()
        );
        Err(ClientError::protocol(LIST_KEYS, outcome.meta.status))
    }
}

fn index_query(bucket: &str, name: &str, value: &IndexValue) -> serde_json::Value {
    json!({
        "inputs": {
            "bucket": bucket,
            "index": value.index_name(name),
            "key": value.to_string(),
        },
        "query": [
            { "map": { "language": "javascript", "source": IDENTITY_MAP, "keep": true } }
        ]
    })
}
