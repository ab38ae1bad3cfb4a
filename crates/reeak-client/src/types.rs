//! Common types for the client SDK

use crate::{ClientError, Result};
use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Media type the store uses for JSON bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Accept header sent when the caller is prepared to resolve siblings
pub const SIBLINGS_ACCEPT: &str = "multipart/mixed;q=0.9,application/json";

/// Vector clock header
pub const VCLOCK_HEADER: &str = "X-Riak-Vclock";

/// Prefix of user metadata headers
pub const META_HEADER_PREFIX: &str = "X-Riak-Meta-";

/// Prefix of secondary index headers
pub const INDEX_HEADER_PREFIX: &str = "X-Riak-Index-";

/// A request relative to the connection's URL prefix. Built fresh for every call.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Path below the namespace, starting with `/`
    pub path: String,
    /// Headers in the order they are sent
    pub headers: Vec<(String, String)>,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn query_args(mut self, args: &[(String, String)]) -> Self {
        self.query.extend(args.iter().cloned());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Status line and headers of a store response
#[derive(Clone, Debug)]
pub struct ResponseMeta {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
}

impl ResponseMeta {
    fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw Content-Type header
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE)
    }

    /// True when the media type (parameters ignored) is `application/json`
    pub fn is_json(&self) -> bool {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .map(|mt| mt.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
            .unwrap_or(false)
    }

    /// Vector clock of the returned object
    pub fn vclock(&self) -> Option<&str> {
        self.header_str(VCLOCK_HEADER)
    }

    /// Location header (set on 201 Created)
    pub fn location(&self) -> Option<&str> {
        self.header_str(header::LOCATION)
    }

    /// ETag, quotes stripped
    pub fn etag(&self) -> Option<&str> {
        self.header_str(header::ETAG).map(|s| s.trim_matches('"'))
    }

    /// Last-Modified header as sent
    pub fn last_modified(&self) -> Option<&str> {
        self.header_str(header::LAST_MODIFIED)
    }

    /// User metadata read back from `X-Riak-Meta-*` headers
    pub fn user_meta(&self) -> HashMap<String, String> {
        self.prefixed(META_HEADER_PREFIX)
    }

    /// Secondary index entries read back from `X-Riak-Index-*` headers, keyed by `{name}_{suffix}`
    pub fn indexes(&self) -> HashMap<String, String> {
        self.prefixed(INDEX_HEADER_PREFIX)
    }

    fn prefixed(&self, prefix: &str) -> HashMap<String, String> {
        let prefix = prefix.to_ascii_lowercase();
        let mut found = HashMap::new();
        for (name, value) in self.headers.iter() {
            if let Some(key) = name.as_str().strip_prefix(prefix.as_str()) {
                if let Ok(v) = value.to_str() {
                    found.insert(key.to_string(), v.to_string());
                }
            }
        }
        found
    }
}

/// A buffered response: metadata plus the complete body
#[derive(Clone, Debug)]
pub struct Outcome {
    pub meta: ResponseMeta,
    pub body: Bytes,
}

impl Outcome {
    pub fn status(&self) -> u16 {
        self.meta.status
    }
}

/// Read result: response metadata and the payload, `None` when the store reported 404
#[derive(Clone, Debug)]
pub struct Fetched<T> {
    pub meta: ResponseMeta,
    pub data: Option<T>,
}

impl<T> Fetched<T> {
    /// Whether the store had nothing under the requested key
    pub fn is_missing(&self) -> bool {
        self.data.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            meta: self.meta,
            data: self.data.map(f),
        }
    }

    pub(crate) fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Fetched<U>> {
        Ok(Fetched {
            meta: self.meta,
            data: self.data.map(f).transpose()?,
        })
    }
}

/// Options shared by the read operations
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Extra query parameters (`r`, `pr`, `basic_quorum`, ...)
    pub query: Vec<(String, String)>,
    /// Advertise that the caller can resolve siblings (multipart bodies)
    pub accept_siblings: bool,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Ask the store for multipart sibling bodies
    pub fn accepting_siblings(mut self) -> Self {
        self.accept_siblings = true;
        self
    }
}

/// Object body for a write
#[derive(Clone, Debug)]
pub enum Payload {
    /// Structured value, sent as `application/json`
    Json(serde_json::Value),
    /// Bytes passed through unchanged
    Raw(Bytes),
}

impl Payload {
    /// Encode any serializable value as a JSON payload
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub(crate) fn into_body(self) -> Result<(Option<&'static str>, Bytes)> {
        match self {
            Self::Json(value) => Ok((Some(JSON_CONTENT_TYPE), Bytes::from(serde_json::to_vec(&value)?))),
            Self::Raw(bytes) => Ok((None, bytes)),
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(Bytes::from(bytes))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Raw(Bytes::from(s))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Raw(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// Identifier returned by a save
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveResult {
    /// 201: the store assigned a key and reported it in `Location`
    Created { location: String },
    /// 200 or 204: the body the store returned (empty for 204)
    Stored { body: Bytes },
}

impl SaveResult {
    /// Key assigned by the store, taken from the last segment of `Location`
    pub fn created_key(&self) -> Option<&str> {
        match self {
            Self::Created { location } => location.rsplit('/').next().filter(|k| !k.is_empty()),
            Self::Stored { .. } => None,
        }
    }
}

/// One map/reduce result record: every stored version of one object
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiblingRecord {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub vclock: Option<String>,
    pub values: Vec<SiblingValue>,
}

impl SiblingRecord {
    /// More than one concurrent value is stored under this key
    pub fn has_siblings(&self) -> bool {
        self.values.len() > 1
    }
}

/// A single stored version
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiblingValue {
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub data: String,
}

impl SiblingValue {
    /// Decode the stored data as JSON
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).map_err(ClientError::from)
    }
}

#[derive(Deserialize)]
pub(crate) struct KeyList {
    pub keys: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct BucketList {
    pub buckets: Vec<String>,
}
