//! Write-side header assembly
//!
//! [`SaveOptions`] collects typed header entries for a save and turns them
//! into wire headers in a fixed order: caller headers, vector clock, user
//! metadata, secondary indexes, then one `Link` header.

use crate::index::IndexValue;
use crate::types::{INDEX_HEADER_PREFIX, META_HEADER_PREFIX, VCLOCK_HEADER};

/// A link to another object, sent as one segment of the `Link` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    /// Relation name (`riaktag`)
    pub tag: String,
    /// Target bucket
    pub bucket: String,
    /// Target key
    pub key: String,
}

impl Link {
    pub fn new(tag: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// RFC 5988 style segment: `</riak/bucket/key>; riaktag="tag"`
    pub fn to_header_segment(&self) -> String {
        format!("</riak/{}/{}>; riaktag=\"{}\"", self.bucket, self.key, self.tag)
    }
}

/// Per-call options for a save
#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    headers: Vec<(String, String)>,
    vclock: Option<String>,
    meta: Vec<(String, String)>,
    indexes: Vec<(String, IndexValue)>,
    links: Vec<Link>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass an arbitrary header through (e.g. `Content-Type` for raw payloads)
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Conditional write: the vector clock of the version being replaced
    pub fn vclock(mut self, vclock: impl Into<String>) -> Self {
        self.vclock = Some(vclock.into());
        self
    }

    /// User metadata entry, sent as `X-Riak-Meta-{name}`
    pub fn meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((name.into(), value.into()));
        self
    }

    /// Secondary index entry, sent as `X-Riak-Index-{name}_{suffix}`
    pub fn index(mut self, name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        self.indexes.push((name.into(), value.into()));
        self
    }

    /// Link to another object
    pub fn link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
            && self.vclock.is_none()
            && self.meta.is_empty()
            && self.indexes.is_empty()
            && self.links.is_empty()
    }

    /// Finalise into wire headers
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut out = self.headers.clone();

        if let Some(vclock) = &self.vclock {
            out.push((VCLOCK_HEADER.to_string(), vclock.clone()));
        }

        for (name, value) in &self.meta {
            out.push((format!("{}{}", META_HEADER_PREFIX, name), value.clone()));
        }

        for (name, value) in &self.indexes {
            out.push((
                format!("{}{}", INDEX_HEADER_PREFIX, value.index_name(name)),
                value.to_string(),
            ));
        }

        if !self.links.is_empty() {
            let segments: Vec<String> = self.links.iter().map(Link::to_header_segment).collect();
            out.push(("Link".to_string(), segments.join(", ")));
        }

        out
    }
}
