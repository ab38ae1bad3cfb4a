//! Connection to the store's HTTP interface

use crate::{
    Bucket, BucketCollection, ClientError, Config, Result,
    types::{Outcome, RequestDescriptor, ResponseMeta},
};
use reqwest::header::{self, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Handle to one store endpoint.
///
/// Cloning is cheap and every clone talks to the same endpoint with the same
/// HTTP client. Only `servers[0]` of the configuration is used; there is no
/// failover to the remaining addresses and no retry.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    http: Client,
    url_prefix: String,
}

impl Connection {
    /// Create a new connection with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let server = config
            .servers
            .first()
            .ok_or_else(|| ClientError::Config("no server address configured".to_string()))?;

        let url_prefix = format!(
            "{}://{}{}",
            config.scheme(),
            server.trim_end_matches('/'),
            config.namespace_prefix()
        );
        Url::parse(&url_prefix)
            .map_err(|e| ClientError::Config(format!("invalid server address {}: {}", server, e)))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ClientError::Config(format!("invalid user agent: {}", e)))?,
        );

        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClientError::Http)?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                url_prefix,
            }),
        })
    }

    /// Connect to a single server with default settings
    pub fn with_server(server: &str) -> Result<Self> {
        Self::new(Config::new(server))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Absolute URL for a path below the namespace
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.inner.url_prefix, path)
    }

    /// Handle for one bucket
    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name)
    }

    /// Handle for bucket-level listing
    pub fn buckets(&self) -> BucketCollection {
        BucketCollection::new(self.clone())
    }

    /// Issue a request and buffer the whole response body.
    ///
    /// Only transport failures are errors here; the status code is left to the caller.
    pub async fn issue(&self, request: RequestDescriptor) -> Result<Outcome> {
        let response = self.send(request).await?;
        let meta = ResponseMeta {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        };
        let body = response.bytes().await?;
        debug!(status = meta.status, len = body.len(), "Received response");
        Ok(Outcome { meta, body })
    }

    /// Issue a request and hand back the response with its body unread
    pub async fn send(&self, request: RequestDescriptor) -> Result<Response> {
        let url = self.url_for(&request.path);
        let mut req = self.inner.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Config(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::Config(format!("invalid value for header {}: {}", name, e)))?;
            req = req.header(name, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        debug!("Sending {} request to {}", request.method, url);
        Ok(req.send().await?)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url_prefix", &self.inner.url_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_prefix_uses_first_server_and_namespace() {
        let conn = Connection::new(
            Config::new("db1:8098")
                .with_server("db2:8098")
                .with_namespace("riak"),
        )
        .unwrap();
        assert_eq!(conn.url_for("/buckets"), "http://db1:8098/riak/buckets");
    }

    #[test]
    fn test_https_without_namespace() {
        let conn = Connection::new(Config::new("db1:8098").with_https(true)).unwrap();
        assert_eq!(conn.url_for("/buckets/a/keys/b"), "https://db1:8098/buckets/a/keys/b");
    }

    #[test]
    fn test_no_servers_is_config_error() {
        let config = Config {
            servers: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(Connection::new(config), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_bad_server_address_is_config_error() {
        let result = Connection::new(Config::new("db1:notaport"));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
