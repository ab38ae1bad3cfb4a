//! Client configuration

use std::time::Duration;

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Store addresses as `host:port`. Only the first one is contacted.
    pub servers: Vec<String>,
    /// Path namespace placed in front of every request path (e.g. `riak`)
    pub namespace: Option<String>,
    /// Use `https://` instead of `http://`
    pub https: bool,
    /// User agent string
    pub user_agent: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout. Leave unset when streaming large key listings.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: vec!["127.0.0.1:8098".to_string()],
            namespace: None,
            https: false,
            user_agent: format!("reeak-client/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            timeout: None,
        }
    }
}

impl Config {
    /// Create a new config pointing at a single server
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            servers: vec![server.into()],
            ..Default::default()
        }
    }

    /// Append another server address
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.servers.push(server.into());
        self
    }

    /// Set the path namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Switch to https
    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    /// Set the whole-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// URL scheme for requests
    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// Namespace as a path prefix: empty, or `/ns` with surrounding slashes trimmed
    pub fn namespace_prefix(&self) -> String {
        match self.namespace.as_deref().map(|ns| ns.trim_matches('/')) {
            Some(ns) if !ns.is_empty() => format!("/{}", ns),
            _ => String::new(),
        }
    }
}
