//! # Reeak Client
//!
//! An async client for Riak's HTTP interface.
//!
//! ## Features
//!
//! - **Typed outcomes**: each operation maps the store's status codes to a
//!   result; a missing key is `None`, a repeated delete is `false`
//! - **Secondary indexes**: `_int` / `_bin` naming follows the value's type
//! - **Sibling resolution**: index queries hand conflicting versions to a
//!   caller-supplied [`MergeStrategy`]
//! - **Streaming**: key listings of any size via [`KeyStream`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use reeak_client::{Config, Connection, ReadOptions, SaveOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let conn = Connection::new(Config::new("127.0.0.1:8098"))?;
//!     let users = conn.bucket("users");
//!
//!     let options = SaveOptions::new().index("city", "lisbon");
//!     users.save_json(Some("ana"), &serde_json::json!({"name": "Ana"}), &options).await?;
//!
//!     let found = users.get("ana", &ReadOptions::new()).await?;
//!     println!("{:?}", found.data);
//!
//!     let keys = users.keys_from_index("city", "lisbon", &ReadOptions::new()).await?;
//!     println!("{:?}", keys.data);
//!
//!     Ok(())
//! }
//! ```

mod bucket;
mod buckets;
mod config;
mod connection;
mod error;
mod headers;
mod index;
mod merge;
mod stream;
#[cfg(test)]
mod test_support;
mod types;

pub use bucket::Bucket;
pub use buckets::BucketCollection;
pub use config::Config;
pub use connection::Connection;
pub use error::{ClientError, Result};
pub use headers::{Link, SaveOptions};
pub use index::{suffix, IndexValue};
pub use merge::MergeStrategy;
pub use stream::{KeyStream, KeyStreamHandle};
pub use types::*;
