//! Subcommand execution

use crate::Command;
use anyhow::{bail, Context};
use futures::StreamExt;
use reeak_client::{Connection, IndexValue, Link, Payload, ReadOptions, SaveOptions, SaveResult};
use std::io::Write;

/// Parse `name=value`
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{}`", s))?;
    if name.is_empty() {
        return Err(format!("empty name in `{}`", s));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Parse `name=integer`
pub fn parse_int_pair(s: &str) -> Result<(String, i64), String> {
    let (name, value) = parse_pair(s)?;
    let value = value
        .parse()
        .map_err(|e| format!("`{}` is not an integer: {}", value, e))?;
    Ok((name, value))
}

/// Parse `tag=bucket/key`
pub fn parse_link(s: &str) -> Result<Link, String> {
    let (tag, target) = parse_pair(s)?;
    match target.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Link::new(tag, bucket, key)),
        _ => Err(format!("expected tag=bucket/key, got `{}`", s)),
    }
}

fn describe_delete(key: &str, deleted: bool) -> String {
    if deleted {
        format!("deleted {}", key)
    } else {
        format!("{} was already absent", key)
    }
}

pub async fn run(connection: &Connection, command: Command) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();

    match command {
        Command::Buckets => {
            for name in connection.buckets().list().await? {
                writeln!(out, "{}", name)?;
            }
        }

        Command::Keys { bucket, stream } => {
            let bucket = connection.bucket(bucket);
            if stream {
                let mut keys = bucket.stream_keys();
                while let Some(batch) = keys.next().await {
                    for key in batch? {
                        writeln!(out, "{}", key)?;
                    }
                    out.flush()?;
                }
            } else {
                for key in bucket.all_keys().await? {
                    writeln!(out, "{}", key)?;
                }
            }
        }

        Command::Get { bucket, key } => {
            let fetched = connection.bucket(bucket.as_str()).get(&key, &ReadOptions::new()).await?;
            match fetched.data {
                Some(body) => {
                    if let Some(vclock) = fetched.meta.vclock() {
                        tracing::debug!("vclock: {}", vclock);
                    }
                    out.write_all(&body)?;
                    writeln!(out)?;
                }
                None => bail!("{}/{} not found", bucket, key),
            }
        }

        Command::Put {
            bucket,
            value,
            key,
            json,
            indexes,
            int_indexes,
            meta,
            links,
            vclock,
        } => {
            let payload = if json {
                let value: serde_json::Value =
                    serde_json::from_str(&value).context("value is not valid JSON")?;
                Payload::Json(value)
            } else {
                Payload::from(value)
            };
            let options = save_options(json, indexes, int_indexes, meta, links, vclock);

            let result = connection
                .bucket(bucket)
                .save(key.as_deref(), payload, &options, &[])
                .await?;
            match result {
                SaveResult::Created { location } => writeln!(out, "{}", location)?,
                SaveResult::Stored { body } if !body.is_empty() => {
                    out.write_all(&body)?;
                    writeln!(out)?;
                }
                SaveResult::Stored { .. } => {}
            }
        }

        Command::Delete { bucket, key } => {
            let deleted = connection.bucket(bucket).delete(&key, &[]).await?;
            writeln!(out, "{}", describe_delete(&key, deleted))?;
        }

        Command::Index { bucket, name, value, int } => {
            let value = if int {
                IndexValue::Int(value.parse().context("index value is not an integer")?)
            } else {
                IndexValue::Bin(value)
            };
            let fetched = connection
                .bucket(bucket)
                .keys_from_index(&name, value, &ReadOptions::new())
                .await?;
            for key in fetched.data.unwrap_or_default() {
                writeln!(out, "{}", key)?;
            }
        }
    }

    Ok(())
}

fn save_options(
    json: bool,
    indexes: Vec<(String, String)>,
    int_indexes: Vec<(String, i64)>,
    meta: Vec<(String, String)>,
    links: Vec<Link>,
    vclock: Option<String>,
) -> SaveOptions {
    let mut options = SaveOptions::new();
    if !json {
        options = options.header("Content-Type", "text/plain");
    }
    if let Some(vclock) = vclock {
        options = options.vclock(vclock);
    }
    for (name, value) in meta {
        options = options.meta(name, value);
    }
    for (name, value) in indexes {
        options = options.index(name, value);
    }
    for (name, value) in int_indexes {
        options = options.index(name, value);
    }
    for link in links {
        options = options.link(link);
    }
    options
}
