//! Basic usage against a local Riak node
//!
//! Run with: cargo run --example basic_usage
//! Point it elsewhere with REEAK_SERVER=host:port

use futures::StreamExt;
use reeak::{Config, Connection, Link, ReadOptions, SaveOptions, SiblingRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Player {
    name: String,
    level: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("reeak_client=debug")
        .init();

    let server = std::env::var("REEAK_SERVER").unwrap_or_else(|_| "127.0.0.1:8098".to_string());
    let conn = Connection::new(Config::new(server))?;

    println!("Buckets: {:?}", conn.buckets().list().await?);

    let players = conn.bucket("players");
    let options = SaveOptions::new()
        .meta("created-by", "basic_usage")
        .index("guild", "north")
        .index("level", 12)
        .link(Link::new("rival", "players", "bob"));
    players
        .save_json(Some("ana"), &Player { name: "Ana".into(), level: 12 }, &options)
        .await?;

    let fetched = players.get_json::<Player>("ana", &ReadOptions::new()).await?;
    println!("ana = {:?} (vclock {:?})", fetched.data, fetched.meta.vclock());

    let north = players.keys_from_index("guild", "north", &ReadOptions::new()).await?;
    println!("guild=north: {:?}", north.data);

    // Siblings resolve to the highest level
    let highest = |record: &SiblingRecord| -> Player {
        record
            .values
            .iter()
            .filter_map(|v| v.decode::<Player>().ok())
            .max_by_key(|p| p.level)
            .unwrap_or(Player { name: record.key.clone(), level: 0 })
    };
    let objects = players
        .objects_from_index("guild", "north", &ReadOptions::new().accepting_siblings(), &highest)
        .await?;
    println!("guild=north objects: {:?}", objects.data);

    let mut keys = players.stream_keys();
    while let Some(batch) = keys.next().await {
        println!("keys batch: {:?}", batch?);
    }

    println!("deleted: {}", players.delete("ana", &[]).await?);
    println!("deleted again: {}", players.delete("ana", &[]).await?);

    Ok(())
}
