//! reeak - command line access to a Riak HTTP endpoint

mod commands;

use clap::{Parser, Subcommand};
use reeak_client::{Config, Connection, Link};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reeak")]
#[command(about = "Read and write a Riak key-value store over HTTP")]
#[command(version)]
struct Args {
    /// Store address (host:port). Repeat or comma-separate; only the first is contacted.
    #[arg(
        short,
        long = "server",
        default_value = "127.0.0.1:8098",
        env = "REEAK_SERVERS",
        value_delimiter = ','
    )]
    servers: Vec<String>,

    /// Path namespace placed before every request path
    #[arg(short, long, env = "REEAK_NAMESPACE")]
    namespace: Option<String>,

    /// Talk https instead of http
    #[arg(long, env = "REEAK_HTTPS")]
    https: bool,

    /// Enable debug logging
    #[arg(short, long, env = "REEAK_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List bucket names
    Buckets,

    /// List the keys of a bucket
    Keys {
        bucket: String,
        /// Stream keys batch by batch instead of one buffered response
        #[arg(long)]
        stream: bool,
    },

    /// Print the value stored under a key
    Get { bucket: String, key: String },

    /// Store a value
    Put {
        bucket: String,
        /// Value to store
        value: String,
        /// Key to store under; the store assigns one when omitted
        #[arg(short, long)]
        key: Option<String>,
        /// Parse the value as JSON and send it as application/json
        #[arg(long)]
        json: bool,
        /// Binary secondary index entry (name=value)
        #[arg(long = "index", value_parser = commands::parse_pair)]
        indexes: Vec<(String, String)>,
        /// Integer secondary index entry (name=value)
        #[arg(long = "int-index", value_parser = commands::parse_int_pair)]
        int_indexes: Vec<(String, i64)>,
        /// User metadata entry (name=value)
        #[arg(long = "meta", value_parser = commands::parse_pair)]
        meta: Vec<(String, String)>,
        /// Link to another object (tag=bucket/key)
        #[arg(long = "link", value_parser = commands::parse_link)]
        links: Vec<Link>,
        /// Vector clock of the version being replaced
        #[arg(long)]
        vclock: Option<String>,
    },

    /// Delete a key
    Delete { bucket: String, key: String },

    /// List keys whose secondary index matches a value
    Index {
        bucket: String,
        name: String,
        value: String,
        /// Treat the value as an integer index entry
        #[arg(long)]
        int: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("reeak={},reeak_client={}", log_level, log_level).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config {
        servers: args.servers,
        https: args.https,
        ..Default::default()
    };
    if let Some(namespace) = args.namespace {
        config = config.with_namespace(namespace);
    }

    if config.servers.len() > 1 {
        tracing::warn!(
            "{} servers configured; only {} is used",
            config.servers.len(),
            config.servers[0]
        );
    }

    let connection = Connection::new(config)?;
    commands::run(&connection, args.command).await
}
