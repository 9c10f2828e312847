//! Hushpost command-line client.
//!
//! Drives the service against a local redb file. Every invocation logs in,
//! performs one action and logs out again.
//!
//! # Usage
//!
//! ```bash
//! hushpost --db hushpost.redb register alice --password 'Sup3r#secret'
//! hushpost --db hushpost.redb send alice bob "hello bob" --password 'Sup3r#secret'
//! hushpost --db hushpost.redb read bob alice --password 'An0ther#one'
//! ```

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::{Parser, Subcommand};
use hushpost_core::record::format_timestamp;
use hushpost_server::{RedbStorage, Server, ServerConfig, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Post-quantum end-to-end encrypted messaging
#[derive(Parser, Debug)]
#[command(name = "hushpost")]
#[command(about = "Post-quantum end-to-end encrypted messaging")]
#[command(version)]
struct Args {
    /// Path to the database file
    #[arg(long, env = "HUSHPOST_DB", default_value = "hushpost.redb")]
    db: String,

    /// PBKDF2 iterations for the password wrap of secret keys
    #[arg(
        long,
        env = "PBKDF2_ITERATIONS",
        default_value_t = hushpost_crypto::DEFAULT_PBKDF2_ITERATIONS
    )]
    pbkdf2_iterations: u32,

    /// Session lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 3600)]
    session_ttl_secs: u64,

    /// KEM backend
    #[arg(long, env = "HUSHPOST_KEM", default_value = hushpost_server::DEFAULT_KEM_BACKEND)]
    kem: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        /// Username (3-20 letters, digits, underscore)
        username: String,
        /// Password
        #[arg(long, env = "HUSHPOST_PASSWORD")]
        password: String,
        /// Password confirmation (defaults to --password)
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Send a message
    Send {
        /// Your username
        username: String,
        /// Recipient username
        to: String,
        /// Message text
        text: String,
        /// Your password
        #[arg(long, env = "HUSHPOST_PASSWORD")]
        password: String,
    },
    /// Print the conversation with a peer
    Read {
        /// Your username
        username: String,
        /// Peer username
        with: String,
        /// Your password
        #[arg(long, env = "HUSHPOST_PASSWORD")]
        password: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = ServerConfig {
        pbkdf2_iterations: args.pbkdf2_iterations,
        session_ttl: Duration::from_secs(args.session_ttl_secs),
        kem_backend: args.kem,
        ..ServerConfig::default()
    };

    tracing::debug!(db = %args.db, kem = %config.kem_backend, "opening store");
    let storage = RedbStorage::open(&args.db)?;
    let server = Server::new(storage, SystemEnv::new(), &config)?;
    let mut out = io::stdout().lock();

    match args.command {
        Command::Register { username, password, confirm } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            let id = server.register(&username, &password, &confirm)?;
            writeln!(out, "registered {} ({id})", username.trim())?;
        },
        Command::Send { username, to, text, password } => {
            let session = server.login(&username, &password)?;
            let result = server.send(session, &to, &text);
            server.logout(session)?;
            let sequence = result?;
            writeln!(out, "sent #{sequence}")?;
        },
        Command::Read { username, with, password } => {
            let session = server.login(&username, &password)?;
            let result = server.conversation(session, &with);
            server.logout(session)?;
            for entry in result? {
                writeln!(
                    out,
                    "[{}] {} -> {}: {}",
                    format_timestamp(entry.timestamp),
                    entry.from,
                    entry.to,
                    entry.text
                )?;
            }
        },
    }

    Ok(())
}
