use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;

const DATABASE_URL_ENV: &str = "SCHEDULING_INBOX_DATABASE_URL";
const DEFAULT_DATABASE_URL: &str = "sqlite://./data/inbox.db";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and manage scheduling inbox objects")]
pub struct Args {
    /// Database URL (overrides SCHEDULING_INBOX_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the objects in a principal's inbox without loading payloads
    List { principal: String },

    /// Print one object's properties and payload
    Show { principal: String, uri: String },

    /// Print the effective ACL of an object as JSON
    Acl { principal: String, uri: String },

    /// Delete an object from the inbox
    Delete { principal: String, uri: String },

    /// Store an iTIP message read from a file
    Deliver {
        principal: String,
        uri: String,
        file: PathBuf,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig, the migrate
    /// flag and the requested command.
    pub fn from_env_and_args() -> (Self, bool, Option<Command>) {
        let args = Args::parse();
        let env_db = env::var(DATABASE_URL_ENV).ok();
        let cfg = Self::merge(args.database_url, env_db);
        (cfg, args.migrate, args.command)
    }

    /// CLI value wins over the environment, which wins over the default.
    fn merge(cli_db: Option<String>, env_db: Option<String>) -> Self {
        Self {
            database_url: cli_db
                .or(env_db)
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
        }
    }

    /// Filesystem path of the SQLite database, if the URL names one.
    pub fn database_path(&self) -> Option<PathBuf> {
        let path = self
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        if path.is_empty() || path.starts_with(":memory:") {
            None
        } else {
            Some(PathBuf::from(path.split('?').next().unwrap_or(path)))
        }
    }
}
