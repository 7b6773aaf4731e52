use clap::{Parser, Subcommand, ValueEnum};
use snip_shortener::pipeline::DEFAULT_WORKERS;
use snip_shortener::service::DEFAULT_BASE_URL;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "SNIP_DATABASE_DSN";
pub const DB_MAX_CONNECTIONS_ENV: &str = "SNIP_DB_MAX_CONNECTIONS";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const DELETE_WORKERS_ENV: &str = "SNIP_DELETE_WORKERS";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "Content-addressed URL shortener")]
pub struct CLI {
    /// Storage backend. `in-memory` starts empty on every invocation, so
    /// `resolve`, `list` and `delete` only see links from a persistent
    /// backend (`file` or `postgres`).
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(
        long,
        env = FILE_STORAGE_PATH_ENV,
        required_if_eq("storage", "file")
    )]
    pub file_storage_path: Option<PathBuf>,

    #[arg(
        long,
        env = DATABASE_DSN_ENV,
        required_if_eq("storage", "postgres")
    )]
    pub database_dsn: Option<String>,

    #[arg(
        long,
        env = DB_MAX_CONNECTIONS_ENV,
        default_value_t = DEFAULT_DB_MAX_CONNECTIONS
    )]
    pub db_max_connections: u32,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = DELETE_WORKERS_ENV, default_value_t = DEFAULT_WORKERS)]
    pub delete_workers: usize,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a single URL.
    Shorten {
        url: String,
        #[arg(long)]
        owner: String,
    },
    /// Shorten a JSON array of `{correlation_id, original_url}` objects.
    Batch {
        /// Path to the JSON file, or `-` for stdin.
        input: String,
        #[arg(long)]
        owner: String,
    },
    /// Print the original URL behind a key.
    Resolve { key: String },
    /// List the live links of an owner.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Soft-delete keys owned by an owner and wait for the batch report.
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the number of stored URLs and distinct owners.
    Stats,
    /// Check that the storage backend is reachable.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn defaults_to_in_memory_storage() {
        let cli = CLI::try_parse_from(["snip", "stats"]).unwrap();

        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.delete_workers, DEFAULT_WORKERS);
        assert_eq!(cli.log_format, LogFormatArg::Text);
        assert!(matches!(cli.command, Command::Stats));
    }

    #[test]
    fn storage_help_warns_that_in_memory_is_not_persistent() {
        let command = CLI::command();
        let storage = command
            .get_arguments()
            .find(|arg| arg.get_id() == "storage")
            .unwrap();

        let help = storage.get_help().unwrap().to_string();
        assert!(help.contains("starts empty on every invocation"));
    }

    #[test]
    fn file_storage_requires_a_path() {
        let err = CLI::try_parse_from(["snip", "--storage", "file", "ping"]);
        assert!(err.is_err());

        let cli = CLI::try_parse_from([
            "snip",
            "--storage",
            "file",
            "--file-storage-path",
            "/tmp/records.jsonl",
            "ping",
        ])
        .unwrap();
        assert_eq!(
            cli.file_storage_path,
            Some(PathBuf::from("/tmp/records.jsonl"))
        );
    }

    #[test]
    fn postgres_storage_requires_a_dsn() {
        let err = CLI::try_parse_from(["snip", "--storage", "postgres", "ping"]);
        assert!(err.is_err());
    }

    #[test]
    fn delete_takes_owner_and_keys() {
        let cli = CLI::try_parse_from(["snip", "delete", "--owner", "u1", "1", "2"]).unwrap();

        match cli.command {
            Command::Delete { owner, keys } => {
                assert_eq!(owner, "u1");
                assert_eq!(keys, ["1", "2"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
