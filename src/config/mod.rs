//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "lamina";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_URL: &str = "sqlite://lamina.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BLOB_ROOT: &str = "blobs";
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_COMMENT_WINDOW_SECS: u64 = 60;
const DEFAULT_COMMENT_MAX: u64 = 3;

/// Command-line arguments for the Lamina binary.
#[derive(Debug, Parser)]
#[command(name = "lamina", version, about = "Lamina blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LAMINA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Regenerate every cached post page, then exit.
    #[command(name = "rebuild-all")]
    RebuildAll(RebuildAllArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RebuildAllArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(long = "log-json", value_name = "BOOL")]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the blob store root directory.
    #[arg(long = "blob-root", value_name = "PATH")]
    pub blob_root: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub blob: BlobSettings,
    pub admin: AdminSettings,
    pub comments: CommentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct BlobSettings {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct CommentSettings {
    pub rate_limit_window: Duration,
    pub rate_limit_max: u64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("LAMINA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::RebuildAll(args)) => raw.apply_overrides(&args.overrides),
        None => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    blob: RawBlobSettings,
    admin: RawAdminSettings,
    comments: RawCommentSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlobSettings {
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentSettings {
    rate_limit_window_seconds: Option<u64>,
    rate_limit_max: Option<u64>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(root) = overrides.blob_root.as_ref() {
            self.blob.root = Some(root.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let host = raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = raw.server.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(LoadError::invalid(
                "server.port",
                "port must be greater than zero",
            ));
        }
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|err| LoadError::invalid("server.addr", format!("{err}")))?;

        let level = match raw.logging.level {
            Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
                LoadError::invalid("logging.level", format!("failed to parse: {err}"))
            })?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let url = raw
            .database
            .url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let max_connections = raw
            .database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err(LoadError::invalid(
                "database.max_connections",
                "must be greater than zero",
            ));
        }

        let root = raw
            .blob
            .root
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_ROOT));

        let username = raw
            .admin
            .username
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());
        let password = raw
            .admin
            .password
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                LoadError::invalid("admin.password", "a non-empty password is required")
            })?;

        let window_seconds = raw
            .comments
            .rate_limit_window_seconds
            .unwrap_or(DEFAULT_COMMENT_WINDOW_SECS);
        if window_seconds == 0 {
            return Err(LoadError::invalid(
                "comments.rate_limit_window_seconds",
                "must be greater than zero",
            ));
        }
        let rate_limit_max = raw.comments.rate_limit_max.unwrap_or(DEFAULT_COMMENT_MAX);
        if rate_limit_max == 0 {
            return Err(LoadError::invalid(
                "comments.rate_limit_max",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            server: ServerSettings { addr },
            logging: LoggingSettings { level, format },
            database: DatabaseSettings {
                url,
                max_connections,
            },
            blob: BlobSettings { root },
            admin: AdminSettings { username, password },
            comments: CommentSettings {
                rate_limit_window: Duration::from_secs(window_seconds),
                rate_limit_max,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_password() -> RawSettings {
        RawSettings {
            admin: RawAdminSettings {
                username: None,
                password: Some("secret".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_every_section() {
        let settings = Settings::from_raw(raw_with_password()).expect("load");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(settings.admin.username, DEFAULT_ADMIN_USERNAME);
        assert_eq!(
            settings.comments.rate_limit_window,
            Duration::from_secs(DEFAULT_COMMENT_WINDOW_SECS)
        );
        assert_eq!(settings.comments.rate_limit_max, DEFAULT_COMMENT_MAX);
    }

    #[test]
    fn missing_admin_password_is_rejected() {
        let err = Settings::from_raw(RawSettings::default()).expect_err("must fail");
        assert!(matches!(err, LoadError::Invalid { key, .. } if key == "admin.password"));
    }

    #[test]
    fn cli_overrides_replace_file_values() {
        let mut raw = raw_with_password();
        raw.server.port = Some(8080);
        raw.apply_overrides(&Overrides {
            server_port: Some(9090),
            database_url: Some("sqlite://other.db".to_string()),
            ..Default::default()
        });

        let settings = Settings::from_raw(raw).expect("load");
        assert_eq!(settings.server.addr.port(), 9090);
        assert_eq!(settings.database.url, "sqlite://other.db");
    }

    #[test]
    fn zero_rate_limit_window_is_rejected() {
        let mut raw = raw_with_password();
        raw.comments.rate_limit_window_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }
}
