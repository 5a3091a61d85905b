use std::time::Duration;

use clap::Parser;
use figment::{
    providers::{Data, Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line flags. Only flags the operator actually passed are
/// serialized, so unset flags never mask TOML or env values.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "herbal-server", version, about = "Herbal Heaven notification server")]
pub struct CliArgs {
    /// Port to listen on [default: 3000]
    #[arg(long, env = "HERBAL_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "HERBAL_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file [default: ./herbal.toml]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "HERBAL_JSON_LOGS")]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key) [default: ./data]
    #[arg(long, env = "HERBAL_DATA_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Create an admin account with this email, print an access token and exit
    #[arg(long, value_name = "EMAIL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_admin: Option<String>,

    /// Display name for the account created by --create-admin [default: Administrator]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
}

/// Effective server configuration after all layers are merged.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub config: String,
    pub json_logs: bool,
    pub generate_config: bool,
    pub data_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_admin: Option<String>,
    pub admin_name: String,

    /// Notification listing limits (loaded from [notifications] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationsConfig>,

    /// Real-time connection settings (loaded from [realtime] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<RealtimeConfig>,
}

/// Page sizes for notification listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Items returned when the client sends no limit (default: 10)
    #[serde(default = "default_list_limit")]
    pub default_limit: u32,

    /// Upper bound on any requested limit (default: 100)
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Items in the admin "recent notifications" view (default: 20)
    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            default_limit: default_list_limit(),
            max_limit: default_max_limit(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl NotificationsConfig {
    /// Effective page size for a user listing. Zero falls back to the default.
    pub fn list_limit(&self, requested: Option<u32>) -> u32 {
        self.clamp(requested, self.default_limit)
    }

    pub fn recent_limit(&self, requested: Option<u32>) -> u32 {
        self.clamp(requested, self.recent_limit)
    }

    fn clamp(&self, requested: Option<u32>, default: u32) -> u32 {
        match requested {
            Some(0) | None => default.min(self.max_limit),
            Some(n) => n.min(self.max_limit),
        }
    }
}

fn default_list_limit() -> u32 {
    10
}

fn default_max_limit() -> u32 {
    100
}

fn default_recent_limit() -> u32 {
    20
}

/// WebSocket keepalive settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
        }
    }
}

impl RealtimeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

const DEFAULT_CONFIG_PATH: &str = "./herbal.toml";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: DEFAULT_CONFIG_PATH.to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            create_admin: None,
            admin_name: "Administrator".to_string(),
            notifications: Some(NotificationsConfig::default()),
            realtime: Some(RealtimeConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (HERBAL_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = CliArgs::parse();
        let config_path = cli.config.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::layered(Toml::file(config_path), cli)
    }

    fn layered(toml: Data<Toml>, cli: CliArgs) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(toml)
            .merge(Env::prefixed("HERBAL_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    pub fn notifications_config(&self) -> NotificationsConfig {
        self.notifications.unwrap_or_default()
    }

    pub fn realtime_config(&self) -> RealtimeConfig {
        self.realtime.unwrap_or_default()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Herbal Heaven Notification Server Configuration
# Place this file at ./herbal.toml or specify with --config <path>
# All settings can be overridden via environment variables (HERBAL_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# ---- Notifications ----
# [notifications]
# default_limit = 10   # Items per listing when the client sends no limit
# max_limit = 100      # Cap on any requested limit
# recent_limit = 20    # Items in the admin "recent notifications" view

# ---- Real-time (WebSocket) ----
# [realtime]
# ping_interval_secs = 30  # Server ping interval
# pong_timeout_secs = 10   # Close the connection if no pong arrives in time
"#
    .to_string()
}
