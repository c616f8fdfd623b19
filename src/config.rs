use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub detection: DetectionConfig,
    pub drift: DriftConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/cloudtrim.db".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}

/// Detection engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Scan cache TTL in seconds (default: 30)
    pub cache_ttl_secs: u64,
    /// Whether "both metrics null" counts as idle in the RDS/cache rules
    pub treat_missing_metrics_as_idle: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 30, treat_missing_metrics_as_idle: true }
    }
}

/// Periodic drift tick settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Whether the timer-driven drift tick runs at all
    pub enabled: bool,
    /// Seconds between ticks; each tick advances one virtual day (default: 300)
    pub interval_secs: u64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self { enabled: true, interval_secs: 300 }
    }
}

/// Scheduled-recommendation poller settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between polls for due scheduled recommendations (default: 60)
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true, interval_secs: 60 }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "cloudtrim")]
#[command(version, about = "Cloudtrim - Cloud Waste Optimization Engine")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Logging level (overrides config file, e.g., "info,cloudtrim=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Drift tick interval (overrides config file, e.g., "300s", "5m", "1h")
    #[arg(long, value_name = "DURATION")]
    pub drift_interval: Option<String>,

    /// Enable/disable the drift tick (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub drift_enabled: Option<bool>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file
    /// support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        // Pick up a .env file before reading environment overrides
        dotenvy::dotenv().ok();

        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    fn find_config_file() -> Option<String> {
        let candidates = ["config.toml", "conf/config.toml", "/etc/cloudtrim/config.toml"];
        candidates
            .iter()
            .find(|p| Path::new(p).exists())
            .map(|p| p.to_string())
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path, e))?;
        let config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path, e))?;
        tracing::info!("Configuration loaded from {}", path);
        Ok(config)
    }

    /// Supported environment variables:
    /// - APP_SERVER_HOST, APP_SERVER_PORT
    /// - APP_DATABASE_URL
    /// - APP_LOG_LEVEL
    /// - APP_CACHE_TTL_SECS
    /// - APP_TREAT_MISSING_METRICS_AS_IDLE (true/false)
    /// - APP_DRIFT_ENABLED (true/false), APP_DRIFT_INTERVAL (e.g. "5m")
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(ttl) = std::env::var("APP_CACHE_TTL_SECS")
            && let Ok(ttl) = ttl.parse()
        {
            self.detection.cache_ttl_secs = ttl;
        }
        if let Ok(flag) = std::env::var("APP_TREAT_MISSING_METRICS_AS_IDLE")
            && let Ok(flag) = flag.parse()
        {
            self.detection.treat_missing_metrics_as_idle = flag;
        }
        if let Ok(flag) = std::env::var("APP_DRIFT_ENABLED")
            && let Ok(flag) = flag.parse()
        {
            self.drift.enabled = flag;
        }
        if let Ok(interval) = std::env::var("APP_DRIFT_INTERVAL") {
            match parse_duration_to_secs(&interval) {
                Ok(secs) => self.drift.interval_secs = secs,
                Err(e) => tracing::warn!(
                    "Invalid APP_DRIFT_INTERVAL '{}': {} (keep {})",
                    interval,
                    e,
                    self.drift.interval_secs
                ),
            }
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(url) = &args.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(enabled) = args.drift_enabled {
            self.drift.enabled = enabled;
        }
        if let Some(interval) = &args.drift_interval {
            match parse_duration_to_secs(interval) {
                Ok(secs) => self.drift.interval_secs = secs,
                Err(e) => tracing::warn!("Invalid --drift-interval '{}': {}", interval, e),
            }
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.database.url.is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.detection.cache_ttl_secs == 0 {
            anyhow::bail!("detection.cache_ttl_secs must be at least 1");
        }
        if self.drift.enabled && self.drift.interval_secs < 10 {
            anyhow::bail!("drift.interval_secs must be at least 10");
        }
        Ok(())
    }
}

/// Parse "30", "30s", "5m" or "1h" into seconds
fn parse_duration_to_secs(raw: &str) -> Result<u64, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (value, multiplier) = if let Some(v) = s.strip_suffix('h') {
        (v, 3600)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1)
    } else {
        (s, 1)
    };

    value
        .trim()
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|e| e.to_string())
}
