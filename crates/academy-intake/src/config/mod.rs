use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadConfig,
    pub lms: LmsConfig,
    pub mail: MailConfig,
    pub reporting: ReportingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&env_or("APP_ENV", "development"));

        let host = env_or("APP_HOST", "127.0.0.1");
        let port = env_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env_or("APP_LOG_LEVEL", "info");

        let database = DatabaseConfig {
            path: PathBuf::from(env_or("DATABASE_PATH", "academy-intake.db")),
        };

        let uploads = UploadConfig {
            dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            public_base_url: env_or("PUBLIC_BASE_URL", &format!("http://{host}:{port}")),
        };

        let lms = LmsConfig {
            url: optional_env("LMS_URL"),
            token: optional_env("LMS_TOKEN"),
            student_role_id: parse_env("LMS_STUDENT_ROLE_ID", 5)?,
            timeout: Duration::from_secs(parse_env("LMS_TIMEOUT_SECS", 15)?),
            password_prefix: env_or("LMS_PASSWORD_PREFIX", "Mp"),
            password_suffix: env_or("LMS_PASSWORD_SUFFIX", "*"),
        };

        let smtp = match optional_env("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", 465)?,
                username: env_or("SMTP_USERNAME", ""),
                password: env_or("SMTP_PASSWORD", ""),
            }),
            None => None,
        };
        let mail = MailConfig {
            from: env_or("MAIL_FROM", "no-reply@academy.local"),
            brand: env_or("MAIL_BRAND", "Academy"),
            contact_inbox: optional_env("CONTACT_INBOX"),
            smtp,
        };

        let utc_offset_hours = parse_env("REPORT_UTC_OFFSET_HOURS", -5)?;
        if !(-23..=23).contains(&utc_offset_hours) {
            return Err(ConfigError::InvalidOffset(utc_offset_hours));
        }
        let reporting = ReportingConfig {
            utc_offset_hours,
            coin_price: parse_env("COIN_PRICE", 15.0)?,
            badge_price: parse_env("BADGE_PRICE", 10.0)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database,
            uploads,
            lms,
            mail,
            reporting,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Where payment receipts land on disk and how they are addressed publicly.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub public_base_url: String,
}

/// Moodle web-service settings. Registration is disabled when `url` or `token` is unset.
#[derive(Debug, Clone)]
pub struct LmsConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub student_role_id: u32,
    pub timeout: Duration,
    pub password_prefix: String,
    pub password_suffix: String,
}

impl LmsConfig {
    /// Password assigned to accounts the LMS creates on first enrollment.
    pub fn initial_password(&self, national_id: &str) -> String {
        format!("{}{}{}", self.password_prefix, national_id, self.password_suffix)
    }

    pub fn base_url(&self) -> &str {
        self.url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
    pub brand: String,
    pub contact_inbox: Option<String>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Dashboard bucketing and concept prices.
#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub utc_offset_hours: i32,
    pub coin_price: f64,
    pub badge_price: f64,
}

impl ReportingConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
            coin_price: 15.0,
            badge_price: 10.0,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidOffset(i32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} has an invalid numeric value '{value}'")
            }
            ConfigError::InvalidOffset(hours) => {
                write!(
                    f,
                    "REPORT_UTC_OFFSET_HOURS must be within -23..=23 (got {hours})"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidOffset(_) => None,
        }
    }
}
