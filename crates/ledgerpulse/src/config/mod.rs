use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const SANDBOX_LEDGER_URL: &str = "https://sandbox-quickbooks.api.intuit.com";
const PRODUCTION_LEDGER_URL: &str = "https://quickbooks.api.intuit.com";
const DEFAULT_COMPOSER_URL: &str = "https://api.openai.com";
const DEFAULT_COMPOSER_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAILBOX_URL: &str = "https://gmail.googleapis.com";

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

/// Top-level configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub ledger: LedgerConfig,
    pub composer: ComposerConfig,
    pub mailbox: MailboxConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let ledger_default = match env::var("LEDGER_ENV").as_deref() {
            Ok("production") => PRODUCTION_LEDGER_URL,
            _ => SANDBOX_LEDGER_URL,
        };
        let ledger = LedgerConfig {
            base_url: env::var("LEDGER_BASE_URL").unwrap_or_else(|_| ledger_default.to_string()),
            access_token: env::var("LEDGER_ACCESS_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
        };

        let composer = ComposerConfig {
            base_url: env::var("COMPOSER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_COMPOSER_URL.to_string()),
            api_key: env::var("COMPOSER_API_KEY").ok().filter(|key| !key.is_empty()),
            model: env::var("COMPOSER_MODEL")
                .unwrap_or_else(|_| DEFAULT_COMPOSER_MODEL.to_string()),
        };

        let mailbox = MailboxConfig {
            base_url: env::var("MAILBOX_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_MAILBOX_URL.to_string()),
            access_token: env::var("MAILBOX_ACCESS_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            ledger,
            composer,
            mailbox,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Accounting-platform endpoint selection. A missing token leaves the
/// service on its built-in demo ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

/// Natural-language composer access. A missing key disables the composer;
/// the pipeline then always uses the deterministic template.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Mailbox draft creation access.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
