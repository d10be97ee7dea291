use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

const DEFAULT_MAX_RAW_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub printer: PrinterConfig,
    pub dispatch: DispatchConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterConfig {
    pub use_mock: bool,
    pub mock_devices: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Where downloaded PDFs are spooled; `None` means the OS temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Whole-request timeout for document downloads, 0 disables it.
    pub fetch_timeout_secs: u64,
    /// Largest non-PDF download buffered for raw printing, 0 disables the cap.
    pub max_raw_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl DispatchConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    pub fn max_raw_bytes(&self) -> Option<usize> {
        match self.max_raw_bytes {
            0 => None,
            limit => Some(usize::try_from(limit).unwrap_or(usize::MAX)),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            fetch_timeout_secs: 30,
            max_raw_bytes: DEFAULT_MAX_RAW_BYTES,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "*".to_string(),
            allow_headers: "*".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "4567".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        };

        let printer = PrinterConfig {
            use_mock: std::env::var("USE_MOCK_PRINTER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            mock_devices: std::env::var("MOCK_PRINTERS")
                .unwrap_or_else(|_| "Mock Printer".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let timeout = std::env::var("FETCH_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let max_raw = std::env::var("MAX_RAW_DOCUMENT_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_RAW_BYTES.to_string());
        let dispatch = DispatchConfig {
            temp_dir: std::env::var("PRINT_TEMP_DIR").ok().map(PathBuf::from),
            fetch_timeout_secs: timeout
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(timeout.clone()))?,
            max_raw_bytes: max_raw
                .parse()
                .map_err(|_| ConfigError::InvalidRawLimit(max_raw.clone()))?,
        };

        let defaults = CorsConfig::default();
        let cors = CorsConfig {
            allow_origin: std::env::var("CORS_ALLOW_ORIGIN").unwrap_or(defaults.allow_origin),
            allow_methods: std::env::var("CORS_ALLOW_METHODS").unwrap_or(defaults.allow_methods),
            allow_headers: std::env::var("CORS_ALLOW_HEADERS").unwrap_or(defaults.allow_headers),
        };

        let config = Config {
            server,
            printer,
            dispatch,
            cors,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Validate port range
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if let Some(dir) = &self.dispatch.temp_dir {
            if !dir.is_dir() {
                return Err(ConfigError::InvalidTempDir {
                    path: dir.display().to_string(),
                });
            }
        }

        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|_| ConfigError::InvalidSocketAddr(addr))
    }
}

#[cfg(test)]
impl Config {
    pub(crate) fn for_tests() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 4567,
            },
            printer: PrinterConfig {
                use_mock: true,
                mock_devices: Vec::new(),
            },
            dispatch: DispatchConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}
