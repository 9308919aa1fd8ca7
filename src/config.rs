//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the server starts.
//!
//! ## Variables
//!
//! All variables are optional:
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:3000`)
//! - `RUST_LOG` - Log filter (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `json`)
//! - `ACCESS_LOG_SINK` - Access record destination: `tracing` or `stdout` (default: `tracing`)
//! - `ACCESS_LOG_QUEUE_CAPACITY` - Records buffered for the `stdout` writer (default: `10000`)
//! - `BEHIND_PROXY` - Trust `X-Forwarded-For` / `X-Real-IP` for client IPs (default: `false`)
//! - `RATE_LIMIT_RATE` - Token refill rate per second (default: `1000/60`)
//! - `RATE_LIMIT_BURST` - Bucket capacity (default: `30`)
//! - `RATE_LIMIT_TTL_SECS` - Idle bucket expiry in seconds (default: `60`)
//! - `RATE_LIMIT_EXEMPT_PREFLIGHT` - Skip rate limiting for `OPTIONS` (default: `true`)
//! - `MAX_MULTIPART_BYTES` - Largest multipart body classified for logs (default: 10 MiB)
//! - `MAX_BODY_CAPTURE_BYTES` - Largest other body classified for logs (default: 10 MiB)

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::api::middleware::body::BodyLimits;
use crate::infrastructure::rate_limit::RateLimitConfig;

const TEN_MIB: usize = 10 << 20;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    pub access_log_sink: String,
    /// Lines the `stdout` sink queues before dropping records.
    pub access_log_queue_capacity: usize,
    /// When true, client IPs are read from X-Forwarded-For / X-Real-IP headers.
    /// Enable only when the service is behind a trusted reverse proxy.
    pub behind_proxy: bool,

    // ── Rate limiting ───────────────────────────────────────────────────────
    /// Tokens added per second to each client bucket.
    pub rate_limit_rate: f64,
    /// Maximum tokens per client bucket.
    pub rate_limit_burst: u32,
    /// Seconds of inactivity after which a client bucket is dropped.
    pub rate_limit_ttl_secs: u64,
    /// Whether `OPTIONS` pre-flight requests bypass rate limiting.
    pub rate_limit_exempt_preflight: bool,

    // ── Access log body capture ─────────────────────────────────────────────
    pub max_multipart_bytes: usize,
    pub max_body_capture_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults; range checks happen
    /// in [`Config::validate`].
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            access_log_sink: env::var("ACCESS_LOG_SINK").unwrap_or_else(|_| "tracing".to_string()),
            access_log_queue_capacity: parse_var("ACCESS_LOG_QUEUE_CAPACITY", 10_000),
            behind_proxy: parse_flag("BEHIND_PROXY", false),
            rate_limit_rate: parse_var("RATE_LIMIT_RATE", 1000.0 / 60.0),
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", 30),
            rate_limit_ttl_secs: parse_var("RATE_LIMIT_TTL_SECS", 60),
            rate_limit_exempt_preflight: parse_flag("RATE_LIMIT_EXEMPT_PREFLIGHT", true),
            max_multipart_bytes: parse_var("MAX_MULTIPART_BYTES", TEN_MIB),
            max_body_capture_bytes: parse_var("MAX_BODY_CAPTURE_BYTES", TEN_MIB),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - `access_log_sink` is not `tracing` or `stdout`
    /// - `access_log_queue_capacity` is zero
    /// - `listen_addr` is not `host:port`
    /// - the rate is not a positive number, or burst / ttl are zero
    /// - a body capture limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if self.access_log_sink != "tracing" && self.access_log_sink != "stdout" {
            anyhow::bail!(
                "ACCESS_LOG_SINK must be 'tracing' or 'stdout', got '{}'",
                self.access_log_sink
            );
        }

        if self.access_log_queue_capacity == 0 {
            anyhow::bail!("ACCESS_LOG_QUEUE_CAPACITY must be greater than 0");
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if !self.rate_limit_rate.is_finite() || self.rate_limit_rate <= 0.0 {
            anyhow::bail!(
                "RATE_LIMIT_RATE must be a positive number, got {}",
                self.rate_limit_rate
            );
        }
        if self.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_BURST must be at least 1");
        }
        if self.rate_limit_ttl_secs == 0 {
            anyhow::bail!("RATE_LIMIT_TTL_SECS must be greater than 0");
        }

        if self.max_multipart_bytes == 0 {
            anyhow::bail!("MAX_MULTIPART_BYTES must be greater than 0");
        }
        if self.max_body_capture_bytes == 0 {
            anyhow::bail!("MAX_BODY_CAPTURE_BYTES must be greater than 0");
        }

        Ok(())
    }

    /// Token bucket parameters for the rate limiter store.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            rate: self.rate_limit_rate,
            burst: self.rate_limit_burst,
            ttl: self.rate_limit_ttl(),
        }
    }

    pub fn rate_limit_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_limit_ttl_secs)
    }

    /// Body capture limits for the request observer.
    pub fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            max_multipart_bytes: self.max_multipart_bytes,
            max_capture_bytes: self.max_body_capture_bytes,
        }
    }

    /// Prints configuration summary.
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
        tracing::info!(
            "  Access log sink: {} (queue {})",
            self.access_log_sink,
            self.access_log_queue_capacity
        );
        tracing::info!("  Behind proxy: {}", self.behind_proxy);
        tracing::info!(
            "  Rate limit: {:.2}/s, burst {}, idle expiry {}s, pre-flight exempt: {}",
            self.rate_limit_rate,
            self.rate_limit_burst,
            self.rate_limit_ttl_secs,
            self.rate_limit_exempt_preflight
        );
        tracing::info!(
            "  Body capture: multipart {} bytes, other {} bytes",
            self.max_multipart_bytes,
            self.max_body_capture_bytes
        );
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "LISTEN",
        "LOG_FORMAT",
        "ACCESS_LOG_SINK",
        "ACCESS_LOG_QUEUE_CAPACITY",
        "BEHIND_PROXY",
        "RATE_LIMIT_RATE",
        "RATE_LIMIT_BURST",
        "RATE_LIMIT_TTL_SECS",
        "RATE_LIMIT_EXEMPT_PREFLIGHT",
        "MAX_MULTIPART_BYTES",
        "MAX_BODY_CAPTURE_BYTES",
    ];

    fn clear_env() {
        // SAFETY: Tests touching the environment are run serially via #[serial]
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    fn valid_config() -> Config {
        Config {
            listen_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            access_log_sink: "tracing".to_string(),
            access_log_queue_capacity: 10_000,
            behind_proxy: false,
            rate_limit_rate: 16.6,
            rate_limit_burst: 30,
            rate_limit_ttl_secs: 60,
            rate_limit_exempt_preflight: true,
            max_multipart_bytes: TEN_MIB,
            max_body_capture_bytes: TEN_MIB,
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
        config.log_format = "text".to_string();
        assert!(config.validate().is_ok());

        config.access_log_sink = "file".to_string();
        assert!(config.validate().is_err());
        config.access_log_sink = "stdout".to_string();

        config.access_log_queue_capacity = 0;
        assert!(config.validate().is_err());
        config.access_log_queue_capacity = 1;

        config.listen_addr = "3000".to_string();
        assert!(config.validate().is_err());
        config.listen_addr = "127.0.0.1:3000".to_string();

        config.rate_limit_rate = 0.0;
        assert!(config.validate().is_err());
        config.rate_limit_rate = f64::INFINITY;
        assert!(config.validate().is_err());
        config.rate_limit_rate = 1.0;

        config.rate_limit_burst = 0;
        assert!(config.validate().is_err());
        config.rate_limit_burst = 1;

        config.rate_limit_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.rate_limit_ttl_secs = 1;

        config.max_multipart_bytes = 0;
        assert!(config.validate().is_err());
        config.max_multipart_bytes = 1;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_settings() {
        let config = valid_config();

        assert_eq!(
            config.rate_limit(),
            RateLimitConfig {
                rate: 16.6,
                burst: 30,
                ttl: Duration::from_secs(60),
            }
        );
        assert_eq!(config.body_limits().max_multipart_bytes, TEN_MIB);
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = load_from_env().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.log_format, "json");
        assert_eq!(config.access_log_sink, "tracing");
        assert_eq!(config.access_log_queue_capacity, 10_000);
        assert!(!config.behind_proxy);
        assert!((config.rate_limit_rate - 16.666).abs() < 0.01);
        assert_eq!(config.rate_limit_burst, 30);
        assert_eq!(config.rate_limit_ttl_secs, 60);
        assert!(config.rate_limit_exempt_preflight);
        assert_eq!(config.max_multipart_bytes, 10 * 1024 * 1024);
    }

    #[test]
    #[serial]
    fn test_overrides_from_env() {
        clear_env();
        // SAFETY: Tests are run serially due to #[serial], so no concurrent access
        unsafe {
            env::set_var("BEHIND_PROXY", "TRUE");
            env::set_var("RATE_LIMIT_RATE", "2.5");
            env::set_var("RATE_LIMIT_BURST", " 5 ");
            env::set_var("RATE_LIMIT_EXEMPT_PREFLIGHT", "0");
            env::set_var("MAX_MULTIPART_BYTES", "not-a-number");
        }

        let config = Config::from_env();

        assert!(config.behind_proxy);
        assert_eq!(config.rate_limit_rate, 2.5);
        assert_eq!(config.rate_limit_burst, 5);
        assert!(!config.rate_limit_exempt_preflight);
        assert_eq!(config.max_multipart_bytes, TEN_MIB);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_fails_validation() {
        clear_env();
        // SAFETY: Tests are run serially
        unsafe {
            env::set_var("RATE_LIMIT_BURST", "0");
        }

        assert!(load_from_env().is_err());

        clear_env();
    }
}
