use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Process-wide settings, read once at start-up and shared by `Arc`.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub data_dir: String,
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub identity_cache_ttl: Duration,
    pub session_ttl: Duration,
    pub listing_cache_ttl: Duration,
    pub detail_cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub secure_cookies: bool,
    pub revoke_on_logout: bool,
    pub admin_username: String,
    pub admin_password: String,
    /// True when `admin_password` was generated because none was configured.
    pub admin_password_generated: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("http_port", &self.http_port)
            .field("data_dir", &self.data_dir)
            .field("token_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("identity_cache_ttl", &self.identity_cache_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("listing_cache_ttl", &self.listing_cache_ttl)
            .field("detail_cache_ttl", &self.detail_cache_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("secure_cookies", &self.secure_cookies)
            .field("revoke_on_logout", &self.revoke_on_logout)
            .field("admin_username", &self.admin_username)
            .field("admin_password_generated", &self.admin_password_generated)
            .finish_non_exhaustive()
    }
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_ADMIN_USERNAME: &str = "admin";
    const DEFAULT_TOKEN_TTL_SECS: u64 = 30 * 60;
    const DEFAULT_IDENTITY_CACHE_TTL_SECS: u64 = 300;
    const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
    const DEFAULT_LISTING_CACHE_TTL_SECS: u64 = 60;
    const DEFAULT_DETAIL_CACHE_TTL_SECS: u64 = 60;
    const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let production = lookup("QUILL_ENV").is_some_and(|env| env == "production");

        let token_secret = match lookup("QUILL_TOKEN_SECRET") {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!("QUILL_TOKEN_SECRET not set, generating a random per-process secret");
                warn!("Issued tokens will not survive a restart");
                random_bytes(64)
            }
        };

        // Announced only if the admin account is created with it.
        let (admin_password, admin_password_generated) = match lookup("QUILL_ADMIN_PASSWORD") {
            Some(password) => (password, false),
            None => (random_password(), true),
        };

        Self {
            host: lookup("QUILL_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: parse_or(&lookup, "QUILL_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            data_dir: lookup("QUILL_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            token_secret,
            token_ttl: secs_or(&lookup, "QUILL_TOKEN_TTL_SECS", Self::DEFAULT_TOKEN_TTL_SECS),
            identity_cache_ttl: secs_or(
                &lookup,
                "QUILL_IDENTITY_CACHE_TTL_SECS",
                Self::DEFAULT_IDENTITY_CACHE_TTL_SECS,
            ),
            session_ttl: secs_or(
                &lookup,
                "QUILL_SESSION_TTL_SECS",
                Self::DEFAULT_SESSION_TTL_SECS,
            ),
            listing_cache_ttl: secs_or(
                &lookup,
                "QUILL_LISTING_CACHE_TTL_SECS",
                Self::DEFAULT_LISTING_CACHE_TTL_SECS,
            ),
            detail_cache_ttl: secs_or(
                &lookup,
                "QUILL_DETAIL_CACHE_TTL_SECS",
                Self::DEFAULT_DETAIL_CACHE_TTL_SECS,
            ),
            sweep_interval: Duration::from_millis(parse_or(
                &lookup,
                "QUILL_SWEEP_INTERVAL_MS",
                Self::DEFAULT_SWEEP_INTERVAL_MS,
            )),
            secure_cookies: parse_or(&lookup, "QUILL_SECURE_COOKIES", production),
            revoke_on_logout: parse_or(&lookup, "QUILL_REVOKE_ON_LOGOUT", false),
            admin_username: lookup("QUILL_ADMIN_USERNAME")
                .unwrap_or_else(|| Self::DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password,
            admin_password_generated,
        }
    }

    /// Deterministic settings for tests: fixed secret, short sweep interval.
    pub fn for_tests(data_dir: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            http_port: 0,
            data_dir: data_dir.into(),
            token_secret: b"test-secret-that-is-long-enough-for-hmac".to_vec(),
            token_ttl: Duration::from_secs(Self::DEFAULT_TOKEN_TTL_SECS),
            identity_cache_ttl: Duration::from_secs(Self::DEFAULT_IDENTITY_CACHE_TTL_SECS),
            session_ttl: Duration::from_secs(Self::DEFAULT_SESSION_TTL_SECS),
            listing_cache_ttl: Duration::from_secs(Self::DEFAULT_LISTING_CACHE_TTL_SECS),
            detail_cache_ttl: Duration::from_secs(Self::DEFAULT_DETAIL_CACHE_TTL_SECS),
            sweep_interval: Duration::from_millis(100),
            secure_cookies: false,
            revoke_on_logout: false,
            admin_username: Self::DEFAULT_ADMIN_USERNAME.to_string(),
            admin_password: "admin-pass-123".to_string(),
            admin_password_generated: false,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        None => default,
    }
}

fn secs_or(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Duration {
    Duration::from_secs(parse_or(lookup, name, default))
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random()).collect()
}

fn random_password() -> String {
    // Letters and digits both present so it passes the strength check.
    let bytes = random_bytes(12);
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("a1{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup_from(&[]));

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.token_ttl, Duration::from_secs(1800));
        assert_eq!(config.identity_cache_ttl, Duration::from_secs(300));
        assert!(!config.secure_cookies);
        assert!(!config.revoke_on_logout);
        assert_eq!(config.token_secret.len(), 64);
    }

    #[test]
    fn test_generated_secrets_differ_per_process_start() {
        let first = Config::from_lookup(lookup_from(&[]));
        let second = Config::from_lookup(lookup_from(&[]));

        assert_ne!(first.token_secret, second.token_secret);
    }

    #[test]
    fn test_explicit_values_are_used() {
        let config = Config::from_lookup(lookup_from(&[
            ("QUILL_TOKEN_SECRET", "s3cret"),
            ("QUILL_HTTP_PORT", "9090"),
            ("QUILL_TOKEN_TTL_SECS", "60"),
            ("QUILL_REVOKE_ON_LOGOUT", "true"),
        ]));

        assert_eq!(config.token_secret, b"s3cret".to_vec());
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.token_ttl, Duration::from_secs(60));
        assert!(config.revoke_on_logout);
    }

    #[test]
    fn test_production_turns_on_secure_cookies() {
        let config = Config::from_lookup(lookup_from(&[("QUILL_ENV", "production")]));
        assert!(config.secure_cookies);

        let overridden = Config::from_lookup(lookup_from(&[
            ("QUILL_ENV", "production"),
            ("QUILL_SECURE_COOKIES", "false"),
        ]));
        assert!(!overridden.secure_cookies);
    }

    #[test]
    fn test_malformed_number_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[("QUILL_HTTP_PORT", "not-a-port")]));
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn test_admin_password_generated_only_when_unset() {
        let generated = Config::from_lookup(lookup_from(&[]));
        assert!(generated.admin_password_generated);
        assert!(!generated.admin_password.is_empty());

        let configured =
            Config::from_lookup(lookup_from(&[("QUILL_ADMIN_PASSWORD", "chosen-pass-1")]));
        assert!(!configured.admin_password_generated);
        assert_eq!(configured.admin_password, "chosen-pass-1");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::for_tests("/tmp/quill");
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("test-secret"));
    }
}
