//! Process-start configuration, loaded once from the environment.
//!
//! Plain `std::env::var(...).ok().and_then(|v| v.parse().ok()).unwrap_or(default)`
//! lookups rather than a dedicated config crate — every value here is a flat
//! scalar read once at startup.

use std::collections::HashMap;

const ENV_PREFIX: &str = "UPTIME_CHOPPER_";

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub database_path: String,
    pub legacy_webhooks: HashMap<String, String>,
    pub max_docker_log_bytes: usize,
    pub default_docker_log_since_secs: u64,
    pub cors_origin: String,
    pub serve_frontend: bool,
    pub frontend_dir: String,
}

impl AppConfig {
    /// Loaded once at startup via `dotenvy::dotenv().ok()` followed by these
    /// lookups; never re-read at runtime.
    pub fn load() -> Self {
        let listen_host_port = env_var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8787".to_string());

        AppConfig {
            listen_addr: listen_host_port,
            database_path: env_var("DATABASE_PATH").unwrap_or_else(|| "uptime-chopper.db".to_string()),
            legacy_webhooks: parse_legacy_webhooks(env_var("LEGACY_WEBHOOKS").as_deref().unwrap_or("")),
            max_docker_log_bytes: env_parsed("MAX_DOCKER_LOG_BYTES", 65536),
            default_docker_log_since_secs: env_parsed("DEFAULT_DOCKER_LOG_SINCE_SECS", 3600),
            cors_origin: env_var("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
            serve_frontend: env_parsed("SERVE_FRONTEND", false),
            frontend_dir: env_var("FRONTEND_DIR").unwrap_or_else(|| "./frontend/dist".to_string()),
        }
    }

    pub fn listen_socket_addr(&self) -> (String, u16) {
        match self.listen_addr.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().unwrap_or(8787)),
            None => (self.listen_addr.clone(), 8787),
        }
    }
}

/// `name=url` pairs, comma-separated.
fn parse_legacy_webhooks(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, url) = pair.split_once('=')?;
            let name = name.trim();
            let url = url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_webhooks() {
        let map = parse_legacy_webhooks("ops=https://a.test/hook, team-b =https://b.test/hook");
        assert_eq!(map.get("ops").unwrap(), "https://a.test/hook");
        assert_eq!(map.get("team-b").unwrap(), "https://b.test/hook");
    }

    #[test]
    fn empty_legacy_webhooks() {
        assert!(parse_legacy_webhooks("").is_empty());
    }

    #[test]
    fn listen_socket_addr_splits_host_port() {
        let cfg = AppConfig {
            listen_addr: "0.0.0.0:8787".to_string(),
            database_path: String::new(),
            legacy_webhooks: HashMap::new(),
            max_docker_log_bytes: 0,
            default_docker_log_since_secs: 0,
            cors_origin: String::new(),
            serve_frontend: false,
            frontend_dir: String::new(),
        };
        assert_eq!(cfg.listen_socket_addr(), ("0.0.0.0".to_string(), 8787));
    }
}
