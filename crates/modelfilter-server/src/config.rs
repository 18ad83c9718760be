use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8082";
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Collection loaded at start-up.
    pub items_path: Option<PathBuf>,
    /// Load the built-in fixture collection when nothing else is given.
    pub use_test_data: bool,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8082)),
            items_path: None,
            use_test_data: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parsed(&get, "BIND_ADDR").unwrap_or(defaults.bind_addr),
            items_path: get("ITEMS_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            use_test_data: get("USE_TEST_DATA").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            max_body_bytes: parsed(&get, "MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
        }
    }
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
