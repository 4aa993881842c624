use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime configuration, read from environment variables with demo defaults.
///
/// Recognized variables: `HOST`, `PORT`, `UPLOAD_DIR`, `PROCESSING_DELAY_MS`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub host: String,

    /// Port the HTTP listener binds to
    pub port: u16,

    /// Directory where uploaded spreadsheet files are stored
    pub upload_dir: PathBuf,

    /// Delay before an uploaded sheet is flagged as processed, in milliseconds
    pub processing_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 3001,
            upload_dir: PathBuf::from("uploads"),
            processing_delay_ms: 2000,
        }
    }
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// Unset or unparseable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            processing_delay_ms: env_or("PROCESSING_DELAY_MS", defaults.processing_delay_ms),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_demo_values() {
        let config = Config::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.processing_delay_ms, 2000);
    }

    #[test]
    fn env_or_falls_back_when_unset() {
        let port: u16 = env_or("SHEETBOARD_TEST_UNSET_PORT", 9999);
        assert_eq!(port, 9999);
    }
}
