use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::SupervisorError;

/// `development` selects the test bucket/folder-name pattern and tighter
/// rate limits; `production` selects the live bucket and the full remote
/// limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Development,
    Production,
}

impl ExecutionMode {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => ExecutionMode::Production,
            _ => ExecutionMode::Development,
        }
    }
}

/// Runtime configuration assembled from environment variables, optionally
/// seeded from a `.env`-style file first. Mirrors the ambient config
/// loader's `KEY=VALUE` parsing rather than pulling in a dedicated env
/// crate, since the source format is this simple.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mode: ExecutionMode,
    pub bucket_name: String,
    pub api_base_url: String,
    pub api_consumer_key: String,
    pub api_consumer_secret: String,
    pub concurrency: usize,
    pub batch_size: usize,
    pub port: u16,
    pub rate_gate_max_concurrent: usize,
    pub rate_gate_min_spacing: Duration,
    /// Local directory standing in for the object-store bucket root. The
    /// concrete cloud SDK is out of scope; `FsObjectStore` reads feed
    /// folders from under this path instead.
    pub object_store_root: String,
    /// Local directory holding the durable checkpoint file and the
    /// embedded job queue's sled database.
    pub state_dir: String,
}

/// Loads system environment variables plus, optionally, a `.env`-style
/// file read first so its entries are overridden by real process env vars
/// already present -- matching the ambient loader's "file seeds, process
/// env wins" precedence.
pub struct EnvLoader {
    vars: HashMap<String, String>,
}

impl EnvLoader {
    pub fn new() -> Self {
        EnvLoader { vars: std::env::vars().collect() }
    }

    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), SupervisorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|err| SupervisorError::Config(format!("failed to read env file {}: {err}", path.display())))?;
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(eq_pos) = line.find('=') else {
                return Err(SupervisorError::Config(format!(
                    "malformed env file line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };
            let key = line[..eq_pos].trim();
            if key.is_empty() {
                return Err(SupervisorError::Config(format!("empty key at env file line {}", line_num + 1)));
            }
            let value = unquote(line[eq_pos + 1..].trim());
            self.vars.entry(key.to_string()).or_insert(value);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

impl RuntimeConfig {
    pub fn from_env(env: &EnvLoader) -> Result<Self, SupervisorError> {
        let mode = ExecutionMode::from_str(env.get("EXECUTION_MODE").unwrap_or("development"));

        let bucket_name = match mode {
            ExecutionMode::Production => env.get("S3_BUCKET_NAME"),
            ExecutionMode::Development => env.get("S3_TEST_BUCKET_NAME"),
        }
        .ok_or_else(|| SupervisorError::Config("missing bucket name for selected execution mode".to_string()))?
        .to_string();

        let api_base_url = match mode {
            ExecutionMode::Production => env.get("WOO_API_BASE_URL"),
            ExecutionMode::Development => env.get("WOO_API_BASE_URL_DEV").or_else(|| env.get("WOO_API_BASE_URL_TEST")),
        }
        .ok_or_else(|| SupervisorError::Config("missing API base URL for selected execution mode".to_string()))?
        .to_string();

        let api_consumer_key = env
            .get("WOO_API_CONSUMER_KEY")
            .ok_or_else(|| SupervisorError::Config("missing WOO_API_CONSUMER_KEY".to_string()))?
            .to_string();
        let api_consumer_secret = env
            .get("WOO_API_CONSUMER_SECRET")
            .ok_or_else(|| SupervisorError::Config("missing WOO_API_CONSUMER_SECRET".to_string()))?
            .to_string();

        let concurrency = parse_or(env.get("CONCURRENCY"), 2)?;
        let batch_size = parse_or(env.get("BATCH_SIZE"), 100)?;
        let port = parse_or(env.get("PORT"), 8080)?;

        let (rate_gate_max_concurrent, rate_gate_min_spacing) = match mode {
            ExecutionMode::Production => (4, Duration::from_millis(250)),
            ExecutionMode::Development => (1, Duration::from_millis(1000)),
        };

        let object_store_root = env.get("OBJECT_STORE_ROOT").unwrap_or("./object_store").to_string();
        let state_dir = env.get("STATE_DIR").unwrap_or("./.catalog-sync").to_string();

        Ok(RuntimeConfig {
            mode,
            bucket_name,
            api_base_url,
            api_consumer_key,
            api_consumer_secret,
            concurrency,
            batch_size,
            port,
            rate_gate_max_concurrent,
            rate_gate_min_spacing,
            object_store_root,
            state_dir,
        })
    }

    /// Folder names to match against when discovering the newest feed
    /// folder: `MM-DD-YYYY/` in production, `MM-DD-YYYY-test/` in dev.
    pub fn folder_suffix(&self) -> &'static str {
        match self.mode {
            ExecutionMode::Production => "",
            ExecutionMode::Development => "-test",
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> Result<T, SupervisorError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| SupervisorError::Config(format!("could not parse {value:?} as a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_with(pairs: &[(&str, &str)]) -> EnvLoader {
        EnvLoader {
            vars: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn development_mode_selects_test_bucket_and_dev_url() {
        let env = loader_with(&[
            ("EXECUTION_MODE", "development"),
            ("S3_TEST_BUCKET_NAME", "test-bucket"),
            ("WOO_API_BASE_URL_DEV", "https://dev.example.com"),
            ("WOO_API_CONSUMER_KEY", "k"),
            ("WOO_API_CONSUMER_SECRET", "s"),
        ]);
        let config = RuntimeConfig::from_env(&env).unwrap();
        assert_eq!(config.mode, ExecutionMode::Development);
        assert_eq!(config.bucket_name, "test-bucket");
        assert_eq!(config.folder_suffix(), "-test");
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn production_mode_requires_production_bucket() {
        let env = loader_with(&[
            ("EXECUTION_MODE", "production"),
            ("WOO_API_BASE_URL", "https://api.example.com"),
            ("WOO_API_CONSUMER_KEY", "k"),
            ("WOO_API_CONSUMER_SECRET", "s"),
        ]);
        let result = RuntimeConfig::from_env(&env);
        assert!(result.is_err());
    }

    #[test]
    fn numeric_overrides_are_parsed() {
        let env = loader_with(&[
            ("EXECUTION_MODE", "production"),
            ("S3_BUCKET_NAME", "prod-bucket"),
            ("WOO_API_BASE_URL", "https://api.example.com"),
            ("WOO_API_CONSUMER_KEY", "k"),
            ("WOO_API_CONSUMER_SECRET", "s"),
            ("CONCURRENCY", "8"),
            ("BATCH_SIZE", "250"),
            ("PORT", "9090"),
        ]);
        let config = RuntimeConfig::from_env(&env).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn file_loaded_values_do_not_override_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "CONCURRENCY=16\nQUOTED=\"hello world\"\n").unwrap();

        // SAFETY: test-local, no concurrent access to this key from other threads in this process.
        unsafe { std::env::set_var("CONCURRENCY", "3") };
        let mut env = EnvLoader::new();
        env.load_from_file(&path).unwrap();
        assert_eq!(env.get("CONCURRENCY"), Some("3"));
        assert_eq!(env.get("QUOTED"), Some("hello world"));
        unsafe { std::env::remove_var("CONCURRENCY") };
    }
}
