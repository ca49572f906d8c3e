//! Loader for Shelf configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. YAML files added with [`ShelfConfigLoader::with_file`] or
//!    [`ShelfConfigLoader::with_optional_file`], and inline snippets from
//!    [`ShelfConfigLoader::with_yaml_str`], in the order they were added;
//! 2. `SHELF__`-prefixed environment variables, `__` separating sections
//!    (`SHELF__SERVER__API_KEY`, `SHELF__FETCH__TIMEOUT_SECS`).
//!
//! String values may reference other environment variables as `${VAR}`;
//! placeholders are expanded recursively (bounded) after merging. Every key
//! except `server.api_key` has a default.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use shelf_common::observability::{LogConfig, LogFormat};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SHELF";

#[derive(Debug, Clone, Deserialize)]
pub struct ShelfConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret expected in the `X-API-KEY` header of mutating requests.
    #[serde(deserialize_with = "string_or_number")]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Outbound page fetch tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub max_retries: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: 0,
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::default(),
            stderr: true,
            filter: default_filter(),
        }
    }
}

impl LogSettings {
    /// Map onto the observability initializer's options.
    pub fn to_log_config(&self, app_name: &'static str) -> LogConfig {
        LogConfig {
            app_name,
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".into()
}
fn default_database_url() -> String {
    "sqlite://shelf.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_user_agent() -> String {
    concat!("shelf/", env!("CARGO_PKG_VERSION")).into()
}
fn default_true() -> bool {
    true
}
fn default_filter() -> String {
    "info".into()
}

/// Env values are parsed eagerly, so an all-digit secret arrives as a number.
fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct ShelfConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ShelfConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ShelfConfigLoader {
    /// Start with no file sources; `SHELF__` env overrides are applied on load.
    ///
    /// ```
    /// use shelf_config::ShelfConfigLoader;
    ///
    /// let config = ShelfConfigLoader::new()
    ///     .with_yaml_str("server:\n  api_key: secret")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.server.api_key, "secret");
    /// assert_eq!(config.server.bind, "127.0.0.1:8787");
    /// assert_eq!(config.fetch.timeout_secs, 10);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent, so deployments can rely on env alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use shelf_common::observability::LogFormat;
    /// use shelf_config::ShelfConfigLoader;
    ///
    /// let cfg = ShelfConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// server:
    ///   bind: "0.0.0.0:9000"
    ///   api_key: "example"
    /// fetch:
    ///   timeout_secs: 3
    /// log:
    ///   format: json
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.server.bind, "0.0.0.0:9000");
    /// assert_eq!(cfg.fetch.timeout_secs, 3);
    /// assert_eq!(cfg.log.format, LogFormat::Json);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// The loader layers `SHELF__`-prefixed environment variables over the
    /// file sources and expands `${VAR}` placeholders before materialising
    /// strongly typed structs.
    ///
    /// ```
    /// use shelf_config::ShelfConfigLoader;
    ///
    /// unsafe { std::env::set_var("SHELF_DOC_API_KEY", "injected-from-env"); }
    ///
    /// let config = ShelfConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// server:
    ///   api_key: "${SHELF_DOC_API_KEY}"
    /// database:
    ///   url: "sqlite::memory:"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.server.api_key, "injected-from-env");
    /// assert_eq!(config.database.url, "sqlite::memory:");
    ///
    /// unsafe { std::env::remove_var("SHELF_DOC_API_KEY"); }
    /// ```
    pub fn load(self) -> Result<ShelfConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ShelfConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}

impl ShelfConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "server.api_key must not be empty".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "fetch.timeout_secs must be at least 1".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use temp_env;

    #[test]
    fn api_key_placeholder_is_filled_from_env() {
        temp_env::with_var("SHELF_TEST_API_KEY", Some("s3cret"), || {
            let mut v = json!({
                "server": { "bind": "127.0.0.1:8787", "api_key": "${SHELF_TEST_API_KEY}" }
            });
            expand_env_in_value(&mut v);
            assert_eq!(v["server"]["api_key"], "s3cret");
            assert_eq!(v["server"]["bind"], "127.0.0.1:8787");
        });
    }

    #[test]
    fn placeholders_expand_inside_urls_and_leave_scalars_alone() {
        temp_env::with_vars(
            [("SHELF_TEST_DATA", Some("/var/lib/shelf")), ("SHELF_TEST_PORT", Some("9000"))],
            || {
                let mut v = json!({
                    "database": { "url": "sqlite://$SHELF_TEST_DATA/shelf.db?mode=rwc", "max_connections": 4 },
                    "server": { "bind": "0.0.0.0:${SHELF_TEST_PORT}" },
                    "log": { "stderr": true, "dir": null },
                });
                expand_env_in_value(&mut v);
                assert_eq!(v["database"]["url"], "sqlite:///var/lib/shelf/shelf.db?mode=rwc");
                assert_eq!(v["database"]["max_connections"], 4);
                assert_eq!(v["server"]["bind"], "0.0.0.0:9000");
                assert_eq!(v["log"], json!({ "stderr": true, "dir": null }));
            },
        );
    }

    #[test]
    fn env_values_may_reference_other_env_values() {
        temp_env::with_vars(
            [
                ("SHELF_TEST_HOME", Some("/srv/shelf")),
                ("SHELF_TEST_LOGS", Some("${SHELF_TEST_HOME}/logs")),
            ],
            || {
                let mut v = json!({ "log": { "dir": "${SHELF_TEST_LOGS}/today" } });
                expand_env_in_value(&mut v);
                assert_eq!(v["log"]["dir"], "/srv/shelf/logs/today");
            },
        );
    }

    #[test]
    fn self_referencing_keys_terminate() {
        temp_env::with_vars(
            [
                ("SHELF_TEST_KEY_A", Some("${SHELF_TEST_KEY_B}")),
                ("SHELF_TEST_KEY_B", Some("${SHELF_TEST_KEY_A}")),
            ],
            || {
                let mut v = json!({ "server": { "api_key": "${SHELF_TEST_KEY_A}" } });
                expand_env_in_value(&mut v);
                let key = v["server"]["api_key"].as_str().unwrap();
                assert!(key.starts_with("${SHELF_TEST_KEY_"));
            },
        );
    }

    #[test]
    fn unset_placeholder_survives_verbatim() {
        let mut v = json!({ "fetch": { "user_agent": "shelf (+${SHELF_TEST_UNSET_CONTACT})" } });
        expand_env_in_value(&mut v);
        assert_eq!(v["fetch"]["user_agent"], "shelf (+${SHELF_TEST_UNSET_CONTACT})");
    }

    #[test]
    fn numeric_api_key_is_kept_as_text() {
        let cfg: ServerConfig = serde_json::from_value(json!({ "api_key": 12345 })).unwrap();
        assert_eq!(cfg.api_key, "12345");
    }

    #[test]
    fn defaults_cover_everything_but_the_key() {
        let cfg: ShelfConfig =
            serde_json::from_value(json!({ "server": { "api_key": "k" } })).unwrap();
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.fetch.max_retries, 0);
        assert_eq!(cfg.fetch.max_body_bytes, 5 * 1024 * 1024);
        assert!(cfg.fetch.user_agent.starts_with("shelf/"));
        assert!(cfg.log.stderr);
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let cfg: ShelfConfig =
            serde_json::from_value(json!({ "server": { "api_key": "  " } })).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn log_settings_map_onto_log_config() {
        let settings = LogSettings {
            dir: Some(PathBuf::from("/tmp/shelf-logs")),
            format: LogFormat::Json,
            stderr: false,
            filter: "debug".into(),
        };
        let log = settings.to_log_config("shelf");
        assert_eq!(log.app_name, "shelf");
        assert_eq!(log.log_dir.as_deref(), Some(Path::new("/tmp/shelf-logs")));
        assert!(!log.emit_stderr);
        assert_eq!(log.default_filter, "debug");
    }
}
