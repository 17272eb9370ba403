use super::models::Config;
use config::{ConfigError, Environment, File, Map};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "WXVOICE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/wxvoice.toml";
const ENV_PREFIX: &str = "WXVOICE";
const ENV_SEPARATOR: &str = "__";
const TOKEN_ENV_VAR: &str = "WXVOICE_TOKEN";
const NESTED_TOKEN_ENV_VAR: &str = "WXVOICE__WECHAT__TOKEN";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(path_override: Option<PathBuf>) -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Non-UTF-8 variables cannot name a setting, skip them
    let vars: Map<String, String> = env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();

    let config_path = path_override
        .or_else(|| vars.get(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_with_env(config_path, vars)
}

/// Layer `config_path` and the given environment, then pick up the token.
///
/// The token is read from `WXVOICE_TOKEN`, falling back to
/// `WXVOICE__WECHAT__TOKEN`. A token in the file is ignored.
pub fn load_with_env(config_path: PathBuf, vars: Map<String, String>) -> Result<Config, ConfigError> {
    let token = vars
        .get(TOKEN_ENV_VAR)
        .or_else(|| vars.get(NESTED_TOKEN_ENV_VAR))
        .cloned()
        .unwrap_or_default();

    let mut config = build(config_path, Some(vars))?;
    config.wechat.token = token;

    Ok(config)
}

/// Load configuration from a specific path and the process environment.
///
/// The token is left empty.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut config = build(config_path, None)?;
    config.wechat.token.clear();
    Ok(config)
}

fn build(config_path: PathBuf, vars: Option<Map<String, String>>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // WXVOICE__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(vars),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
