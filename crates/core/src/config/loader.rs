use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

use super::{types::Config, ConfigError};

/// Prefix for environment overrides. Nested keys are joined with `__`,
/// e.g. `HARVEST_API__PASSWORD` or `HARVEST_FETCH__STRATEGY`.
pub const ENV_PREFIX: &str = "HARVEST_";

/// Read `path` and layer `HARVEST_*` variables on top.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    extract(Figment::from(Toml::file(path)).merge(env_overrides()))
}

/// Parse a TOML document without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::from(Toml::string(toml_str)))
}

fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
