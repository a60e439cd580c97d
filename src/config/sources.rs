use config::Environment;

use super::models::RawConfig;

/// Load configuration from `.env` (if present) layered under the process
/// environment, exactly as the reference crate's `config::sources::load`
/// layers a TOML file under `FETCHBOX__*` environment overrides — except
/// here the variable names are flat and unprefixed (spec §6), so no
/// section separator is needed.
pub fn load() -> Result<RawConfig, config::ConfigError> {
    let _ = dotenvy::dotenv();
    load_from_env()
}

/// Build a [`RawConfig`] directly from the current process environment.
/// Exposed separately so tests can populate `std::env` first and then
/// call this without touching `.env` file discovery.
pub fn load_from_env() -> Result<RawConfig, config::ConfigError> {
    let builder = config::Config::builder().add_source(Environment::default().try_parsing(true));

    builder.build()?.try_deserialize()
}
