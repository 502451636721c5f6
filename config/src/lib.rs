use std::{
    env,
    fmt::{Display, Formatter},
    time::Duration,
};

use dotenvy::dotenv;
use figment::{
    Figment,
    providers::{Env, Format as _, Toml},
};
use serde::Deserialize;
use tracing::info;

/// Sweep interval used when no `clean_interval_ms` is configured.
pub const FIFTEEN_MINUTES_MS: u64 = 15 * 60 * 1000;

/// Session lifetime used when neither a cookie expiry nor a ttl is supplied.
pub const FORTY_FIVE_MINUTES_MS: u64 = 45 * 60 * 1000;

/// The application configuration.
///
/// This struct is the central point for the configuration of the session store. It holds the [`DatabaseConfig`], the [`StoreConfig`] and the [`TracingConfig`], read from the main `app.toml` and the environment-specific configuration files.
///
/// For any setting that appears in both the `app.toml` and the environment-specific file, the latter will override the former so that default settings can be kept in `app.toml` that are overridden per environment if necessary.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct DatabaseConfig {
    /// The URL to use to connect to the database, e.g. "sqlite://sessions.db"
    pub url: String,
    /// The maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Settings for the session table and its expiry sweeper.
#[derive(Deserialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
#[serde(default)]
pub struct StoreConfig {
    /// How often expired sessions are swept, in milliseconds.
    #[serde(alias = "clean")]
    pub clean_interval_ms: u64,
    /// Lifetime of a session that carries no cookie expiry, in milliseconds.
    #[serde(alias = "ttl")]
    pub default_ttl_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            clean_interval_ms: FIFTEEN_MINUTES_MS,
            default_ttl_ms: FORTY_FIVE_MINUTES_MS,
        }
    }
}

impl StoreConfig {
    /// The sweep interval as a [`Duration`]. A zero interval falls back to the default.
    pub fn clean_interval(&self) -> Duration {
        match self.clean_interval_ms {
            0 => Duration::from_millis(FIFTEEN_MINUTES_MS),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        match self.default_ttl_ms {
            0 => Duration::from_millis(FORTY_FIVE_MINUTES_MS),
            ms => Duration::from_millis(ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct TracingConfig {
    pub enable: bool,
    pub env_filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            env_filter: "info".to_string(),
        }
    }
}

/// Loads the configuration for a particular environment.
///
/// Depending on the environment, this function will behave differently:
/// * for [`Environment::Development`], the function will load env vars from a `.env` file at the project root if that is present
/// * for [`Environment::Test`], the function will load env vars from a `.env.test` file at the project root if that is present
/// * for [`Environment::Staging`] and [`Environment::Production`], the function will only use the process env vars
///
/// In case the .env or .env.test files live in another directory,
/// you can set that location using the APP_DOTENV_CONFIG_DIR environment variable.
///
/// Configuration settings are loaded from these sources (in that order so that latter sources override former):
/// * the `config/app.toml` file
/// * the `config/environments/<development|staging|production|test>.toml` files depending on the environment
/// * environment variables prefixed with `APP_`, nested keys separated by `__` (e.g. `APP_DATABASE__URL`)
pub fn load_config<'a, T>(env: &Environment) -> Result<T, Error>
where
    T: Deserialize<'a>,
{
    let dotenv_config_dir = env::var("APP_DOTENV_CONFIG_DIR")
        .ok()
        .map(std::path::PathBuf::from);

    match (env, dotenv_config_dir) {
        (Environment::Development, None) => {
            dotenv().ok();
        }
        (Environment::Test, None) => {
            dotenvy::from_filename(".env.test").ok();
        }
        (Environment::Development, Some(mut dotenv_config_dir)) => {
            dotenv_config_dir.push(".env");
            dotenvy::from_filename(dotenv_config_dir).ok();
        }
        (Environment::Test, Some(mut dotenv_config_dir)) => {
            dotenv_config_dir.push(".env.test");
            dotenvy::from_filename(dotenv_config_dir).ok();
        }
        _ => { /* don't use any .env file for production */ }
    }

    let config: T = Figment::new()
        .merge(Toml::file("config/app.toml"))
        .merge(Toml::file(format!(
            "config/environments/{}.toml",
            env
        )))
        .merge(Env::prefixed("APP_").split("__"))
        .extract()?;

    Ok(config)
}

/// The environment the session store runs in.
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// The development environment is what developers would use locally.
    Development,
    /// The staging environment would typically be used in a staging deployment.
    Staging,
    /// The production environment serves real user sessions.
    Production,
    /// The test environment is using when running e.g. `cargo test`
    Test,
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
        }
    }
}

/// Returns the currently active environment.
///
/// If the `APP_ENVIRONMENT` env var is set, the environment is parsed from that (which might fail if an invalid environment is set). If the env var is not set, [`Environment::Development`] is returned.
pub fn get_env() -> Result<Environment, Error> {
    match env::var("APP_ENVIRONMENT") {
        Ok(val) => {
            info!(r#"Setting environment from APP_ENVIRONMENT: "{}""#, val);
            parse_env(&val)
        }
        Err(_) => {
            info!("Defaulting to environment: development");
            Ok(Environment::Development)
        }
    }
}

/// Parses an [`Environment`] from a string.
///
/// The environment can be passed in different forms, e.g. "dev", "development", "prod", etc. If an invalid environment is passed, an error is returned.
pub fn parse_env(env: &str) -> Result<Environment, Error> {
    let env = &env.to_lowercase();
    match env.as_str() {
        "dev" => Ok(Environment::Development),
        "development" => Ok(Environment::Development),
        "stage" => Ok(Environment::Staging),
        "staging" => Ok(Environment::Staging),
        "test" => Ok(Environment::Test),
        "prod" => Ok(Environment::Production),
        "production" => Ok(Environment::Production),
        unknown => Err(Error::InvalidEnvironment(format!(
            "Unknown environment: {}",
            unknown
        ))),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Merge(#[from] figment::Error),
    #[error("unknown environment")]
    InvalidEnvironment(String),
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn load(env: &Environment) -> figment::error::Result<Config> {
        load_config(env).map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn defaults_apply_when_only_the_url_is_set() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/app.toml",
                r#"
                [database]
                url = "sqlite::memory:"
                "#,
            )?;

            let config = load(&Environment::Production)?;

            assert_eq!(config.database.url, "sqlite::memory:");
            assert_eq!(config.database.max_connections, 5);
            assert_eq!(config.store, StoreConfig::default());
            assert_eq!(
                config.store.clean_interval(),
                Duration::from_secs(15 * 60)
            );
            assert_eq!(config.store.default_ttl(), Duration::from_secs(45 * 60));
            assert_eq!(config.tracing, TracingConfig::default());
            Ok(())
        });
    }

    #[test]
    fn environment_file_overrides_app_toml() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_dir("config/environments")?;
            jail.create_file(
                "config/app.toml",
                r#"
                [database]
                url = "sqlite://sessions.db"

                [store]
                clean_interval_ms = 1000
                "#,
            )?;
            jail.create_file(
                "config/environments/staging.toml",
                r#"
                [database]
                url = "sqlite://staging.db"
                max_connections = 2
                "#,
            )?;

            let config = load(&Environment::Staging)?;

            assert_eq!(
                config.database,
                DatabaseConfig {
                    url: "sqlite://staging.db".to_string(),
                    max_connections: 2,
                }
            );
            assert_eq!(config.store.clean_interval(), Duration::from_secs(1));
            Ok(())
        });
    }

    #[test]
    fn env_vars_override_files_and_accept_short_aliases() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/app.toml",
                r#"
                [database]
                url = "sqlite://sessions.db"
                "#,
            )?;
            jail.set_env("APP_DATABASE__URL", "sqlite://from-env.db");
            jail.set_env("APP_STORE__CLEAN", "5000");
            jail.set_env("APP_STORE__TTL", "60000");

            let config = load(&Environment::Production)?;

            assert_eq!(config.database.url, "sqlite://from-env.db");
            assert_eq!(config.store.clean_interval_ms, 5000);
            assert_eq!(config.store.default_ttl_ms, 60000);
            Ok(())
        });
    }

    #[test]
    fn missing_database_url_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(matches!(
                load_config::<Config>(&Environment::Production),
                Err(Error::Merge(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let store = StoreConfig {
            clean_interval_ms: 0,
            default_ttl_ms: 0,
        };

        assert_eq!(store.clean_interval(), Duration::from_millis(FIFTEEN_MINUTES_MS));
        assert_eq!(store.default_ttl(), Duration::from_millis(FORTY_FIVE_MINUTES_MS));
    }

    #[test]
    fn parses_environment_names() {
        assert_eq!(parse_env("dev").unwrap(), Environment::Development);
        assert_eq!(parse_env("Production").unwrap(), Environment::Production);
        assert_eq!(parse_env("stage").unwrap(), Environment::Staging);
        assert_eq!(parse_env("test").unwrap(), Environment::Test);
        assert!(matches!(
            parse_env("qa"),
            Err(Error::InvalidEnvironment(_))
        ));
    }
}
