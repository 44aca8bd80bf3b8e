//! Connection profiles
//!
//! A query file picks its target with a leading directive (`--dryrun`,
//! `--prod`). Each profile's connection settings come from environment
//! variables and may be overridden by a TOML file:
//!
//! ```toml
//! [profiles.dryrun]
//! host = "dryrun.example.redshift.amazonaws.com"
//! port = 5439
//! database = "analytics"
//! schema = "reporting"
//! pool_max = 10
//! acquire_timeout_ms = 600000
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BenchError, Result};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5439;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 600_000;

/// Target environment for a query file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Profile {
    Prod,
    Dryrun,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Prod, Profile::Dryrun];

    /// Pick the profile from the file's leading directive, defaulting to prod.
    pub fn detect(sql: &str) -> Self {
        if sql.starts_with("--dryrun") {
            Profile::Dryrun
        } else {
            Profile::Prod
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Prod => "prod",
            Profile::Dryrun => "dryrun",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Profile::Prod => "",
            Profile::Dryrun => "DRYRUN_",
        }
    }

    fn default_pool_max(&self) -> usize {
        match self {
            Profile::Prod => 2,
            Profile::Dryrun => 10,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prod" => Ok(Profile::Prod),
            "dryrun" => Ok(Profile::Dryrun),
            other => Err(BenchError::Config(format!("unknown profile '{}'", other))),
        }
    }
}

/// Resolved connection settings for one profile
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Applied as `search_path` on every new connection
    pub schema: Option<String>,
    pub pool_max: usize,
    pub acquire_timeout: Duration,
}

impl ProfileSettings {
    /// Read `REDSHIFT_DB_*` (prefixed with `DRYRUN_` for the dryrun profile).
    pub fn from_env<F>(profile: Profile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}REDSHIFT_DB_{}", profile.env_prefix(), name))
                .filter(|v| !v.is_empty())
        };

        let port = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                BenchError::Config(format!("{}: invalid port '{}'", profile, raw))
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: var("URI").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            user: var("USER"),
            password: var("PASSWORD"),
            database: var("NAME"),
            schema: var("SCHEMA"),
            pool_max: profile.default_pool_max(),
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
        })
    }

    fn apply(&mut self, overrides: ProfileOverride) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if overrides.user.is_some() {
            self.user = overrides.user;
        }
        if overrides.password.is_some() {
            self.password = overrides.password;
        }
        if overrides.database.is_some() {
            self.database = overrides.database;
        }
        if overrides.schema.is_some() {
            self.schema = overrides.schema;
        }
        if let Some(max) = overrides.pool_max {
            self.pool_max = max.max(1);
        }
        if let Some(ms) = overrides.acquire_timeout_ms {
            self.acquire_timeout = Duration::from_millis(ms);
        }
    }

    /// Driver configuration for these settings
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .application_name("query-bench");
        if let Some(ref user) = self.user {
            config.user(user);
        }
        if let Some(ref password) = self.password {
            config.password(password);
        }
        if let Some(ref database) = self.database {
            config.dbname(database);
        }
        config
    }
}

/// Per-profile overrides from the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileOverride {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    pool_max: Option<usize>,
    acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: HashMap<String, ProfileOverride>,
}

/// Settings for every known profile
#[derive(Debug, Clone)]
pub struct ProfileSet {
    settings: HashMap<Profile, ProfileSettings>,
}

impl ProfileSet {
    /// Resolve all profiles from the process environment and an optional TOML file.
    pub fn load(overrides_path: Option<&Path>) -> Result<Self> {
        let overrides = match overrides_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                BenchError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => String::new(),
        };
        Self::resolve(|name| std::env::var(name).ok(), &overrides)
    }

    /// Resolve from an explicit variable lookup and TOML text.
    pub fn resolve<F>(lookup: F, overrides_toml: &str) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = HashMap::new();
        for profile in Profile::ALL {
            settings.insert(profile, ProfileSettings::from_env(profile, &lookup)?);
        }

        let file: ProfilesFile = toml::from_str(overrides_toml)?;
        for (name, overrides) in file.profiles {
            let profile: Profile = name.parse()?;
            if let Some(entry) = settings.get_mut(&profile) {
                entry.apply(overrides);
            }
        }

        Ok(Self { settings })
    }

    pub fn get(&self, profile: Profile) -> &ProfileSettings {
        // resolve() fills every profile
        &self.settings[&profile]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_detect_profile() {
        assert_eq!(Profile::detect("--dryrun\nSELECT 1"), Profile::Dryrun);
        assert_eq!(Profile::detect("--prod\nSELECT 1"), Profile::Prod);
        assert_eq!(Profile::detect("SELECT 1 --dryrun"), Profile::Prod);
        assert_eq!(Profile::detect(""), Profile::Prod);
    }

    #[test]
    fn test_env_defaults_and_prefixes() {
        let lookup = env(&[
            ("REDSHIFT_DB_URI", "prod.example"),
            ("REDSHIFT_DB_USER", "bench"),
            ("DRYRUN_REDSHIFT_DB_PORT", "5440"),
            ("DRYRUN_REDSHIFT_DB_SCHEMA", ""),
        ]);
        let set = ProfileSet::resolve(lookup, "").unwrap();

        let prod = set.get(Profile::Prod);
        assert_eq!(prod.host, "prod.example");
        assert_eq!(prod.port, 5439);
        assert_eq!(prod.user.as_deref(), Some("bench"));
        assert_eq!(prod.pool_max, 2);

        let dryrun = set.get(Profile::Dryrun);
        assert_eq!(dryrun.host, "localhost");
        assert_eq!(dryrun.port, 5440);
        assert_eq!(dryrun.schema, None);
        assert_eq!(dryrun.pool_max, 10);
        assert_eq!(dryrun.acquire_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            [profiles.prod]
            host = "override.example"
            pool_max = 4
            acquire_timeout_ms = 1500
        "#;
        let set = ProfileSet::resolve(env(&[("REDSHIFT_DB_URI", "env.example")]), toml).unwrap();
        let prod = set.get(Profile::Prod);
        assert_eq!(prod.host, "override.example");
        assert_eq!(prod.pool_max, 4);
        assert_eq!(prod.acquire_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = ProfileSet::resolve(env(&[("REDSHIFT_DB_PORT", "abc")]), "").unwrap_err();
        assert!(err.to_string().contains("invalid port"));

        let err = ProfileSet::resolve(env(&[]), "[profiles.staging]\nhost = \"x\"").unwrap_err();
        assert!(err.to_string().contains("unknown profile"));

        let err = ProfileSet::resolve(env(&[]), "[profiles.prod]\nhots = \"x\"").unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
