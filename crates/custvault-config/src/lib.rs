use custvault_core::{Field, ProtectionMode, ProtectionPolicy};
use custvault_gateway::auth::DEFAULT_IDENTITY_RESOURCE;
use custvault_gateway::{AuthMethod, FederatedIdentity, VaultSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Service configuration: optional TOML file, overlaid by environment
/// variables, validated once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub protection: ProtectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethodName {
    #[serde(rename = "TOKEN")]
    Token,
    #[serde(rename = "AZURE_JWT")]
    AzureJwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Unset means unprotected mode
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub auth_method: Option<AuthMethodName>,

    #[serde(default)]
    pub transit_path: Option<String>,

    #[serde(default = "default_key_name")]
    pub key_name: String,

    #[serde(default)]
    pub transform_path: Option<String>,

    #[serde(default = "default_tokenization_role")]
    pub tokenization_role: String,

    #[serde(default)]
    pub database_creds_path: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_login_mount")]
    pub login_mount: String,

    #[serde(default = "default_login_role")]
    pub login_role: String,

    #[serde(default = "default_identity_resource")]
    pub identity_resource: String,
}

/// Per-field overrides of the default protection modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub birth_date: Option<ProtectionMode>,
    pub first_name: Option<ProtectionMode>,
    pub last_name: Option<ProtectionMode>,
    pub social_security_number: Option<ProtectionMode>,
    pub address: Option<ProtectionMode>,
    pub salary: Option<ProtectionMode>,
}

impl ProtectionConfig {
    fn overrides(&self) -> impl Iterator<Item = (Field, ProtectionMode)> + '_ {
        Field::ALL.into_iter().filter_map(|field| {
            let mode = match field {
                Field::BirthDate => self.birth_date,
                Field::FirstName => self.first_name,
                Field::LastName => self.last_name,
                Field::SocialSecurityNumber => self.social_security_number,
                Field::Address => self.address,
                Field::Salary => self.salary,
            };
            mode.map(|m| (field, m))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full sqlx URL; takes precedence over `address`
    #[serde(default)]
    pub url: Option<String>,

    /// MySQL `host[:port]`, used with a gateway-issued credential
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default = "default_mysql_port")]
    pub port: u16,

    #[serde(default = "default_database_name")]
    pub name: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_seed")]
    pub seed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: None,
            namespace: None,
            auth_method: None,
            transit_path: None,
            key_name: default_key_name(),
            transform_path: None,
            tokenization_role: default_tokenization_role(),
            database_creds_path: None,
            timeout_secs: default_timeout_secs(),
            login_mount: default_login_mount(),
            login_role: default_login_role(),
            identity_resource: default_identity_resource(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            address: None,
            port: default_mysql_port(),
            name: default_database_name(),
            max_connections: default_max_connections(),
            seed: default_seed(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_key_name() -> String {
    "customer-key".to_string()
}

fn default_tokenization_role() -> String {
    "ssn".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_login_mount() -> String {
    "jwt".to_string()
}

fn default_login_role() -> String {
    "dev-role".to_string()
}

fn default_identity_resource() -> String {
    DEFAULT_IDENTITY_RESOURCE.to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_database_name() -> String {
    "my_app".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_seed() -> bool {
    true
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// How the database is reached once configuration is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    Url(String),
    /// Credential must be read from the gateway at `creds_path`
    GatewayCredential {
        host: String,
        port: u16,
        database: String,
        creds_path: String,
    },
}

impl Config {
    /// Load config from `path`, or from the default location if it exists,
    /// or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::config_path();
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "custvault", "custvault") {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.custvault/config.toml")
        }
    }

    /// Overlay environment variables. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LISTEN_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("LISTEN_PORT") {
            self.server.port = parse("LISTEN_PORT", &v)?;
        }

        let gw = &mut self.gateway;
        if let Some(v) = get("VAULT_ADDR") {
            gw.address = Some(v);
        }
        if let Some(v) = get("VAULT_NAMESPACE") {
            gw.namespace = Some(v);
        }
        if let Some(v) = get("VAULT_AUTH_METHOD") {
            gw.auth_method = Some(parse_auth_method(&v)?);
        }
        if let Some(v) = get("VAULT_TRANSIT_PATH") {
            gw.transit_path = Some(v);
        }
        if let Some(v) = get("VAULT_TRANSIT_KEY") {
            gw.key_name = v;
        }
        if let Some(v) = get("VAULT_TRANSFORM_PATH") {
            gw.transform_path = Some(v);
        }
        if let Some(v) = get("VAULT_TRANSFORM_ROLE") {
            gw.tokenization_role = v;
        }
        if let Some(v) = get("VAULT_DATABASE_CREDS_PATH") {
            gw.database_creds_path = Some(v);
        }
        if let Some(v) = get("VAULT_TIMEOUT_SECS") {
            gw.timeout_secs = parse("VAULT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("VAULT_LOGIN_MOUNT") {
            gw.login_mount = v;
        }
        if let Some(v) = get("VAULT_LOGIN_ROLE") {
            gw.login_role = v;
        }

        let db = &mut self.database;
        if let Some(v) = get("DATABASE_URL") {
            db.url = Some(v);
        }
        if let Some(v) = get("MYSQL_ADDR") {
            db.address = Some(v);
        }
        if let Some(v) = get("DATABASE_NAME") {
            db.name = v;
        }
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            db.max_connections = parse("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("SEED_DEMO_DATA") {
            db.seed = parse("SEED_DEMO_DATA", &v)?;
        }

        Ok(())
    }

    /// Check that everything needed at startup is present. All missing keys
    /// are reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        let gw = &self.gateway;

        if self.gateway_enabled() {
            if gw.auth_method.is_none() {
                missing.push("VAULT_AUTH_METHOD");
            }
            if gw.transit_path.is_none() {
                missing.push("VAULT_TRANSIT_PATH");
            }
            if gw.transform_path.is_none() {
                missing.push("VAULT_TRANSFORM_PATH");
            }
            if self.database.url.is_none() {
                if gw.database_creds_path.is_none() {
                    missing.push("VAULT_DATABASE_CREDS_PATH");
                }
                if self.database.address.is_none() {
                    missing.push("MYSQL_ADDR");
                }
            }
        } else if self.database.url.is_none() {
            missing.push("DATABASE_URL");
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                message: "must be at least 1".to_string(),
            });
        }
        if gw.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "VAULT_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// A gateway address turns protection on.
    pub fn gateway_enabled(&self) -> bool {
        self.gateway.address.is_some()
    }

    pub fn protection_policy(&self) -> ProtectionPolicy {
        self.protection.overrides().fold(
            ProtectionPolicy::default().with_tokenization_role(&self.gateway.tokenization_role),
            |policy, (field, mode)| policy.with_mode(field, mode),
        )
    }

    pub fn vault_settings(&self) -> Option<VaultSettings> {
        let gw = &self.gateway;
        Some(VaultSettings {
            address: gw.address.clone()?,
            namespace: gw.namespace.clone(),
            transit_mount: gw.transit_path.clone()?,
            key_name: gw.key_name.clone(),
            transform_mount: gw.transform_path.clone()?,
            timeout: Duration::from_secs(gw.timeout_secs),
        })
    }

    /// Build the authentication strategy. Credentials come from the
    /// environment only, never from the config file.
    pub fn auth_method<F>(&self, lookup: F) -> Result<AuthMethod, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(vec![key]))
        };

        match self.gateway.auth_method {
            Some(AuthMethodName::Token) => Ok(AuthMethod::token(get("VAULT_TOKEN")?)),
            Some(AuthMethodName::AzureJwt) => {
                Ok(AuthMethod::FederatedIdentity(FederatedIdentity {
                    identity_endpoint: get("IDENTITY_ENDPOINT")?,
                    identity_header: get("IDENTITY_HEADER")?.into(),
                    resource: self.gateway.identity_resource.clone(),
                    login_mount: self.gateway.login_mount.clone(),
                    role: self.gateway.login_role.clone(),
                }))
            }
            None => Err(ConfigError::Missing(vec!["VAULT_AUTH_METHOD"])),
        }
    }

    pub fn database_source(&self) -> Result<DatabaseSource, ConfigError> {
        if let Some(url) = &self.database.url {
            return Ok(DatabaseSource::Url(url.clone()));
        }

        let (address, creds_path) = match (
            &self.database.address,
            &self.gateway.database_creds_path,
        ) {
            (Some(a), Some(p)) if self.gateway_enabled() => (a, p),
            _ => return Err(ConfigError::Missing(vec!["DATABASE_URL"])),
        };

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), parse("MYSQL_ADDR", port)?),
            None => (address.clone(), self.database.port),
        };

        Ok(DatabaseSource::GatewayCredential {
            host,
            port,
            database: self.database.name.clone(),
            creds_path: creds_path.clone(),
        })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

fn parse_auth_method(value: &str) -> Result<AuthMethodName, ConfigError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TOKEN" => Ok(AuthMethodName::Token),
        "AZURE_JWT" => Ok(AuthMethodName::AzureJwt),
        other => Err(ConfigError::Invalid {
            key: "VAULT_AUTH_METHOD",
            message: format!("expected TOKEN or AZURE_JWT, got '{}'", other),
        }),
    }
}
