use crate::error::BootstrapError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "wp-bootstrap.toml";
pub const ENV_PREFIX: &str = "WP_BOOTSTRAP_";
pub const DEFAULT_TARBALL_URL: &str = "https://wordpress.org/wordpress-latest.tar.gz";
pub const DEFAULT_CHECKSUM_URL: &str = "https://wordpress.org/wordpress-latest.tar.gz.md5";

/// Free-form string keys read verbatim from the environment. figment would
/// otherwise parse `0042` as the integer 42.
const RAW_STRING_KEYS: &[&str] = &[
    "database.user",
    "database.password",
    "database.name",
    "site.title",
    "site.admin_username",
    "site.admin_password",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: String,
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub installer: InstallerConfig,
    pub release: ReleaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub table_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
    pub url: String,
    pub suppress_notification: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub wordpress_root: PathBuf,
    pub php_binary: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    pub tarball_url: String,
    pub checksum_url: String,
    pub target: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            database: DatabaseConfig::default(),
            site: SiteConfig::default(),
            installer: InstallerConfig::default(),
            release: ReleaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "mariadb".to_string(),
            port: 3306,
            user: "wordpress".to_string(),
            password: "my-password".to_string(),
            name: "wordpress".to_string(),
            table_prefix: "wp_".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Bitnami Project".to_string(),
            admin_username: "caribou".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "WORDPRESS_USER_PASSWORD".to_string(),
            url: "WORDPRESS_URL".to_string(),
            suppress_notification: true,
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            wordpress_root: PathBuf::from("/app"),
            php_binary: "php".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            tarball_url: DEFAULT_TARBALL_URL.to_string(),
            checksum_url: DEFAULT_CHECKSUM_URL.to_string(),
            target: PathBuf::from("latest.tar.gz"),
        }
    }
}

impl InstallerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn users_table(&self) -> String {
        format!("{}users", self.table_prefix)
    }

    pub fn options_table(&self) -> String {
        format!("{}options", self.table_prefix)
    }
}

/// `site.admin_password` -> `WP_BOOTSTRAP_SITE__ADMIN_PASSWORD`
fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__").to_ascii_uppercase())
}

impl Config {
    /// Layered sources: defaults, then the TOML file, then `WP_BOOTSTRAP_*` env vars.
    pub fn figment(path: &Path) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(RAW_STRING_KEYS));
        RAW_STRING_KEYS.iter().fold(figment, |figment, key| {
            match std::env::var(env_var_name(key)) {
                Ok(value) => figment.merge(Serialized::default(key, value)),
                Err(_) => figment,
            }
        })
    }

    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let cfg: Config = Self::figment(path).extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), BootstrapError> {
        let required = [
            ("database.host", self.database.host.as_str()),
            ("database.user", self.database.user.as_str()),
            ("database.name", self.database.name.as_str()),
            ("site.admin_username", self.site.admin_username.as_str()),
            ("site.admin_email", self.site.admin_email.as_str()),
            ("site.admin_password", self.site.admin_password.as_str()),
            ("site.url", self.site.url.as_str()),
        ];
        if let Some((key, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(BootstrapError::InvalidConfig(format!("{key} must not be empty")));
        }

        let prefix_ok = self
            .database
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !prefix_ok {
            return Err(BootstrapError::InvalidConfig(format!(
                "database.table_prefix contains unsupported characters: {:?}",
                self.database.table_prefix
            )));
        }

        if Url::parse(&self.site.url).is_err() {
            warn!(url = %self.site.url, "site.url is not an absolute URL; writing it verbatim");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_stock_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.database.host, "mariadb");
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.database.user, "wordpress");
        assert_eq!(cfg.database.users_table(), "wp_users");
        assert_eq!(cfg.database.options_table(), "wp_options");
        assert!(cfg.site.suppress_notification);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_file_and_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [database]
                host = "db.internal"
                port = 3307

                [site]
                title = "From File"
                "#,
            )?;
            jail.set_env("WP_BOOTSTRAP_SITE__URL", "https://example.com");
            jail.set_env("WP_BOOTSTRAP_DATABASE__PORT", "3308");

            let cfg = Config::load(Path::new(DEFAULT_CONFIG_FILE))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(cfg.database.host, "db.internal");
            assert_eq!(cfg.database.port, 3308);
            assert_eq!(cfg.site.title, "From File");
            assert_eq!(cfg.site.url, "https://example.com");
            assert_eq!(cfg.database.name, "wordpress");
            Ok(())
        });
    }

    #[test]
    fn digit_only_secrets_load_verbatim() {
        Jail::expect_with(|jail| {
            jail.set_env("WP_BOOTSTRAP_SITE__ADMIN_PASSWORD", "12345678");
            jail.set_env("WP_BOOTSTRAP_DATABASE__PASSWORD", "0042");
            jail.set_env("WP_BOOTSTRAP_DATABASE__NAME", "2024");
            jail.set_env("WP_BOOTSTRAP_DATABASE__PORT", "3310");

            let cfg = Config::load(Path::new("absent.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(cfg.site.admin_password, "12345678");
            assert_eq!(cfg.database.password, "0042");
            assert_eq!(cfg.database.name, "2024");
            assert_eq!(cfg.database.port, 3310);
            Ok(())
        });
    }

    #[test]
    fn raw_string_keys_map_to_env_names() {
        assert_eq!(
            env_var_name("site.admin_password"),
            "WP_BOOTSTRAP_SITE__ADMIN_PASSWORD"
        );
        assert_eq!(env_var_name("database.user"), "WP_BOOTSTRAP_DATABASE__USER");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = Config::load(Path::new("absent.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn rejects_empty_required_values() {
        let mut cfg = Config::default();
        cfg.site.admin_password = "  ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("site.admin_password"));
    }

    #[test]
    fn rejects_table_prefix_with_sql_characters() {
        let mut cfg = Config::default();
        cfg.database.table_prefix = "wp_; DROP".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(BootstrapError::InvalidConfig(_))
        ));
    }
}
