//! Delegated install entry point.
//!
//! The runner only depends on [`SiteInstaller`]. [`PhpInstaller`] drives the
//! application's own `wp_install` routine through the PHP CLI.

use crate::config::{InstallerConfig, SiteConfig};
use crate::error::InstallerError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Parameters handed to the install entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub title: String,
    pub admin_username: String,
    pub admin_email: String,
    pub suppress_notification: bool,
}

impl From<&SiteConfig> for InstallRequest {
    fn from(site: &SiteConfig) -> Self {
        Self {
            title: site.title.clone(),
            admin_username: site.admin_username.clone(),
            admin_email: site.admin_email.clone(),
            suppress_notification: site.suppress_notification,
        }
    }
}

/// Named values produced by the installer (user id, generated password, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallOutcome {
    values: Map<String, Value>,
}

impl InstallOutcome {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn user_id(&self) -> Option<u64> {
        match self.values.get("user_id")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn password_generated(&self) -> bool {
        matches!(self.values.get("password"), Some(Value::String(s)) if !s.is_empty())
    }

    /// Parse the last non-empty line of the installer's stdout as a JSON object.
    pub fn from_output(stdout: &str) -> Result<Self, InstallerError> {
        let line = stdout
            .lines()
            .map(str::trim)
            .rev()
            .find(|l| !l.is_empty())
            .ok_or_else(|| InstallerError::Rejected("installer printed no result".to_string()))?;
        match serde_json::from_str::<Value>(line)? {
            Value::Object(values) => Ok(Self::new(values)),
            other => Err(InstallerError::Rejected(format!(
                "expected a result mapping, got {other}"
            ))),
        }
    }
}

#[async_trait]
pub trait SiteInstaller: Send + Sync {
    async fn install(&self, request: &InstallRequest) -> Result<InstallOutcome, InstallerError>;
}

/// Runs inside `php -r`. Arguments: root, title, username, email, flag.
pub const PHP_BOOTSTRAP: &str = r#"
define('WP_INSTALLING', true);
$root = rtrim($argv[1], '/');
if (!file_exists($root . '/wp-config.php')) {
    require_once($root . '/wp-includes/functions.php');
}
require_once($root . '/wp-config.php');
require_once($root . '/wp-admin/upgrade-functions.php');
$result = wp_install(stripslashes($argv[2]), stripslashes($argv[3]), stripslashes($argv[4]), (int) $argv[5]);
echo "\n" . json_encode($result) . "\n";
"#;

pub struct PhpInstaller {
    php_binary: String,
    wordpress_root: PathBuf,
    timeout: Duration,
}

impl PhpInstaller {
    pub fn new(
        php_binary: impl Into<String>,
        wordpress_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            php_binary: php_binary.into(),
            wordpress_root: wordpress_root.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &InstallerConfig) -> Self {
        Self::new(cfg.php_binary.clone(), cfg.wordpress_root.clone(), cfg.timeout())
    }

    fn args(&self, request: &InstallRequest) -> Vec<String> {
        vec![
            "-r".to_string(),
            PHP_BOOTSTRAP.to_string(),
            "--".to_string(),
            self.wordpress_root.display().to_string(),
            request.title.clone(),
            request.admin_username.clone(),
            request.admin_email.clone(),
            if request.suppress_notification { "1" } else { "0" }.to_string(),
        ]
    }

    fn config_present(&self) -> bool {
        self.wordpress_root.join("wp-config.php").exists()
    }
}

#[async_trait]
impl SiteInstaller for PhpInstaller {
    async fn install(&self, request: &InstallRequest) -> Result<InstallOutcome, InstallerError> {
        if !self.config_present() {
            info!(
                root = %self.wordpress_root.display(),
                "wp-config.php not found; installer will bootstrap it"
            );
        }

        let child = Command::new(&self.php_binary)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(InstallerError::Spawn)?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| InstallerError::Timeout(self.timeout.as_secs()))?
            .map_err(InstallerError::Spawn)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(InstallerError::Exited {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        debug!(stderr = %stderr.trim(), "installer finished");
        InstallOutcome::from_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InstallRequest {
        InstallRequest {
            title: "My Project".to_string(),
            admin_username: "alice".to_string(),
            admin_email: "a@example.com".to_string(),
            suppress_notification: true,
        }
    }

    #[test]
    fn parses_result_after_installer_noise() {
        let stdout = "<p>Notice: something</p>\n{\"url\":\"http://x\",\"user_id\":1,\"password\":\"abc\",\"password_message\":\"\"}\n";
        let outcome = InstallOutcome::from_output(stdout).unwrap();
        assert_eq!(outcome.user_id(), Some(1));
        assert!(outcome.password_generated());
        assert_eq!(outcome.get("url"), Some(&Value::String("http://x".to_string())));
    }

    #[test]
    fn rejects_non_mapping_result() {
        let err = InstallOutcome::from_output("false\n").unwrap_err();
        assert!(matches!(err, InstallerError::Rejected(_)));
    }

    #[test]
    fn rejects_empty_output() {
        assert!(matches!(
            InstallOutcome::from_output("\n  \n"),
            Err(InstallerError::Rejected(_))
        ));
    }

    #[test]
    fn rejects_garbage_output() {
        assert!(matches!(
            InstallOutcome::from_output("Fatal error: wp_install undefined"),
            Err(InstallerError::MalformedOutput(_))
        ));
    }

    #[test]
    fn passes_parameters_in_entry_point_order() {
        let installer = PhpInstaller::new("php", "/app", Duration::from_secs(5));
        let args = installer.args(&request());
        assert_eq!(args[0], "-r");
        assert_eq!(args[2], "--");
        assert_eq!(&args[3..], ["/app", "My Project", "alice", "a@example.com", "1"]);
    }

    #[test]
    fn request_from_site_config() {
        let site = SiteConfig::default();
        let req = InstallRequest::from(&site);
        assert_eq!(req.title, "My Bitnami Project");
        assert_eq!(req.admin_username, "caribou");
        assert!(req.suppress_notification);
    }

    #[tokio::test]
    async fn missing_php_binary_is_a_spawn_error() {
        let installer = PhpInstaller::new(
            "/nonexistent/php-binary-for-tests",
            "/nonexistent",
            Duration::from_secs(5),
        );
        let err = installer.install(&request()).await.unwrap_err();
        assert!(matches!(err, InstallerError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        // sh cannot run the bootstrap script; stands in for a failing interpreter.
        let installer = PhpInstaller::new("sh", "/nonexistent", Duration::from_secs(5));
        let err = installer.install(&request()).await.unwrap_err();
        assert!(matches!(err, InstallerError::Exited { .. }));
    }
}
