//! Keeps a local copy of the latest WordPress release tarball current.

use crate::config::ReleaseConfig;
use crate::error::{BootstrapError, IsRetryable};
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

#[derive(Debug, Clone)]
pub struct ReleaseSource {
    pub tarball_url: Url,
    pub checksum_url: Url,
    pub target: PathBuf,
}

impl TryFrom<&ReleaseConfig> for ReleaseSource {
    type Error = BootstrapError;

    fn try_from(cfg: &ReleaseConfig) -> Result<Self, BootstrapError> {
        Ok(Self {
            tarball_url: parse_url("release.tarball_url", &cfg.tarball_url)?,
            checksum_url: parse_url("release.checksum_url", &cfg.checksum_url)?,
            target: cfg.target.clone(),
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, BootstrapError> {
    Url::parse(raw).map_err(|e| BootstrapError::InvalidConfig(format!("{key}: {e}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The local file already matches the published checksum.
    AlreadyCurrent,
    Downloaded,
    ChecksumMismatch { expected: String, actual: String },
    /// The source could not be reached; the current local file is kept.
    Unavailable { reason: String },
}

pub fn build_client() -> Result<Client, BootstrapError> {
    let client = Client::builder()
        .user_agent(concat!("wp-bootstrap/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(300))
        .build()?;
    Ok(client)
}

/// Hex MD5 digest of a file's contents.
pub async fn file_md5(path: &Path) -> Result<String, BootstrapError> {
    let bytes = fs::read(path).await?;
    Ok(format!("{:x}", md5::compute(&bytes)))
}

async fn matches_checksum(path: &Path, expected: &str) -> Result<bool, BootstrapError> {
    Ok(file_md5(path).await?.eq_ignore_ascii_case(expected))
}

async fn get_bytes(client: &Client, url: &Url) -> Result<Vec<u8>, BootstrapError> {
    let fetch = || async {
        let resp = client.get(url.as_str()).send().await?.error_for_status()?;
        Ok::<_, BootstrapError>(resp.bytes().await?.to_vec())
    };
    fetch
        .retry(default_retry_policy())
        .when(|e: &BootstrapError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(url = %url, "request retrying after error {}, sleeping {:?}", err, dur);
        })
        .await
}

/// Fetch the published checksum, then download the tarball unless the local copy matches.
pub async fn fetch_latest(
    client: &Client,
    source: &ReleaseSource,
) -> Result<FetchOutcome, BootstrapError> {
    let expected = match get_bytes(client, &source.checksum_url).await {
        Ok(body) => String::from_utf8_lossy(&body).trim().to_string(),
        Err(BootstrapError::Http(e)) => {
            warn!(error = %e, "unable to fetch checksum; using the current file");
            return Ok(FetchOutcome::Unavailable {
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    };

    let target = source.target.as_path();
    if fs::try_exists(target).await? {
        if matches_checksum(target, &expected).await? {
            info!(file = %target.display(), "local release is current");
            return Ok(FetchOutcome::AlreadyCurrent);
        }
        info!(file = %target.display(), "local release checksum differs");
    }

    let tarball = match get_bytes(client, &source.tarball_url).await {
        Ok(body) => body,
        Err(BootstrapError::Http(e)) => {
            warn!(error = %e, "unable to download release; using the current file");
            return Ok(FetchOutcome::Unavailable {
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    };
    info!(file = %target.display(), bytes = tarball.len(), "writing new release");
    let mut file = fs::File::create(target).await?;
    file.write_all(&tarball).await?;
    file.flush().await?;

    let actual = file_md5(target).await?;
    if actual.eq_ignore_ascii_case(&expected) {
        info!(file = %target.display(), "downloaded release verified");
        Ok(FetchOutcome::Downloaded)
    } else {
        warn!(%expected, %actual, "downloaded release does not match checksum");
        Ok(FetchOutcome::ChecksumMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn md5_of_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.tar.gz");
        fs::write(&path, b"hello").await.unwrap();
        assert_eq!(
            file_md5(&path).await.unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert!(matches_checksum(&path, "5D41402ABC4B2A76B9719D911017C592").await.unwrap());
        assert!(!matches_checksum(&path, "0000").await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_md5(&dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Io(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_retryable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err: BootstrapError = build_client()
            .unwrap()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap_err()
            .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_release_url_is_a_config_error() {
        let cfg = ReleaseConfig {
            tarball_url: "not a url".to_string(),
            ..ReleaseConfig::default()
        };
        let err = ReleaseSource::try_from(&cfg).unwrap_err();
        assert!(err.to_string().contains("release.tarball_url"));
    }

    #[test]
    fn source_from_default_config() {
        let source = ReleaseSource::try_from(&ReleaseConfig::default()).unwrap();
        assert_eq!(
            source.checksum_url.as_str(),
            "https://wordpress.org/wordpress-latest.tar.gz.md5"
        );
        assert_eq!(source.target, PathBuf::from("latest.tar.gz"));
    }
}
