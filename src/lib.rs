pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod installer;
pub mod service;

pub use config::Config;
pub use error::{BootstrapError, InstallerError};
pub use installer::{InstallOutcome, InstallRequest, PhpInstaller, SiteInstaller};
pub use service::{InstallerRunner, RunReport, SUCCESS_MESSAGE};
