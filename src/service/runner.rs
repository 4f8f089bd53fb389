use crate::config::Config;
use crate::db::{Connector, SiteDatabase, Statement, seed_overrides};
use crate::error::BootstrapError;
use crate::installer::{InstallOutcome, InstallRequest, SiteInstaller};
use tracing::{error, info, warn};

pub const SUCCESS_MESSAGE: &str = "Your Wordpress installation is now configured.";

/// Rows touched by one seed override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOverride {
    pub action: &'static str,
    pub rows_affected: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub install: InstallOutcome,
    pub overrides: Vec<AppliedOverride>,
}

/// Connects, delegates to the installer, then applies the seed overrides.
pub struct InstallerRunner<C, I> {
    config: Config,
    connector: C,
    installer: I,
}

impl<C, I> InstallerRunner<C, I>
where
    C: Connector,
    I: SiteInstaller,
{
    pub fn new(config: Config, connector: C, installer: I) -> Self {
        Self {
            config,
            connector,
            installer,
        }
    }

    /// Single linear pass; the runner is consumed.
    pub async fn run(self) -> Result<RunReport, BootstrapError> {
        let db_cfg = &self.config.database;
        info!(host = %db_cfg.host, port = db_cfg.port, user = %db_cfg.user, "connecting to database");
        let mut session = self.connector.connect().await.map_err(|e| {
            error!(error = %e, "database connection failed");
            BootstrapError::ConnectionFailed(e)
        })?;

        let request = InstallRequest::from(&self.config.site);
        info!(
            title = %request.title,
            admin = %request.admin_username,
            "running application installer"
        );
        let install = self.installer.install(&request).await?;
        info!(
            user_id = ?install.user_id(),
            password_generated = install.password_generated(),
            "installer finished"
        );

        session
            .select_database(&db_cfg.name)
            .await
            .map_err(|source| BootstrapError::Write {
                action: "selecting the application database",
                source,
            })?;

        let mut overrides = Vec::with_capacity(3);
        for statement in seed_overrides(db_cfg, &self.config.site) {
            overrides.push(apply(&mut session, &statement).await?);
        }

        session.close().await.map_err(BootstrapError::Close)?;
        info!("database connection closed");

        Ok(RunReport { install, overrides })
    }
}

async fn apply<D: SiteDatabase>(
    session: &mut D,
    statement: &Statement,
) -> Result<AppliedOverride, BootstrapError> {
    let action = statement.action();
    let rows_affected = session
        .execute(statement)
        .await
        .map_err(|source| BootstrapError::Write { action, source })?;
    if rows_affected == 0 {
        // Also expected when the stored value already matches.
        warn!(action, "seed override matched no changed rows");
    } else {
        info!(action, rows_affected, "seed override applied");
    }
    Ok(AppliedOverride {
        action,
        rows_affected,
    })
}
